//! Typed records produced by the extraction pipeline.
//!
//! Every record is built incrementally during extraction and immutable once
//! assembled. Serialized field names match the raw JSON report layout.

use serde::{Deserialize, Serialize};

/// Identity block scraped from the top card of a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicProfile {
    pub profile_url: String,
    pub full_name: String,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub connection_count: Option<u64>,
    #[serde(default)]
    pub follower_count: Option<u64>,
}

/// A single position in the experience section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub role: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A single entry in the education section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub institute: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub start_year: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certification {
    pub name: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub issue_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Contact details scraped from the contact-info overlay.
///
/// All fields are independently optional. An absent `ContactInfo` on the
/// record (the overlay was never reached) is distinct from an empty one
/// (the overlay loaded but held nothing).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub connected_at: Option<String>,
    #[serde(default)]
    pub websites: Vec<String>,
    #[serde(default)]
    pub social_links: Vec<String>,
}

impl ContactInfo {
    /// True when every field is absent or empty.
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.phone.is_none()
            && self.birthday.is_none()
            && self.connected_at.is_none()
            && self.websites.is_empty()
            && self.social_links.is_empty()
    }
}

/// One fully scraped profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub profile_url: String,
    pub basic: BasicProfile,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub certifications: Vec<Certification>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub contact_info: Option<ContactInfo>,

    // Placeholder sections kept for schema forward-compatibility.
    // Always empty in this version.
    #[serde(default)]
    pub publications: Vec<serde_json::Value>,
    #[serde(default)]
    pub honors_and_awards: Vec<serde_json::Value>,
    #[serde(default)]
    pub volunteering: Vec<serde_json::Value>,
    #[serde(default)]
    pub courses: Vec<serde_json::Value>,
    #[serde(default)]
    pub languages: Vec<serde_json::Value>,
}

/// Result of processing a single target identifier.
///
/// The pipeline never raises past the per-profile boundary: every identifier
/// in a run yields exactly one of these.
#[derive(Debug)]
pub enum ExtractionOutcome {
    Success(Box<ProfileRecord>),
    Failure { url: String, error: String },
}

/// Run-level metadata embedded in the structured report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub scraped_at: String,
    /// Count of successfully scraped profiles. Failed identifiers are logged
    /// but not reflected here (mirrors the report's silence on failures).
    pub total_profiles: usize,
    pub status: String,
}

/// The full structured report written at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub profiles: Vec<ProfileRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_info_default_is_empty() {
        let contact = ContactInfo::default();
        assert!(contact.is_empty());
    }

    #[test]
    fn contact_info_with_any_field_is_not_empty() {
        let contact = ContactInfo {
            phone: Some("+1 555 0100".into()),
            ..Default::default()
        };
        assert!(!contact.is_empty());
    }

    #[test]
    fn profile_record_serializes_placeholder_sections() {
        let record = ProfileRecord {
            profile_url: "https://www.linkedin.com/in/someone".into(),
            basic: BasicProfile {
                profile_url: "https://www.linkedin.com/in/someone".into(),
                full_name: "Someone".into(),
                headline: None,
                profile_picture: None,
                location: None,
                connection_count: None,
                follower_count: None,
            },
            about: None,
            experience: vec![],
            education: vec![],
            skills: vec![],
            certifications: vec![],
            projects: vec![],
            contact_info: None,
            publications: vec![],
            honors_and_awards: vec![],
            volunteering: vec![],
            courses: vec![],
            languages: vec![],
        };

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("publications").unwrap().as_array().unwrap().is_empty());
        assert!(json.get("languages").unwrap().as_array().unwrap().is_empty());
        assert!(json.get("contact_info").unwrap().is_null());
    }
}
