//! Report assembly and serialization.
//!
//! Two artifacts per run: a structured JSON report carrying everything the
//! pipeline collected, and a flat CSV summary for spreadsheet use. Every
//! record is validated before anything touches disk; a validation failure
//! aborts the whole writing step. The JSON report is the source of truth;
//! a CSV write failure is logged and never invalidates it.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{ProfileRecord, RunReport};

/// File names of the two run artifacts, written to the working directory.
pub const JSON_REPORT_FILE: &str = "output_raw.json";
pub const CSV_REPORT_FILE: &str = "output_raw.csv";

/// Column layout of the CSV summary. Order is part of the contract.
const CSV_COLUMNS: [&str; 21] = [
    "Profile URL",
    "Full Name",
    "Headline",
    "Location",
    "Connection Count",
    "Follower Count",
    "About",
    "Email",
    "Phone",
    "Birthday",
    "Connected At",
    "Websites",
    "Social Links",
    "Skills",
    "Certifications",
    "Projects",
    "Latest Company",
    "Latest Role",
    "Latest Duration",
    "Latest Education",
    "Latest Degree",
];

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("invalid record for {url}: {reason}")]
    InvalidRecord { url: String, reason: String },

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Check the minimal shape every reported record must have.
pub fn validate_record(record: &ProfileRecord) -> Result<(), OutputError> {
    if record.profile_url.trim().is_empty() {
        return Err(OutputError::InvalidRecord {
            url: record.profile_url.clone(),
            reason: "empty profile URL".into(),
        });
    }
    if record.basic.full_name.trim().is_empty() {
        return Err(OutputError::InvalidRecord {
            url: record.profile_url.clone(),
            reason: "empty full name".into(),
        });
    }
    Ok(())
}

/// Write both run artifacts. Every record is validated first; a violation
/// aborts before any file is touched. The JSON report is then written; if
/// the CSV write fails afterwards it is logged and the run still counts as
/// reported.
pub fn write_reports(report: &RunReport, dir: &Path) -> Result<(), OutputError> {
    for record in &report.profiles {
        validate_record(record)?;
    }

    let json_path = dir.join(JSON_REPORT_FILE);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&json_path, json)?;
    info!(
        "Wrote {} profiles to {:?}",
        report.profiles.len(),
        json_path
    );

    let csv_path = dir.join(CSV_REPORT_FILE);
    match render_csv(&report.profiles) {
        Ok(csv_text) => match std::fs::write(&csv_path, csv_text) {
            Ok(()) => info!("Wrote CSV summary to {:?}", csv_path),
            Err(e) => warn!("CSV summary not written: {}", e),
        },
        Err(e) => warn!("CSV summary not rendered: {}", e),
    }

    Ok(())
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn opt_count(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Flatten one record into its CSV row. List sections join with ", ";
/// experience and education contribute only their first (latest) entry.
fn csv_row(record: &ProfileRecord) -> Vec<String> {
    let contact = record.contact_info.clone().unwrap_or_default();
    let latest_exp = record.experience.first();
    let latest_edu = record.education.first();

    vec![
        record.profile_url.clone(),
        record.basic.full_name.clone(),
        opt(&record.basic.headline),
        opt(&record.basic.location),
        opt_count(record.basic.connection_count),
        opt_count(record.basic.follower_count),
        opt(&record.about),
        opt(&contact.email),
        opt(&contact.phone),
        opt(&contact.birthday),
        opt(&contact.connected_at),
        contact.websites.join(", "),
        contact.social_links.join(", "),
        record
            .skills
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        record
            .certifications
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        record
            .projects
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        latest_exp
            .and_then(|e| e.company.clone())
            .unwrap_or_default(),
        latest_exp.map(|e| e.role.clone()).unwrap_or_default(),
        latest_exp
            .and_then(|e| e.duration.clone())
            .unwrap_or_default(),
        latest_edu.map(|e| e.institute.clone()).unwrap_or_default(),
        latest_edu
            .and_then(|e| e.degree.clone())
            .unwrap_or_default(),
    ]
}

/// Render the CSV summary in memory. Quoting and escaping follow the `csv`
/// writer's rules.
fn render_csv(profiles: &[ProfileRecord]) -> Result<String, OutputError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;
    for record in profiles {
        writer.write_record(csv_row(record))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BasicProfile, ContactInfo, Education, Experience, RunMetadata, Skill,
    };

    fn record(url: &str, name: &str) -> ProfileRecord {
        ProfileRecord {
            profile_url: url.into(),
            basic: BasicProfile {
                profile_url: url.into(),
                full_name: name.into(),
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
        }
    }

    #[test]
    fn empty_name_fails_validation() {
        let rec = record("https://www.linkedin.com/in/x", "  ");
        assert!(validate_record(&rec).is_err());
        let rec = record("", "Someone");
        assert!(validate_record(&rec).is_err());
        let rec = record("https://www.linkedin.com/in/x", "Someone");
        assert!(validate_record(&rec).is_ok());
    }

    #[test]
    fn invalid_record_aborts_writing_before_any_file_is_created() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("linkscrape-abort-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let report = RunReport {
            metadata: RunMetadata {
                scraped_at: "2026-01-01T00:00:00Z".into(),
                total_profiles: 2,
                status: "completed".into(),
            },
            profiles: vec![
                record("https://www.linkedin.com/in/ok", "Someone"),
                record("https://www.linkedin.com/in/bad", "   "),
            ],
        };

        let result = write_reports(&report, &dir);
        assert!(matches!(result, Err(OutputError::InvalidRecord { .. })));
        assert!(!dir.join(JSON_REPORT_FILE).exists());
        assert!(!dir.join(CSV_REPORT_FILE).exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn bare_record_flattens_to_empty_cells() {
        let row = csv_row(&record("https://www.linkedin.com/in/x", "Someone"));
        assert_eq!(row.len(), CSV_COLUMNS.len());
        assert_eq!(row[0], "https://www.linkedin.com/in/x");
        assert_eq!(row[1], "Someone");
        // Everything list- or experience-derived is an empty cell.
        for cell in &row[2..] {
            assert!(cell.is_empty());
        }
    }

    #[test]
    fn populated_record_flattens_latest_entries_and_joined_lists() {
        let mut rec = record("https://www.linkedin.com/in/jane", "Jane Dev");
        rec.experience = vec![
            Experience {
                role: "Staff Engineer".into(),
                company: Some("Initech".into()),
                duration: Some("2021 - Present".into()),
                description: None,
            },
            Experience {
                role: "Engineer".into(),
                company: Some("Globex".into()),
                duration: None,
                description: None,
            },
        ];
        rec.education = vec![Education {
            institute: "MIT".into(),
            degree: Some("BSc".into()),
            start_year: None,
        }];
        rec.skills = vec![Skill { name: "Rust".into() }, Skill { name: "CDP".into() }];
        rec.contact_info = Some(ContactInfo {
            email: Some("jane@example.com".into()),
            websites: vec!["https://jane.dev".into(), "https://blog.jane.dev".into()],
            ..Default::default()
        });

        let row = csv_row(&rec);
        assert_eq!(row[7], "jane@example.com");
        assert_eq!(row[11], "https://jane.dev, https://blog.jane.dev");
        assert_eq!(row[13], "Rust, CDP");
        assert_eq!(row[16], "Initech");
        assert_eq!(row[17], "Staff Engineer");
        assert_eq!(row[18], "2021 - Present");
        assert_eq!(row[19], "MIT");
        assert_eq!(row[20], "BSc");
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        let csv = render_csv(&[record("https://www.linkedin.com/in/jane", "Dev, Jane")]).unwrap();
        assert!(csv.contains("\"Dev, Jane\""));
    }

    #[test]
    fn fields_with_bare_carriage_returns_are_quoted() {
        let csv = render_csv(&[record("https://www.linkedin.com/in/x", "line1\rline2")]).unwrap();
        assert!(csv.contains("\"line1\rline2\""));
    }

    #[test]
    fn rendered_csv_has_header_and_one_row_per_profile() {
        let profiles = vec![
            record("https://www.linkedin.com/in/a", "A"),
            record("https://www.linkedin.com/in/b", "B"),
        ];
        let csv = render_csv(&profiles).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Profile URL,Full Name,"));
        assert!(lines[1].starts_with("https://www.linkedin.com/in/a,A,"));
    }
}
