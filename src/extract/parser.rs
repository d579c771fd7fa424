//! DOM parsing of captured profile HTML.
//!
//! Everything here is pure: HTML string in, typed fields out. Section
//! parsers are positional heuristics over the visible text spans of each
//! list item, and they degrade silently when the source structure omits an
//! expected field. An item that fails to parse is skipped, never an error.

use scraper::{ElementRef, Html, Selector};

use crate::models::{
    BasicProfile, Certification, ContactInfo, Education, Experience, ProfileRecord, Project, Skill,
};

/// Parse a static selector. These are all known-good literals; a parse
/// failure just disables the lookup.
fn sel(selector: &str) -> Option<Selector> {
    Selector::parse(selector).ok()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Visible text spans of a list item. The site duplicates visible text in
/// `aria-hidden` spans to avoid screen-reader repetition; those are the
/// stable source.
fn visible_texts(item: ElementRef<'_>) -> Vec<String> {
    let Some(span_sel) = sel(r#"span[aria-hidden="true"]"#) else {
        return Vec::new();
    };
    item.select(&span_sel)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Locate a content section by its stable anchor id, then climb to the
/// structural `<section>` ancestor that actually holds the list.
fn section_container<'a>(doc: &'a Html, anchor_id: &str) -> Option<ElementRef<'a>> {
    let anchor_sel = sel(&format!("#{anchor_id}"))?;
    let anchor = doc.select(&anchor_sel).next()?;
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "section")
}

/// Enumerate list items of a section and map each through a positional
/// constructor. Items the constructor rejects are skipped.
fn section_items<T>(
    doc: &Html,
    anchor_id: &str,
    from_texts: impl Fn(Vec<String>) -> Option<T>,
) -> Vec<T> {
    let Some(container) = section_container(doc, anchor_id) else {
        return Vec::new();
    };
    let Some(item_sel) = sel("li.artdeco-list__item") else {
        return Vec::new();
    };
    container
        .select(&item_sel)
        .filter_map(|item| from_texts(visible_texts(item)))
        .collect()
}

fn join_rest(texts: &[String], from: usize) -> Option<String> {
    if texts.len() > from {
        Some(texts[from..].join(" "))
    } else {
        None
    }
}

fn experience_from_texts(texts: Vec<String>) -> Option<Experience> {
    let mut it = texts.iter();
    let role = it.next()?.clone();
    Some(Experience {
        role,
        company: it.next().cloned(),
        duration: it.next().cloned(),
        description: join_rest(&texts, 3),
    })
}

fn education_from_texts(texts: Vec<String>) -> Option<Education> {
    let mut it = texts.iter();
    Some(Education {
        institute: it.next()?.clone(),
        degree: it.next().cloned(),
        start_year: it.next().cloned(),
    })
}

fn skill_from_texts(texts: Vec<String>) -> Option<Skill> {
    texts.into_iter().next().map(|name| Skill { name })
}

fn certification_from_texts(texts: Vec<String>) -> Option<Certification> {
    let mut it = texts.iter();
    Some(Certification {
        name: it.next()?.clone(),
        issuer: it.next().cloned(),
        issue_date: it.next().cloned(),
    })
}

fn project_from_texts(texts: Vec<String>) -> Option<Project> {
    let mut it = texts.iter();
    Some(Project {
        name: it.next()?.clone(),
        description: join_rest(&texts, 1),
    })
}

fn parse_about(doc: &Html) -> Option<String> {
    let container = section_container(doc, "about")?;
    let text_sel = sel("div.display-flex.ph5.pv3")?;
    let text = container.select(&text_sel).next().map(element_text)?;
    (!text.is_empty()).then_some(text)
}

/// Best-effort numeric count from a `t-bold` span whose text mentions the
/// given keyword ("connection", "follower"). Absence is fine.
fn parse_count(doc: &Html, keyword: &str) -> Option<u64> {
    let bold_sel = sel("span.t-bold")?;
    doc.select(&bold_sel)
        .map(element_text)
        .find(|t| t.to_lowercase().contains(keyword))
        .and_then(|t| {
            let digits: String = t.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
}

fn parse_identity(doc: &Html, url: &str) -> BasicProfile {
    let name = sel("h1.text-heading-xlarge")
        .and_then(|s| doc.select(&s).next())
        .or_else(|| sel("h1").and_then(|s| doc.select(&s).next()))
        .map(element_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let mut headline = sel("div.text-body-medium")
        .and_then(|s| doc.select(&s).next())
        .map(element_text)
        .filter(|t| !t.is_empty());

    let location = sel("span.text-body-small.inline.t-black--light.break-words")
        .and_then(|s| doc.select(&s).next())
        .map(element_text)
        .filter(|t| !t.is_empty());

    let picture = sel(".pv-top-card-profile-picture img")
        .and_then(|s| doc.select(&s).next());

    let profile_picture = picture
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);

    let open_to_work = picture
        .and_then(|img| img.value().attr("title"))
        .is_some_and(|title| title.to_uppercase().contains("#OPEN_TO_WORK"));
    if open_to_work {
        if let Some(h) = headline.take() {
            headline = Some(format!("[OPEN TO WORK] {h}"));
        }
    }

    BasicProfile {
        profile_url: url.to_string(),
        full_name: name,
        headline,
        profile_picture,
        location,
        connection_count: parse_count(doc, "connection"),
        follower_count: parse_count(doc, "follower"),
    }
}

/// Parse the main profile page into a record. Contact info is populated
/// later from the overlay sub-view.
pub fn parse_profile(html: &str, url: &str) -> ProfileRecord {
    let doc = Html::parse_document(html);

    ProfileRecord {
        profile_url: url.to_string(),
        basic: parse_identity(&doc, url),
        about: parse_about(&doc),
        experience: section_items(&doc, "experience", experience_from_texts),
        education: section_items(&doc, "education", education_from_texts),
        skills: section_items(&doc, "skills", skill_from_texts),
        certifications: section_items(
            &doc,
            "licenses_and_certifications",
            certification_from_texts,
        ),
        projects: section_items(&doc, "projects", project_from_texts),
        contact_info: None,
        publications: vec![],
        honors_and_awards: vec![],
        volunteering: vec![],
        courses: vec![],
        languages: vec![],
    }
}

/// Find the first `h3` heading containing `substring` and its structural
/// `<section>` ancestor.
fn heading_section<'a>(
    doc: &'a Html,
    substring: &str,
) -> Option<(ElementRef<'a>, Option<ElementRef<'a>>)> {
    let h3_sel = sel("h3")?;
    let heading = doc
        .select(&h3_sel)
        .find(|h| element_text(*h).contains(substring))?;
    let section = heading
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "section");
    Some((heading, section))
}

/// Residual text of a heading's section with the heading text stripped out.
fn section_residual(heading: ElementRef<'_>, section: Option<ElementRef<'_>>) -> Option<String> {
    let section = section?;
    let full = element_text(section);
    let text = full.replace(&element_text(heading), "").trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Parse the contact-info overlay HTML. Each field is looked up
/// independently; missing ones stay absent.
pub fn parse_contact_info(html: &str) -> ContactInfo {
    let doc = Html::parse_document(html);
    let mut contact = ContactInfo::default();

    if let Some((_, section)) = heading_section(&doc, "Email") {
        if let (Some(section), Some(mail_sel)) = (section, sel(r#"a[href^="mailto:"]"#)) {
            contact.email = section
                .select(&mail_sel)
                .next()
                .map(element_text)
                .filter(|t| !t.is_empty());
        }
    }

    if let Some((_, section)) = heading_section(&doc, "Phone") {
        if let (Some(section), Some(span_sel)) = (section, sel("span.t-14")) {
            contact.phone = section
                .select(&span_sel)
                .next()
                .map(element_text)
                .filter(|t| !t.is_empty());
        }
    }

    if let Some((_, section)) = heading_section(&doc, "Website") {
        if let (Some(section), Some(link_sel)) = (section, sel("ul a[href]")) {
            contact.websites = section
                .select(&link_sel)
                .filter_map(|a| a.value().attr("href"))
                .map(str::to_string)
                .collect();
        }
    }

    if let Some((heading, section)) = heading_section(&doc, "Birthday") {
        contact.birthday = section_residual(heading, section);
    }

    if let Some((heading, section)) = heading_section(&doc, "Connected") {
        contact.connected_at = section_residual(heading, section);
    }

    // Any other outbound link in a contact-type section that is neither an
    // internal profile link nor already a website is classed as social.
    if let (Some(section_sel), Some(link_sel)) =
        (sel("section.pv-contact-info__contact-type"), sel("a[href]"))
    {
        for section in doc.select(&section_sel) {
            for href in section
                .select(&link_sel)
                .filter_map(|a| a.value().attr("href"))
            {
                if !href.contains("linkedin.com/in/")
                    && !href.contains("mailto:")
                    && !contact.websites.iter().any(|w| w == href)
                    && !contact.social_links.iter().any(|s| s == href)
                {
                    contact.social_links.push(href.to_string());
                }
            }
        }
    }

    contact
}
