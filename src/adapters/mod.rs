//! One normalizer per ATS provider: a pure mapping from the provider's raw
//! JSON response to the canonical posting shape. Adapters never touch the
//! network or the database.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::models::{Ats, NormalizedPosting, RemoteType, Seniority};

mod ashby;
mod bamboohr;
mod breezy;
mod dover;
mod freshteam;
mod greenhouse;
mod lever;
mod personio;
mod pinpoint;
mod recruitee;
mod rippling;
mod smartrecruiters;
mod teamtailor;
mod workable;

/// Result of normalizing one response page. A malformed record within an
/// otherwise-valid response lands in `skipped` and never aborts the rest.
#[derive(Debug, Default)]
pub struct Parsed {
    pub postings: Vec<NormalizedPosting>,
    pub skipped: usize,
}

impl Parsed {
    pub(crate) fn push(&mut self, posting: NormalizedPosting) {
        self.postings.push(posting);
    }

    pub(crate) fn skip(&mut self) {
        self.skipped += 1;
    }
}

/// Normalize one response page from the given provider.
pub fn parse_postings(ats: Ats, data: &Value, slug: &str) -> Parsed {
    match ats {
        Ats::Greenhouse => greenhouse::parse(data, slug),
        Ats::Lever => lever::parse(data, slug),
        Ats::Ashby => ashby::parse(data, slug),
        Ats::Workable => workable::parse(data, slug),
        Ats::SmartRecruiters => smartrecruiters::parse(data, slug),
        Ats::Recruitee => recruitee::parse(data, slug),
        Ats::Dover => dover::parse(data, slug),
        Ats::Breezy => breezy::parse(data, slug),
        Ats::BambooHr => bamboohr::parse(data, slug),
        Ats::Teamtailor => teamtailor::parse(data, slug),
        Ats::Pinpoint => pinpoint::parse(data, slug),
        Ats::Rippling => rippling::parse(data, slug),
        Ats::Personio => personio::parse(data, slug),
        Ats::Freshteam => freshteam::parse(data, slug),
    }
}

/// URL of the next page, if this provider paginates and the page just fetched
/// was not the last one. Pagination is sequential within a company.
pub fn next_page_url(ats: Ats, data: &Value, current_url: &str) -> Option<String> {
    match ats {
        // Workable hands back a full cursor URL.
        Ats::Workable => data
            .get("paging")
            .and_then(|p| p.get("next"))
            .and_then(Value::as_str)
            .filter(|next| !next.is_empty())
            .map(str::to_string),
        // SmartRecruiters pages with offset/limit windows.
        Ats::SmartRecruiters => {
            let total = data.get("totalFound")?.as_u64()?;
            let offset = data.get("offset").and_then(Value::as_u64).unwrap_or(0);
            let limit = data.get("limit").and_then(Value::as_u64).unwrap_or(100);
            let next_offset = offset + limit;
            if next_offset >= total || limit == 0 {
                return None;
            }
            let base = current_url.split('?').next().unwrap_or(current_url);
            Some(format!("{base}?offset={next_offset}&limit={limit}"))
        }
        // Everything else returns the full list in one shot.
        _ => None,
    }
}

// --- Shared field access ---

/// Providers wrap their list under varying keys (or not at all). Accept a
/// bare array, or the first of `keys` holding an array; anything else is an
/// empty response.
pub(crate) fn list_under<'a>(data: &'a Value, keys: &[&str]) -> &'a [Value] {
    if let Some(items) = data.as_array() {
        return items;
    }
    for key in keys {
        if let Some(items) = data.get(key).and_then(Value::as_array) {
            return items;
        }
    }
    &[]
}

pub(crate) fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

/// Trimmed, non-empty string field.
pub(crate) fn text_field(v: &Value, key: &str) -> Option<String> {
    str_field(v, key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn int_field(v: &Value, key: &str) -> Option<i64> {
    match v.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

// --- Shared inference ---

/// Infer remote/hybrid/onsite from title, location text and the raw payload.
/// "hybrid" wins over "remote" so "remote-hybrid" listings classify as hybrid.
pub(crate) fn detect_remote_type(title: &str, location: Option<&str>, raw: &Value) -> RemoteType {
    let text = format!("{} {}", title, location.unwrap_or("")).to_lowercase();
    let meta = raw.to_string().to_lowercase();

    if text.contains("hybrid") || meta.contains("hybrid") {
        return RemoteType::Hybrid;
    }
    if text.contains("remote") || meta.contains("remote") {
        return RemoteType::Remote;
    }
    if text.contains("on-site")
        || text.contains("onsite")
        || text.contains("in-office")
        || meta.contains("on-site")
        || meta.contains("onsite")
    {
        return RemoteType::Onsite;
    }
    RemoteType::Unknown
}

/// Infer seniority from title keywords. Senior-track markers are checked
/// before "manager" so "Senior Engineering Manager" stays senior.
pub(crate) fn detect_seniority(title: &str) -> Seniority {
    let t = title.to_lowercase();
    if t.contains("intern ") || t.ends_with("intern") || t.contains("internship") {
        return Seniority::Intern;
    }
    if ["junior", "jr.", "jr ", "entry level", "entry-level", "new grad"]
        .iter()
        .any(|k| t.contains(k))
    {
        return Seniority::Junior;
    }
    if ["senior", "sr.", "sr ", "lead", "principal", "staff"]
        .iter()
        .any(|k| t.contains(k))
    {
        return Seniority::Senior;
    }
    if ["director", "vp ", "vice president", "head of", "chief"]
        .iter()
        .any(|k| t.contains(k))
    {
        return Seniority::Director;
    }
    if t.contains("manager") {
        return Seniority::Manager;
    }
    Seniority::Mid
}

/// Parse salary text like "$120,000 - $180,000" or "$120K–$180K".
/// Returns (min, max, currency).
pub(crate) fn parse_salary_text(s: &str) -> (Option<i64>, Option<i64>, String) {
    static AMOUNT_RE: OnceLock<Regex> = OnceLock::new();
    let re = AMOUNT_RE.get_or_init(|| Regex::new(r"[\d][\d,]*\.?\d*[kK]?").expect("amount regex"));

    let lower = s.to_lowercase();
    let currency = if s.contains('€') || lower.contains("eur") {
        "EUR"
    } else if s.contains('£') || lower.contains("gbp") {
        "GBP"
    } else {
        "USD"
    };

    let mut parsed: Vec<i64> = Vec::new();
    for m in re.find_iter(s) {
        let amt = m.as_str().replace(',', "");
        let value = if let Some(stripped) = amt.strip_suffix(['k', 'K']) {
            stripped.parse::<f64>().ok().map(|v| (v * 1000.0) as i64)
        } else {
            amt.parse::<f64>().ok().filter(|v| *v > 0.0).map(|v| v as i64)
        };
        if let Some(v) = value {
            parsed.push(v);
        }
    }

    match parsed.len() {
        0 => (None, None, currency.to_string()),
        1 => (Some(parsed[0]), None, currency.to_string()),
        _ => (
            parsed.iter().min().copied(),
            parsed.iter().max().copied(),
            currency.to_string(),
        ),
    }
}

/// Strip HTML down to collapsed plain text for the description column.
pub(crate) fn strip_html(html: &str) -> Option<String> {
    if html.is_empty() {
        return None;
    }
    let fragment = scraper::Html::parse_fragment(html);
    let text = fragment
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() { None } else { Some(text) }
}

/// "City, Region"; country only when nothing more specific exists.
pub(crate) fn join_location_parts(
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(city) = city {
        parts.push(city);
    }
    if let Some(region) = region {
        parts.push(region);
    }
    if parts.is_empty() {
        if let Some(country) = country {
            parts.push(country);
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_remote_type_precedence() {
        let none = json!({});
        assert_eq!(
            detect_remote_type("Engineer (Remote)", None, &none),
            RemoteType::Remote
        );
        assert_eq!(
            detect_remote_type("Engineer", Some("Hybrid - NYC"), &none),
            RemoteType::Hybrid
        );
        // Hybrid beats remote when both appear.
        assert_eq!(
            detect_remote_type("Engineer", Some("Remote (hybrid)"), &none),
            RemoteType::Hybrid
        );
        assert_eq!(
            detect_remote_type("Engineer", Some("NYC (on-site)"), &none),
            RemoteType::Onsite
        );
        assert_eq!(
            detect_remote_type("Engineer", Some("NYC"), &none),
            RemoteType::Unknown
        );
        // Flag buried in the raw payload still counts.
        assert_eq!(
            detect_remote_type("Engineer", None, &json!({"workplaceType": "remote"})),
            RemoteType::Remote
        );
    }

    #[test]
    fn test_detect_seniority_keywords() {
        assert_eq!(detect_seniority("Software Engineering Intern"), Seniority::Intern);
        assert_eq!(detect_seniority("Junior Developer"), Seniority::Junior);
        assert_eq!(detect_seniority("Senior Software Engineer"), Seniority::Senior);
        assert_eq!(detect_seniority("Staff Engineer - Platform"), Seniority::Senior);
        assert_eq!(detect_seniority("Senior Engineering Manager"), Seniority::Senior);
        assert_eq!(detect_seniority("Engineering Manager"), Seniority::Manager);
        assert_eq!(detect_seniority("VP of Engineering"), Seniority::Director);
        assert_eq!(detect_seniority("Head of Data"), Seniority::Director);
        assert_eq!(detect_seniority("Software Engineer"), Seniority::Mid);
    }

    #[test]
    fn test_parse_salary_text_variants() {
        assert_eq!(
            parse_salary_text("$120,000 - $180,000"),
            (Some(120_000), Some(180_000), "USD".to_string())
        );
        assert_eq!(
            parse_salary_text("$120K – $180K"),
            (Some(120_000), Some(180_000), "USD".to_string())
        );
        assert_eq!(
            parse_salary_text("€90k-€120k"),
            (Some(90_000), Some(120_000), "EUR".to_string())
        );
        assert_eq!(
            parse_salary_text("up to £85,000"),
            (Some(85_000), None, "GBP".to_string())
        );
        assert_eq!(parse_salary_text(""), (None, None, "USD".to_string()));
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>We are <b>hiring</b>!</p>\n<p>Apply  now.</p>"),
            Some("We are hiring ! Apply now.".to_string())
        );
        assert_eq!(strip_html(""), None);
        assert_eq!(strip_html("<div></div>"), None);
    }

    #[test]
    fn test_join_location_parts() {
        assert_eq!(
            join_location_parts(
                Some("San Francisco".into()),
                Some("California".into()),
                Some("United States".into())
            ),
            Some("San Francisco, California".to_string())
        );
        assert_eq!(
            join_location_parts(None, None, Some("United States".into())),
            Some("United States".to_string())
        );
        assert_eq!(join_location_parts(None, None, None), None);
    }

    #[test]
    fn test_next_page_url_workable_cursor() {
        let data = json!({
            "results": [],
            "paging": { "next": "https://apply.workable.com/api/v3/accounts/acme/jobs?token=xyz" }
        });
        assert_eq!(
            next_page_url(Ats::Workable, &data, "https://apply.workable.com/api/v3/accounts/acme/jobs"),
            Some("https://apply.workable.com/api/v3/accounts/acme/jobs?token=xyz".to_string())
        );
        let last = json!({"results": []});
        assert_eq!(
            next_page_url(Ats::Workable, &last, "https://apply.workable.com/api/v3/accounts/acme/jobs"),
            None
        );
    }

    #[test]
    fn test_next_page_url_smartrecruiters_offset() {
        let url = "https://api.smartrecruiters.com/v1/companies/acme/postings";
        let page1 = json!({"totalFound": 250, "offset": 0, "limit": 100, "content": []});
        assert_eq!(
            next_page_url(Ats::SmartRecruiters, &page1, url),
            Some(format!("{url}?offset=100&limit=100"))
        );
        let page3 = json!({"totalFound": 250, "offset": 200, "limit": 100, "content": []});
        assert_eq!(next_page_url(Ats::SmartRecruiters, &page3, url), None);
    }

    #[test]
    fn test_single_shot_providers_never_paginate() {
        let data = json!({"jobs": [], "paging": {"next": "https://x.example.com"}});
        assert_eq!(next_page_url(Ats::Greenhouse, &data, "u"), None);
        assert_eq!(next_page_url(Ats::Lever, &data, "u"), None);
    }
}
