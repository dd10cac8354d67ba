//! Breezy HR positions.
//!
//! API: `GET https://{slug}.breezy.hr/json`
//! Response: array of `{ id, name, friendly_id, url, location: { name, city,
//! state: { name }, country: { name }, is_remote }, department, type:
//! { name }, experience: { id, name }, description (HTML), published_date,
//! category: { name } }`

use serde_json::Value;

use super::{
    Parsed, detect_remote_type, detect_seniority, list_under, str_field, strip_html, text_field,
};
use crate::models::{NormalizedPosting, RemoteType, Seniority};

pub(super) fn parse(data: &Value, slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in list_under(data, &["positions", "jobs", "results"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        let Some(title) = text_field(raw, "name") else {
            out.skip();
            continue;
        };
        let mut url = text_field(raw, "url").unwrap_or_default();
        if url.is_empty() {
            let job_id = text_field(raw, "id").unwrap_or_default();
            if job_id.is_empty() {
                out.skip();
                continue;
            }
            let friendly = text_field(raw, "friendly_id").unwrap_or_default();
            url = format!("https://{slug}.breezy.hr/p/{job_id}/{friendly}");
        }

        let location = build_location(raw.get("location"));

        let is_remote = raw
            .get("location")
            .and_then(|l| l.get("is_remote"))
            .and_then(Value::as_bool)
            == Some(true);
        let remote_type = if is_remote {
            RemoteType::Remote
        } else {
            detect_remote_type(&title, location.as_deref(), raw)
        };

        let seniority = map_experience(raw.get("experience"))
            .unwrap_or_else(|| detect_seniority(&title));

        let category = raw
            .get("category")
            .and_then(|c| text_field(c, "name"))
            .or_else(|| text_field(raw, "department"));

        let mut tags: Vec<String> = Vec::new();
        if let Some(job_type) = raw.get("type").and_then(|t| text_field(t, "name")) {
            tags.push(job_type);
        }

        out.push(NormalizedPosting {
            url,
            location,
            description: str_field(raw, "description").and_then(strip_html),
            remote_type,
            seniority: Some(seniority),
            category,
            tags,
            posted_at: text_field(raw, "published_date"),
            salary_currency: "USD".to_string(),
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}

fn build_location(loc: Option<&Value>) -> Option<String> {
    let loc = loc?;
    if let Some(s) = loc.as_str() {
        return Some(s.to_string());
    }
    if !loc.is_object() {
        return None;
    }
    if let Some(name) = text_field(loc, "name") {
        return Some(name);
    }

    let mut parts: Vec<String> = Vec::new();
    if let Some(city) = text_field(loc, "city") {
        parts.push(city);
    }
    match loc.get("state") {
        Some(Value::Object(_)) => {
            if let Some(state) = loc.get("state").and_then(|s| text_field(s, "name")) {
                parts.push(state);
            }
        }
        Some(Value::String(s)) if !s.is_empty() => parts.push(s.clone()),
        _ => {}
    }
    if parts.is_empty() {
        if let Some(country) = loc.get("country").and_then(|c| text_field(c, "name")) {
            parts.push(country);
        }
    }
    if parts.is_empty() { None } else { Some(parts.join(", ")) }
}

fn map_experience(exp: Option<&Value>) -> Option<Seniority> {
    let exp_id = match exp? {
        Value::Object(obj) => obj.get("id").and_then(Value::as_str)?.to_lowercase(),
        Value::String(s) => s.to_lowercase(),
        _ => return None,
    };
    match exp_id.as_str() {
        "intern" => Some(Seniority::Intern),
        "entrylevel" | "entry_level" | "junior" => Some(Seniority::Junior),
        "midlevel" | "mid_level" | "mid" => Some(Seniority::Mid),
        "seniorlevel" | "senior_level" | "senior" | "lead" => Some(Seniority::Senior),
        "director" | "executive" => Some(Seniority::Director),
        "manager" => Some(Seniority::Manager),
        _ => None,
    }
}
