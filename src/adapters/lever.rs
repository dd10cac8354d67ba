//! Lever postings.
//!
//! API: `GET https://api.lever.co/v0/postings/{slug}?mode=json`
//! Response: array of `{ id, text, hostedUrl, categories: { commitment,
//! department, location, team }, descriptionPlain, salaryRange: { min, max,
//! currency }, workplaceType, createdAt }`; createdAt is epoch milliseconds.

use chrono::DateTime;
use serde_json::Value;

use super::{
    Parsed, detect_remote_type, detect_seniority, int_field, list_under, str_field, text_field,
};
use crate::models::{NormalizedPosting, RemoteType};

pub(super) fn parse(data: &Value, _slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in list_under(data, &["postings", "results"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        let Some(title) = text_field(raw, "text") else {
            out.skip();
            continue;
        };
        let Some(url) = text_field(raw, "hostedUrl") else {
            out.skip();
            continue;
        };

        // A salaryRange that exists but isn't an object is a malformed record.
        let (salary_min, salary_max, salary_currency) = match salary_range(raw) {
            Some(salary) => salary,
            None => {
                out.skip();
                continue;
            }
        };

        let categories = raw.get("categories").cloned().unwrap_or(Value::Null);
        let location = text_field(&categories, "location");
        let category = text_field(&categories, "department");

        let remote_type = match str_field(raw, "workplaceType").unwrap_or("") {
            "remote" => RemoteType::Remote,
            "hybrid" => RemoteType::Hybrid,
            "onsite" | "on-site" => RemoteType::Onsite,
            _ => detect_remote_type(&title, location.as_deref(), raw),
        };

        let mut tags: Vec<String> = Vec::new();
        if let Some(commitment) = text_field(&categories, "commitment") {
            tags.push(commitment);
        }
        if let Some(team) = text_field(&categories, "team") {
            tags.push(team);
        }

        let posted_at = int_field(raw, "createdAt")
            .filter(|ms| *ms > 0)
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339());

        out.push(NormalizedPosting {
            url,
            location,
            description: text_field(raw, "descriptionPlain"),
            salary_min,
            salary_max,
            salary_currency,
            remote_type,
            seniority: Some(detect_seniority(&title)),
            category,
            tags,
            posted_at,
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}

/// None means the field was present but unusable.
fn salary_range(raw: &Value) -> Option<(Option<i64>, Option<i64>, String)> {
    match raw.get("salaryRange") {
        None | Some(Value::Null) => Some((None, None, "USD".to_string())),
        Some(Value::Object(range)) => {
            let min = range.get("min").and_then(Value::as_i64);
            let max = range.get("max").and_then(Value::as_i64);
            let currency = range
                .get("currency")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .unwrap_or("USD")
                .to_string();
            Some((min, max, currency))
        }
        Some(_) => None,
    }
}
