//! Greenhouse job boards.
//!
//! API: `GET https://boards-api.greenhouse.io/v1/boards/{slug}/jobs`
//! Response: `{ "jobs": [ { id, title, absolute_url, location: { name },
//! updated_at, metadata: [...], departments: [{ name }], content } ] }`
//! Salary hides in the free-text `metadata` entries; `content` is HTML and
//! only present with `?content=true`.

use serde_json::Value;

use super::{
    Parsed, detect_remote_type, detect_seniority, list_under, parse_salary_text, str_field,
    strip_html, text_field,
};
use crate::models::NormalizedPosting;

pub(super) fn parse(data: &Value, _slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in list_under(data, &["jobs"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        let Some(title) = text_field(raw, "title") else {
            out.skip();
            continue;
        };
        let Some(url) = text_field(raw, "absolute_url") else {
            out.skip();
            continue;
        };

        let location = raw
            .get("location")
            .and_then(|l| text_field(l, "name"))
            .or_else(|| text_field(raw, "location"));

        let description = str_field(raw, "content").and_then(strip_html);

        let (salary_min, salary_max, salary_currency) = metadata_salary(raw);

        let category = raw
            .get("departments")
            .and_then(Value::as_array)
            .and_then(|d| d.first())
            .and_then(|d| text_field(d, "name"));

        let remote_type = detect_remote_type(&title, location.as_deref(), raw);
        let seniority = Some(detect_seniority(&title));

        out.push(NormalizedPosting {
            url,
            location,
            description,
            salary_min,
            salary_max,
            salary_currency,
            remote_type,
            seniority,
            category,
            posted_at: text_field(raw, "updated_at"),
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}

/// Greenhouse carries compensation as free text inside named metadata entries.
fn metadata_salary(raw: &Value) -> (Option<i64>, Option<i64>, String) {
    if let Some(metadata) = raw.get("metadata").and_then(Value::as_array) {
        for item in metadata {
            let name = str_field(item, "name").unwrap_or("").to_lowercase();
            if name.contains("salary") || name.contains("compensation") {
                if let Some(value) = str_field(item, "value") {
                    return parse_salary_text(value);
                }
            }
        }
    }
    (None, None, "USD".to_string())
}
