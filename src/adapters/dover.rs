//! Dover careers pages.
//!
//! API: `GET https://app.dover.com/api/careers-page/{slug}/jobs`
//! Response: array of `{ id, title, location, department, is_remote,
//! employment_type, url, description, published_date, salary: { min, max,
//! currency } }`; salary occasionally arrives as a display string instead.

use serde_json::Value;

use super::{
    Parsed, detect_remote_type, detect_seniority, int_field, list_under, parse_salary_text,
    str_field, strip_html, text_field,
};
use crate::models::{NormalizedPosting, RemoteType};

pub(super) fn parse(data: &Value, slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in list_under(data, &["jobs", "results"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        let Some(title) = text_field(raw, "title") else {
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
            url = format!("https://app.dover.com/apply/{slug}/{job_id}");
        }

        let location = text_field(raw, "location");
        let (salary_min, salary_max, salary_currency) = extract_salary(raw);

        let remote_type = if raw.get("is_remote").and_then(Value::as_bool) == Some(true) {
            RemoteType::Remote
        } else {
            detect_remote_type(&title, location.as_deref(), raw)
        };

        let mut tags: Vec<String> = Vec::new();
        if let Some(employment) = text_field(raw, "employment_type") {
            tags.push(employment);
        }

        out.push(NormalizedPosting {
            url,
            location,
            description: str_field(raw, "description").and_then(strip_html),
            salary_min,
            salary_max,
            salary_currency,
            remote_type,
            seniority: Some(detect_seniority(&title)),
            category: text_field(raw, "department"),
            tags,
            posted_at: text_field(raw, "published_date")
                .or_else(|| text_field(raw, "created_at")),
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}

fn extract_salary(raw: &Value) -> (Option<i64>, Option<i64>, String) {
    match raw.get("salary") {
        Some(Value::Object(salary)) => {
            let currency = salary
                .get("currency")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .unwrap_or("USD")
                .to_string();
            let obj = Value::Object(salary.clone());
            (int_field(&obj, "min"), int_field(&obj, "max"), currency)
        }
        Some(Value::String(s)) => parse_salary_text(s),
        _ => (None, None, "USD".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_sample_jobs() {
        let data = json!([
            {
                "id": "abc-123",
                "title": "Software Engineer",
                "location": "San Francisco, CA",
                "department": "Engineering",
                "is_remote": true,
                "employment_type": "Full-time",
                "url": "https://app.dover.com/apply/acme/abc-123",
                "description": "<p>Hello</p>",
                "published_date": "2026-02-20T10:00:00Z",
                "salary": { "min": 120000, "max": 180000, "currency": "USD" }
            }
        ]);

        let parsed = parse(&data, "acme");
        assert_eq!(parsed.postings.len(), 1);
        let job = &parsed.postings[0];
        assert_eq!(job.salary_min, Some(120_000));
        assert_eq!(job.remote_type, RemoteType::Remote);
        assert_eq!(job.tags, vec!["Full-time"]);
    }

    #[test]
    fn test_string_salary_variant() {
        let data = json!([
            {
                "id": "x",
                "title": "Engineer",
                "salary": "$100k - $140k"
            }
        ]);
        let job = &parse(&data, "acme").postings[0];
        assert_eq!(job.salary_min, Some(100_000));
        assert_eq!(job.salary_max, Some(140_000));
        assert_eq!(job.url, "https://app.dover.com/apply/acme/x");
    }
}
