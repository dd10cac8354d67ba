//! Pinpoint postings.
//!
//! API: `GET https://{slug}.pinpointhq.com/postings.json`
//! Response: `{ "data": [ { id, type, attributes: { title, description
//! (HTML), slug, location_name, department_name, employment_type, remote,
//! published_at, url } } ] }`; some tenants return the attributes flat.

use serde_json::Value;

use super::{Parsed, detect_remote_type, detect_seniority, list_under, str_field, strip_html, text_field};
use crate::models::{NormalizedPosting, RemoteType};

pub(super) fn parse(data: &Value, slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in list_under(data, &["data", "postings"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        // JSON:API or flat: attributes live either one level down or inline.
        let attrs = if raw.get("attributes").is_some_and(Value::is_object) {
            raw.get("attributes").cloned().unwrap_or(Value::Null)
        } else {
            raw.clone()
        };

        let Some(title) = text_field(&attrs, "title") else {
            out.skip();
            continue;
        };

        let url = text_field(&attrs, "url").unwrap_or_else(|| {
            let posting_slug = text_field(&attrs, "slug")
                .or_else(|| text_field(raw, "id"))
                .unwrap_or_default();
            format!("https://{slug}.pinpointhq.com/postings/{posting_slug}")
        });

        let location = text_field(&attrs, "location_name")
            .or_else(|| text_field(&attrs, "location"));

        let remote_type = if attrs.get("remote").and_then(Value::as_bool) == Some(true) {
            RemoteType::Remote
        } else {
            detect_remote_type(&title, location.as_deref(), &attrs)
        };

        let mut tags: Vec<String> = Vec::new();
        if let Some(employment) = text_field(&attrs, "employment_type") {
            tags.push(employment.replace('_', " "));
        }

        out.push(NormalizedPosting {
            url,
            location,
            description: str_field(&attrs, "description").and_then(strip_html),
            remote_type,
            seniority: Some(detect_seniority(&title)),
            category: text_field(&attrs, "department_name")
                .or_else(|| text_field(&attrs, "department")),
            tags,
            posted_at: text_field(&attrs, "published_at")
                .or_else(|| text_field(&attrs, "created_at")),
            salary_currency: "USD".to_string(),
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_api_shape() {
        let data = json!({
            "data": [
                {
                    "id": "123456",
                    "type": "postings",
                    "attributes": {
                        "title": "Software Engineer",
                        "description": "<p>HTML</p>",
                        "slug": "software-engineer-123",
                        "location_name": "London",
                        "department_name": "Engineering",
                        "employment_type": "full_time",
                        "remote": true,
                        "published_at": "2026-02-20T10:00:00Z",
                        "url": "https://acme.pinpointhq.com/postings/software-engineer-123"
                    }
                }
            ]
        });

        let parsed = parse(&data, "acme");
        assert_eq!(parsed.postings.len(), 1);
        let job = &parsed.postings[0];
        assert_eq!(job.remote_type, RemoteType::Remote);
        assert_eq!(job.category.as_deref(), Some("Engineering"));
        assert_eq!(job.tags, vec!["full time"]);
    }

    #[test]
    fn test_flat_shape_and_url_fallback() {
        let data = json!({
            "postings": [
                { "title": "Engineer", "slug": "engineer-7" }
            ]
        });
        assert_eq!(
            parse(&data, "acme").postings[0].url,
            "https://acme.pinpointhq.com/postings/engineer-7"
        );
    }
}
