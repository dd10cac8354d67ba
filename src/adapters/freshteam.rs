//! Freshteam job postings.
//!
//! API: `GET https://{slug}.freshteam.com/api/job_postings`
//! Response: array of `{ id, title, description (HTML), status, remote,
//! branch: { name, city, state, country }, department: { name }, type,
//! salary: { min, max, currency }, created_at, closing_date }`

use serde_json::Value;

use super::{
    Parsed, detect_remote_type, detect_seniority, int_field, join_location_parts, list_under,
    str_field, strip_html, text_field,
};
use crate::models::{NormalizedPosting, RemoteType};

pub(super) fn parse(data: &Value, slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in list_under(data, &["job_postings", "jobs", "data"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        // Only published postings are public; drafts are filtered, not errors.
        if let Some(status) = str_field(raw, "status") {
            if status != "published" {
                continue;
            }
        }

        let Some(title) = text_field(raw, "title") else {
            out.skip();
            continue;
        };
        let Some(job_id) =
            text_field(raw, "id").or_else(|| int_field(raw, "id").map(|i| i.to_string()))
        else {
            out.skip();
            continue;
        };
        let url = format!("https://{slug}.freshteam.com/jobs/{job_id}");

        let location = branch_location(raw.get("branch"));

        let (salary_min, salary_max, salary_currency) = extract_salary(raw.get("salary"));

        let remote_type = if raw.get("remote").and_then(Value::as_bool) == Some(true) {
            RemoteType::Remote
        } else {
            detect_remote_type(&title, location.as_deref(), raw)
        };

        let category = raw.get("department").and_then(|d| text_field(d, "name"));

        let mut tags: Vec<String> = Vec::new();
        if let Some(job_type) = text_field(raw, "type") {
            tags.push(job_type.replace('_', " "));
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
            category,
            tags,
            posted_at: text_field(raw, "created_at"),
            expires_at: text_field(raw, "closing_date"),
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}

fn branch_location(branch: Option<&Value>) -> Option<String> {
    let branch = branch.filter(|b| b.is_object())?;
    text_field(branch, "name").or_else(|| {
        join_location_parts(
            text_field(branch, "city"),
            text_field(branch, "state"),
            text_field(branch, "country"),
        )
    })
}

fn extract_salary(salary: Option<&Value>) -> (Option<i64>, Option<i64>, String) {
    let Some(salary) = salary.filter(|s| s.is_object()) else {
        return (None, None, "USD".to_string());
    };
    let currency = str_field(salary, "currency")
        .filter(|c| !c.is_empty())
        .unwrap_or("USD")
        .to_string();
    (int_field(salary, "min"), int_field(salary, "max"), currency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_sample_postings() {
        let data = json!([
            {
                "id": 123456,
                "title": "Software Engineer",
                "description": "<p>HTML</p>",
                "status": "published",
                "remote": true,
                "branch": { "name": "Chennai" },
                "department": { "name": "Engineering" },
                "type": "full_time",
                "salary": { "min": 120000, "max": 180000, "currency": "USD" },
                "created_at": "2026-02-20T10:00:00Z",
                "closing_date": "2026-04-01"
            },
            {
                "id": 123457,
                "title": "Unpublished Role",
                "status": "draft"
            }
        ]);

        let parsed = parse(&data, "acme");
        assert_eq!(parsed.postings.len(), 1);
        assert_eq!(parsed.skipped, 0);

        let job = &parsed.postings[0];
        assert_eq!(job.url, "https://acme.freshteam.com/jobs/123456");
        assert_eq!(job.remote_type, RemoteType::Remote);
        assert_eq!(job.expires_at.as_deref(), Some("2026-04-01"));
        assert_eq!(job.category.as_deref(), Some("Engineering"));
    }

    #[test]
    fn test_branch_location_from_parts() {
        let branch = json!({ "city": "Austin", "state": "TX", "country": "US" });
        assert_eq!(branch_location(Some(&branch)), Some("Austin, TX".to_string()));
    }
}
