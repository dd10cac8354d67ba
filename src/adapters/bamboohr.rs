//! BambooHR careers lists.
//!
//! API: `GET https://{slug}.bamboohr.com/careers/list` (JSON with an
//! `Accept: application/json` header)
//! Response: `{ "result": [ { id, jobOpeningName, departmentLabel,
//! locationLabel, employmentStatusLabel, jobOpeningUrl, isRemote } ] }`,
//! or `{ "result": { "jobOpenings": [ ... ] } }` for some tenants.
//! `jobOpeningUrl` may be absolute or site-relative.

use serde_json::Value;

use super::{Parsed, detect_remote_type, detect_seniority, int_field, str_field, text_field};
use crate::models::{NormalizedPosting, RemoteType};

pub(super) fn parse(data: &Value, slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in job_list(data) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        let Some(title) =
            text_field(raw, "jobOpeningName").or_else(|| text_field(raw, "title"))
        else {
            out.skip();
            continue;
        };
        let Some(job_id) =
            text_field(raw, "id").or_else(|| int_field(raw, "id").map(|i| i.to_string()))
        else {
            out.skip();
            continue;
        };

        let url = match text_field(raw, "jobOpeningUrl") {
            Some(path) if path.starts_with("http") => path,
            Some(path) => format!("https://{slug}.bamboohr.com{path}"),
            None => format!("https://{slug}.bamboohr.com/careers/{job_id}"),
        };

        let location = text_field(raw, "locationLabel").or_else(|| text_field(raw, "location"));

        let is_remote = matches!(
            str_field(raw, "isRemote").map(str::to_lowercase).as_deref(),
            Some("yes") | Some("true") | Some("1")
        );
        let remote_type = if is_remote {
            RemoteType::Remote
        } else {
            detect_remote_type(&title, location.as_deref(), raw)
        };

        let mut tags: Vec<String> = Vec::new();
        if let Some(status) = text_field(raw, "employmentStatusLabel") {
            tags.push(status);
        }

        out.push(NormalizedPosting {
            url,
            location,
            remote_type,
            seniority: Some(detect_seniority(&title)),
            category: text_field(raw, "departmentLabel")
                .or_else(|| text_field(raw, "department")),
            tags,
            salary_currency: "USD".to_string(),
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}

fn job_list(data: &Value) -> &[Value] {
    if let Some(items) = data.as_array() {
        return items;
    }
    match data.get("result") {
        Some(Value::Array(items)) => items,
        Some(result @ Value::Object(_)) => super::list_under(result, &["jobOpenings", "jobs"]),
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_flat_result() {
        let data = json!({
            "result": [
                {
                    "id": "123",
                    "jobOpeningName": "Software Engineer",
                    "departmentLabel": "Engineering",
                    "locationLabel": "San Francisco, CA",
                    "employmentStatusLabel": "Full-Time",
                    "jobOpeningUrl": "/careers/123",
                    "isRemote": "yes"
                }
            ]
        });

        let parsed = parse(&data, "acme");
        assert_eq!(parsed.postings.len(), 1);
        let job = &parsed.postings[0];
        assert_eq!(job.url, "https://acme.bamboohr.com/careers/123");
        assert_eq!(job.remote_type, RemoteType::Remote);
        assert_eq!(job.category.as_deref(), Some("Engineering"));
        assert_eq!(job.tags, vec!["Full-Time"]);
    }

    #[test]
    fn test_parse_nested_job_openings_variant() {
        let data = json!({
            "result": {
                "jobOpenings": [
                    { "id": 7, "jobOpeningName": "Designer" }
                ]
            }
        });
        let parsed = parse(&data, "acme");
        assert_eq!(parsed.postings.len(), 1);
        assert_eq!(parsed.postings[0].url, "https://acme.bamboohr.com/careers/7");
    }
}
