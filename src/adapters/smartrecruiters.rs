//! SmartRecruiters postings.
//!
//! API: `GET https://api.smartrecruiters.com/v1/companies/{slug}/postings`
//! Response: `{ totalFound, offset, limit, "content": [ { id, uuid, name,
//! releasedDate, location: { city, region, country, remote }, department:
//! { label }, experienceLevel: { label }, typeOfEmployment: { label } } ] }`
//! Offset-paginated; postings link to the public board, not the API ref.

use serde_json::Value;

use super::{
    Parsed, detect_remote_type, detect_seniority, join_location_parts, list_under, text_field,
};
use crate::models::{NormalizedPosting, RemoteType, Seniority};

pub(super) fn parse(data: &Value, slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in list_under(data, &["content"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        let Some(title) = text_field(raw, "name") else {
            out.skip();
            continue;
        };
        let Some(job_id) = text_field(raw, "id")
            .or_else(|| text_field(raw, "uuid"))
            .or_else(|| super::int_field(raw, "id").map(|i| i.to_string()))
        else {
            out.skip();
            continue;
        };
        let url = format!("https://jobs.smartrecruiters.com/{slug}/{job_id}");

        let loc = raw.get("location").cloned().unwrap_or(Value::Null);
        let location = join_location_parts(
            text_field(&loc, "city"),
            text_field(&loc, "region"),
            text_field(&loc, "country"),
        );

        let remote_type = if loc.get("remote").and_then(Value::as_bool) == Some(true) {
            RemoteType::Remote
        } else {
            detect_remote_type(&title, location.as_deref(), raw)
        };

        let category = raw
            .get("department")
            .and_then(|d| text_field(d, "label"));

        let seniority = raw
            .get("experienceLevel")
            .and_then(|e| text_field(e, "label"))
            .and_then(|label| map_experience_label(&label))
            .unwrap_or_else(|| detect_seniority(&title));

        let mut tags: Vec<String> = Vec::new();
        if let Some(employment) = raw
            .get("typeOfEmployment")
            .and_then(|t| text_field(t, "label"))
        {
            tags.push(employment);
        }

        out.push(NormalizedPosting {
            url,
            location,
            remote_type,
            seniority: Some(seniority),
            category,
            tags,
            posted_at: text_field(raw, "releasedDate"),
            salary_currency: "USD".to_string(),
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}

fn map_experience_label(label: &str) -> Option<Seniority> {
    let label = label.to_lowercase();
    if label.contains("intern") {
        Some(Seniority::Intern)
    } else if label.contains("entry") || label.contains("junior") {
        Some(Seniority::Junior)
    } else if label.contains("mid") {
        Some(Seniority::Mid)
    } else if label.contains("senior") || label.contains("lead") {
        Some(Seniority::Senior)
    } else if label.contains("director") || label.contains("executive") || label.contains("vp") {
        Some(Seniority::Director)
    } else if label.contains("manager") {
        Some(Seniority::Manager)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_sample_page() {
        let data = json!({
            "totalFound": 1,
            "offset": 0,
            "limit": 100,
            "content": [
                {
                    "id": "abc-123",
                    "name": "Software Engineer",
                    "releasedDate": "2026-02-20T10:00:00.000Z",
                    "location": { "city": "Berlin", "country": "DE", "remote": false },
                    "department": { "label": "Engineering" },
                    "experienceLevel": { "label": "Mid-Senior level" },
                    "typeOfEmployment": { "label": "Full-time" }
                }
            ]
        });

        let parsed = parse(&data, "Acme");
        assert_eq!(parsed.postings.len(), 1);
        let job = &parsed.postings[0];
        assert_eq!(job.url, "https://jobs.smartrecruiters.com/Acme/abc-123");
        assert_eq!(job.location.as_deref(), Some("Berlin"));
        assert_eq!(job.category.as_deref(), Some("Engineering"));
        // "Mid-Senior level" hits the "mid" bucket first, as documented labels do.
        assert_eq!(job.seniority, Some(Seniority::Mid));
        assert_eq!(job.tags, vec!["Full-time"]);
    }

    #[test]
    fn test_remote_location_flag() {
        let data = json!({
            "content": [
                { "id": "1", "name": "Engineer", "location": { "remote": true } }
            ]
        });
        assert_eq!(parse(&data, "acme").postings[0].remote_type, RemoteType::Remote);
    }
}
