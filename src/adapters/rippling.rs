//! Rippling ATS boards.
//!
//! API: `GET https://ats.rippling.com/api/{slug}/jobs`
//! Response: array of `{ id, title, slug, department, location,
//! workplaceType (REMOTE|HYBRID|ONSITE), employmentType, description (HTML),
//! compensationRange: { min, max, currency }, publishedAt, url }`

use serde_json::Value;

use super::{
    Parsed, detect_remote_type, detect_seniority, int_field, list_under, str_field, strip_html,
    text_field,
};
use crate::models::{NormalizedPosting, RemoteType};

pub(super) fn parse(data: &Value, slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in list_under(data, &["jobs", "data", "results"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        let Some(title) = text_field(raw, "title") else {
            out.skip();
            continue;
        };
        let url = text_field(raw, "url").unwrap_or_else(|| {
            let job_id = text_field(raw, "id")
                .or_else(|| text_field(raw, "slug"))
                .unwrap_or_default();
            format!("https://ats.rippling.com/{slug}/jobs/{job_id}")
        });

        let location = text_field(raw, "location");

        let (salary_min, salary_max, salary_currency) =
            extract_compensation(raw.get("compensationRange"));

        let remote_type = match str_field(raw, "workplaceType")
            .map(str::to_uppercase)
            .as_deref()
        {
            Some("REMOTE") => RemoteType::Remote,
            Some("HYBRID") => RemoteType::Hybrid,
            Some("ONSITE") | Some("ON_SITE") | Some("IN_OFFICE") => RemoteType::Onsite,
            _ => detect_remote_type(&title, location.as_deref(), raw),
        };

        let mut tags: Vec<String> = Vec::new();
        if let Some(employment) = text_field(raw, "employmentType") {
            tags.push(titlecase_words(&employment.replace('_', " ")));
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
            posted_at: text_field(raw, "publishedAt").or_else(|| text_field(raw, "created_at")),
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}

fn extract_compensation(comp: Option<&Value>) -> (Option<i64>, Option<i64>, String) {
    let Some(comp) = comp.filter(|c| c.is_object()) else {
        return (None, None, "USD".to_string());
    };
    let currency = str_field(comp, "currency")
        .filter(|c| !c.is_empty())
        .unwrap_or("USD")
        .to_string();
    (int_field(comp, "min"), int_field(comp, "max"), currency)
}

fn titlecase_words(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
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
                "slug": "software-engineer",
                "department": "Engineering",
                "location": "San Francisco, CA",
                "workplaceType": "REMOTE",
                "employmentType": "FULL_TIME",
                "description": "<p>HTML</p>",
                "compensationRange": { "min": 120000, "max": 180000, "currency": "USD" },
                "publishedAt": "2026-02-20T10:00:00Z",
                "url": "https://ats.rippling.com/acme/jobs/abc-123"
            }
        ]);

        let parsed = parse(&data, "acme");
        assert_eq!(parsed.postings.len(), 1);
        let job = &parsed.postings[0];
        assert_eq!(job.remote_type, RemoteType::Remote);
        assert_eq!(job.salary_max, Some(180_000));
        assert_eq!(job.tags, vec!["Full Time"]);
    }

    #[test]
    fn test_url_fallback_from_id() {
        let data = json!([{ "id": "x1", "title": "Engineer" }]);
        assert_eq!(
            parse(&data, "acme").postings[0].url,
            "https://ats.rippling.com/acme/jobs/x1"
        );
    }
}
