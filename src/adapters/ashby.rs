//! Ashby job boards.
//!
//! API: `GET https://api.ashbyhq.com/posting-api/job-board/{slug}`
//! Response: `{ "jobs": [ { title, location, department, team, isRemote,
//! isListed, publishedAt, jobUrl, applyUrl, descriptionPlain,
//! compensationTierSummary } ] }`; compensation is display text like
//! "$120K – $180K".

use serde_json::Value;

use super::{
    Parsed, detect_remote_type, detect_seniority, list_under, parse_salary_text, str_field,
    text_field,
};
use crate::models::{NormalizedPosting, RemoteType};

pub(super) fn parse(data: &Value, _slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in list_under(data, &["jobs"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        // Unlisted jobs are intentionally hidden, not malformed.
        if raw.get("isListed").and_then(Value::as_bool) == Some(false) {
            continue;
        }

        let Some(title) = text_field(raw, "title") else {
            out.skip();
            continue;
        };
        let Some(url) = text_field(raw, "jobUrl").or_else(|| text_field(raw, "applyUrl")) else {
            out.skip();
            continue;
        };

        let location = text_field(raw, "location");
        let (salary_min, salary_max, salary_currency) =
            parse_salary_text(str_field(raw, "compensationTierSummary").unwrap_or(""));

        let remote_type = if raw.get("isRemote").and_then(Value::as_bool) == Some(true) {
            RemoteType::Remote
        } else {
            detect_remote_type(&title, location.as_deref(), raw)
        };

        let mut tags: Vec<String> = Vec::new();
        if let Some(employment_type) = text_field(raw, "employmentType") {
            tags.push(employment_type);
        }
        if let Some(team) = text_field(raw, "team") {
            tags.push(team);
        }

        out.push(NormalizedPosting {
            url,
            location,
            description: text_field(raw, "descriptionPlain"),
            salary_min,
            salary_max,
            salary_currency,
            remote_type,
            seniority: Some(detect_seniority(&title)),
            category: text_field(raw, "department"),
            tags,
            posted_at: text_field(raw, "publishedAt"),
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
    fn test_parse_sample_board() {
        let data = json!({
            "jobs": [
                {
                    "id": "abc-123",
                    "title": "Software Engineer",
                    "location": "San Francisco, CA",
                    "employmentType": "FullTime",
                    "department": "Engineering",
                    "team": "Backend",
                    "isRemote": true,
                    "isListed": true,
                    "publishedAt": "2026-02-20T10:00:00.000Z",
                    "jobUrl": "https://jobs.ashbyhq.com/acme/abc-123",
                    "descriptionPlain": "Plain text",
                    "compensationTierSummary": "$120K – $180K"
                },
                {
                    "id": "hidden",
                    "title": "Secret Role",
                    "jobUrl": "https://jobs.ashbyhq.com/acme/hidden",
                    "isListed": false
                }
            ]
        });

        let parsed = parse(&data, "acme");
        assert_eq!(parsed.postings.len(), 1);
        assert_eq!(parsed.skipped, 0); // unlisted is filtered, not an error

        let job = &parsed.postings[0];
        assert_eq!(job.remote_type, RemoteType::Remote);
        assert_eq!(job.salary_min, Some(120_000));
        assert_eq!(job.salary_max, Some(180_000));
        assert_eq!(job.tags, vec!["FullTime", "Backend"]);
    }

    #[test]
    fn test_apply_url_fallback() {
        let data = json!({
            "jobs": [
                { "title": "Engineer", "applyUrl": "https://jobs.ashbyhq.com/acme/x/application" }
            ]
        });
        let parsed = parse(&data, "acme");
        assert_eq!(
            parsed.postings[0].url,
            "https://jobs.ashbyhq.com/acme/x/application"
        );
    }
}
