//! Personio job pages.
//!
//! API: `GET https://{slug}.jobs.personio.de/search.json`
//! Response: array of `{ id, name, slug, office, department,
//! recruitingCategory, employmentType, seniority, schedule, description
//! (HTML), createdAt, tags }`

use serde_json::Value;

use super::{Parsed, detect_remote_type, detect_seniority, int_field, list_under, str_field, strip_html, text_field};
use crate::models::{NormalizedPosting, Seniority};

pub(super) fn parse(data: &Value, slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in list_under(data, &["positions", "jobs", "data"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        let Some(title) = text_field(raw, "name").or_else(|| text_field(raw, "title")) else {
            out.skip();
            continue;
        };

        let job_ref = text_field(raw, "slug")
            .or_else(|| int_field(raw, "id").map(|i| i.to_string()));
        let Some(job_ref) = job_ref else {
            out.skip();
            continue;
        };
        let url = format!("https://{slug}.jobs.personio.de/job/{job_ref}");

        let location = text_field(raw, "office").or_else(|| text_field(raw, "location"));

        let seniority = str_field(raw, "seniority")
            .and_then(map_seniority)
            .unwrap_or_else(|| detect_seniority(&title));

        let mut tags: Vec<String> = raw
            .get("tags")
            .and_then(Value::as_array)
            .map(|t| {
                t.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(schedule) = text_field(raw, "schedule") {
            tags.push(schedule);
        }
        if let Some(employment) = text_field(raw, "employmentType") {
            tags.push(employment);
        }

        out.push(NormalizedPosting {
            url,
            location: location.clone(),
            description: str_field(raw, "description").and_then(strip_html),
            remote_type: detect_remote_type(&title, location.as_deref(), raw),
            seniority: Some(seniority),
            category: text_field(raw, "department")
                .or_else(|| text_field(raw, "recruitingCategory")),
            tags,
            posted_at: text_field(raw, "createdAt"),
            salary_currency: "USD".to_string(),
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}

fn map_seniority(s: &str) -> Option<Seniority> {
    match s.to_lowercase().as_str() {
        "student" => Some(Seniority::Intern),
        "entry-level" | "junior" => Some(Seniority::Junior),
        "experienced" => Some(Seniority::Mid),
        "senior" | "lead" => Some(Seniority::Senior),
        "executive" => Some(Seniority::Director),
        "manager" => Some(Seniority::Manager),
        _ => None,
    }
}
