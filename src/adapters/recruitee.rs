//! Recruitee offers.
//!
//! API: `GET https://{slug}.recruitee.com/api/offers`
//! Response: `{ "offers": [ { title, status, url, careers_url, location,
//! city, country, remote, department, description (HTML), tags,
//! salary_min, salary_max, salary_currency, experience_code,
//! employment_type_code, published_at, created_at } ] }`

use serde_json::Value;

use super::{
    Parsed, detect_remote_type, detect_seniority, int_field, join_location_parts, list_under,
    str_field, strip_html, text_field,
};
use crate::models::{NormalizedPosting, RemoteType, Seniority};

pub(super) fn parse(data: &Value, slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in list_under(data, &["offers"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        // Drafts and archived offers are filtered, not errors.
        if let Some(status) = str_field(raw, "status") {
            if status != "published" {
                continue;
            }
        }

        let Some(title) = text_field(raw, "title") else {
            out.skip();
            continue;
        };
        let mut url = text_field(raw, "careers_url")
            .or_else(|| text_field(raw, "url"))
            .unwrap_or_default();
        if !url.starts_with("http") {
            let offer_slug = text_field(raw, "slug").unwrap_or_default();
            if offer_slug.is_empty() {
                out.skip();
                continue;
            }
            url = format!("https://{slug}.recruitee.com/o/{offer_slug}");
        }

        let location = text_field(raw, "location").or_else(|| {
            join_location_parts(text_field(raw, "city"), None, text_field(raw, "country"))
        });

        let salary_min = int_field(raw, "salary_min").filter(|v| *v > 0);
        let salary_max = int_field(raw, "salary_max").filter(|v| *v > 0);
        let salary_currency = text_field(raw, "salary_currency").unwrap_or_else(|| "USD".to_string());

        let remote_type = if raw.get("remote").and_then(Value::as_bool) == Some(true) {
            RemoteType::Remote
        } else {
            detect_remote_type(&title, location.as_deref(), raw)
        };

        let seniority = str_field(raw, "experience_code")
            .and_then(map_experience_code)
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
        if let Some(employment) = text_field(raw, "employment_type_code") {
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
            seniority: Some(seniority),
            category: text_field(raw, "department"),
            tags,
            posted_at: text_field(raw, "published_at").or_else(|| text_field(raw, "created_at")),
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}

fn map_experience_code(code: &str) -> Option<Seniority> {
    match code.to_lowercase().as_str() {
        "intern" | "internship" => Some(Seniority::Intern),
        "junior" | "entry" => Some(Seniority::Junior),
        "mid" => Some(Seniority::Mid),
        "mid_senior" | "senior" | "lead" => Some(Seniority::Senior),
        "executive" | "director" => Some(Seniority::Director),
        "manager" => Some(Seniority::Manager),
        _ => None,
    }
}
