//! Workable accounts.
//!
//! API: `GET https://apply.workable.com/api/v3/accounts/{slug}/jobs`
//! Response: `{ "results": [ { title, shortcode, url, shortlink, location:
//! { country, city, region, telecommuting }, department, workplace,
//! published, created } ], "paging": { "next": "..." } }`; cursor-paginated
//! via `paging.next` (handled in the adapter dispatch layer).

use serde_json::Value;

use super::{
    Parsed, detect_remote_type, detect_seniority, join_location_parts, list_under, str_field,
    text_field,
};
use crate::models::{NormalizedPosting, RemoteType};

pub(super) fn parse(data: &Value, slug: &str) -> Parsed {
    let mut out = Parsed::default();

    for raw in list_under(data, &["results", "jobs"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        let Some(title) = text_field(raw, "title") else {
            out.skip();
            continue;
        };
        let mut url = text_field(raw, "url")
            .or_else(|| text_field(raw, "shortlink"))
            .unwrap_or_default();
        if !url.starts_with("http") {
            let shortcode = text_field(raw, "shortcode").unwrap_or_default();
            if shortcode.is_empty() {
                out.skip();
                continue;
            }
            url = format!("https://apply.workable.com/{slug}/j/{shortcode}/");
        }

        let loc = raw.get("location").cloned().unwrap_or(Value::Null);
        let location = join_location_parts(
            text_field(&loc, "city"),
            text_field(&loc, "region"),
            text_field(&loc, "country"),
        );

        let telecommuting = loc.get("telecommuting").and_then(Value::as_bool) == Some(true);
        let remote_type = match str_field(raw, "workplace").unwrap_or("") {
            "remote" => RemoteType::Remote,
            "hybrid" => RemoteType::Hybrid,
            "onsite" | "on-site" => RemoteType::Onsite,
            _ if telecommuting => RemoteType::Remote,
            _ => detect_remote_type(&title, location.as_deref(), raw),
        };

        // Dates come as bare days; pin them to midnight UTC.
        let posted_at = text_field(raw, "published")
            .or_else(|| text_field(raw, "created"))
            .map(|d| {
                if d.contains('T') {
                    d
                } else {
                    format!("{d}T00:00:00Z")
                }
            });

        out.push(NormalizedPosting {
            url,
            location,
            remote_type,
            seniority: Some(detect_seniority(&title)),
            category: text_field(raw, "department"),
            posted_at,
            salary_currency: "USD".to_string(),
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}
