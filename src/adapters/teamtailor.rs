//! Teamtailor boards (public embed API, JSON:API format).
//!
//! API: `GET https://{slug}.teamtailor.com/api/v1/jobs`
//! Response: `{ "data": [ { id, links: { "careersite-job-url" }, attributes:
//! { title, body (HTML), status, "remote-status", salary: { min, max,
//! currency }, "created-at", tags }, relationships: { department, locations }
//! } ], "included": [ { id, type, attributes: { name } } ] }`
//! Departments and locations resolve through the `included` side-channel.

use std::collections::HashMap;

use serde_json::Value;

use super::{
    Parsed, detect_remote_type, detect_seniority, list_under, str_field, strip_html, text_field,
};
use crate::models::{NormalizedPosting, RemoteType};

pub(super) fn parse(data: &Value, slug: &str) -> Parsed {
    let mut out = Parsed::default();
    let included = build_included_map(data.get("included"));

    for raw in list_under(data, &["data"]) {
        if !raw.is_object() {
            out.skip();
            continue;
        }

        let Some(attrs) = raw.get("attributes").filter(|a| a.is_object()) else {
            out.skip();
            continue;
        };

        // Only open jobs are listed; anything else is filtered, not an error.
        if let Some(status) = str_field(attrs, "status") {
            if status != "open" {
                continue;
            }
        }

        let Some(title) = text_field(attrs, "title") else {
            out.skip();
            continue;
        };

        let url = raw
            .get("links")
            .and_then(|l| text_field(l, "careersite-job-url"))
            .unwrap_or_else(|| {
                let job_id = text_field(raw, "id").unwrap_or_default();
                format!("https://{slug}.teamtailor.com/jobs/{job_id}")
            });

        let location = resolve_related_names(raw, "locations", &included);
        let category = resolve_related_names(raw, "department", &included);

        let (salary_min, salary_max, salary_currency) = extract_salary(attrs.get("salary"));

        let remote_type = match str_field(attrs, "remote-status").unwrap_or("") {
            "fully" => RemoteType::Remote,
            "hybrid" => RemoteType::Hybrid,
            "none" | "onsite" => RemoteType::Onsite,
            _ => detect_remote_type(&title, location.as_deref(), attrs),
        };

        let mut tags: Vec<String> = attrs
            .get("tags")
            .and_then(Value::as_array)
            .map(|t| {
                t.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(employment) = text_field(attrs, "employment-type") {
            tags.push(employment);
        }

        out.push(NormalizedPosting {
            url,
            location,
            description: str_field(attrs, "body").and_then(strip_html),
            salary_min,
            salary_max,
            salary_currency,
            remote_type,
            seniority: Some(detect_seniority(&title)),
            category,
            tags,
            posted_at: text_field(attrs, "created-at"),
            raw_data: raw.clone(),
            title,
            ..Default::default()
        });
    }

    out
}

/// `{ "type:id" -> attributes }` from the JSON:API `included` array.
fn build_included_map(included: Option<&Value>) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    if let Some(items) = included.and_then(Value::as_array) {
        for item in items {
            let (Some(kind), Some(id)) = (str_field(item, "type"), item_id(item)) else {
                continue;
            };
            if let Some(attrs) = item.get("attributes") {
                map.insert(format!("{kind}:{id}"), attrs.clone());
            }
        }
    }
    map
}

fn item_id(item: &Value) -> Option<String> {
    match item.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Resolve a relationship (single or list) to the names of its included
/// resources, comma-joined.
fn resolve_related_names(
    raw: &Value,
    relation: &str,
    included: &HashMap<String, Value>,
) -> Option<String> {
    let data = raw.get("relationships")?.get(relation)?.get("data")?;
    let refs: Vec<&Value> = match data {
        Value::Array(items) => items.iter().collect(),
        obj @ Value::Object(_) => vec![obj],
        _ => return None,
    };

    let names: Vec<String> = refs
        .iter()
        .filter_map(|r| {
            let key = format!("{}:{}", str_field(r, "type")?, item_id(r)?);
            included.get(&key).and_then(|attrs| text_field(attrs, "name"))
        })
        .collect();

    if names.is_empty() { None } else { Some(names.join(", ")) }
}

fn extract_salary(salary: Option<&Value>) -> (Option<i64>, Option<i64>, String) {
    let Some(salary) = salary.filter(|s| s.is_object()) else {
        return (None, None, "USD".to_string());
    };
    let currency = str_field(salary, "currency")
        .filter(|c| !c.is_empty())
        .unwrap_or("USD")
        .to_string();
    // Teamtailor serializes amounts as strings.
    (
        super::int_field(salary, "min"),
        super::int_field(salary, "max"),
        currency,
    )
}
