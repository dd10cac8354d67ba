//! Seed the company registry from previously-collected JSON result files
//! (search-dork exports, LinkedIn exports): pull `(ats, slug)` candidates out
//! of job URLs, dedupe them, and upsert them unverified for discovery to
//! probe later.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::adapters::parse_salary_text;
use crate::config::{Config, SLUG_PATTERNS, SlugStrategy, ats_for_host};
use crate::db::{CompanyRef, CompanyUpsert, Database};
use crate::models::{Ats, NormalizedPosting, RemoteType};

#[derive(Debug, Clone, Default)]
pub struct SeedOptions {
    pub data_dir: PathBuf,
    /// Substring filter on file names; all .json files when empty.
    pub file_filter: Option<String>,
    pub seed_jobs: bool,
    pub dry_run: bool,
}

#[derive(Debug, Default)]
pub struct SeedSummary {
    pub candidates: usize,
    pub ats_companies: usize,
    pub name_only_companies: usize,
    pub postings_seeded: i64,
    pub errors: i64,
}

/// A company slug extracted from a job URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCompany {
    pub slug: String,
    pub ats: Ats,
    pub name: Option<String>,
    pub careers_url: Option<String>,
    pub source_file: String,
}

// --- Slug extraction ---

/// Extract a company slug from a job URL, per provider pattern:
/// `boards.greenhouse.io/stripe/jobs/123` → greenhouse:stripe,
/// `stripe.recruitee.com/o/title` → recruitee:stripe,
/// `app.dover.com/apply/stripe/abc` → dover:stripe.
pub fn extract_slug_from_url(raw_url: &str) -> Option<ExtractedCompany> {
    let parsed = url::Url::parse(raw_url.trim()).ok()?;
    let hostname = parsed.host_str()?.to_lowercase();
    let path_parts: Vec<&str> = parsed
        .path()
        .trim_matches('/')
        .split('/')
        .filter(|p| !p.is_empty())
        .collect();

    for pattern in &SLUG_PATTERNS {
        if !hostname.contains(pattern.domain_contains) {
            continue;
        }

        let slug = match pattern.strategy {
            SlugStrategy::PathSegment(idx) => path_parts.get(idx).map(|s| s.to_string()),
            SlugStrategy::Subdomain => {
                let labels: Vec<&str> = hostname.split('.').collect();
                let base = pattern
                    .domain_contains
                    .split('.')
                    .next()
                    .unwrap_or(pattern.domain_contains);
                labels
                    .iter()
                    .position(|label| *label == base)
                    .filter(|i| *i > 0)
                    .map(|_| labels[0].to_string())
            }
            SlugStrategy::PathAfter(marker) => path_parts
                .iter()
                .position(|p| p.eq_ignore_ascii_case(marker))
                .and_then(|i| path_parts.get(i + 1))
                .map(|s| s.to_string()),
        };

        if let Some(slug) = slug {
            let slug = clean_slug(&slug);
            if is_valid_slug(&slug) {
                return Some(ExtractedCompany {
                    slug,
                    ats: pattern.ats,
                    name: None,
                    careers_url: Some(raw_url.trim().to_string()),
                    source_file: String::new(),
                });
            }
        }
    }

    None
}

/// Lowercase, strip query/fragment remnants and trailing path noise.
pub fn clean_slug(slug: &str) -> String {
    let mut slug = slug.to_lowercase().trim().to_string();
    if let Some(idx) = slug.find(['?', '#']) {
        slug.truncate(idx);
    }
    slug = slug.trim_end_matches('/').to_string();
    static TRAILING_RE: OnceLock<Regex> = OnceLock::new();
    let re = TRAILING_RE
        .get_or_init(|| Regex::new(r"/(jobs|careers|openings|positions)$").expect("slug regex"));
    re.replace(&slug, "").to_string()
}

pub fn is_valid_slug(slug: &str) -> bool {
    if slug.len() < 2 || slug.len() > 100 {
        return false;
    }
    static SLUG_RE: OnceLock<Regex> = OnceLock::new();
    let re = SLUG_RE
        .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-_\.]*[a-z0-9]$").expect("slug regex"));
    if !re.is_match(slug) && slug.len() > 2 {
        return false;
    }
    // Path fragments that look like slugs but never are.
    const BLACKLIST: [&str; 24] = [
        "jobs", "careers", "openings", "apply", "posting", "postings", "boards", "board", "api",
        "v0", "v1", "v2", "v3", "search", "results", "category", "department", "location", "www",
        "app", "help", "support", "about", "blog",
    ];
    !BLACKLIST.contains(&slug)
}

/// Slugify a company display name for later cross-probing.
pub fn slug_from_name(name: &str) -> String {
    static NON_ALNUM_RE: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM_RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("name regex"));
    re.replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Dedupe by (ats, slug), preferring entries that carry a display name.
pub fn dedupe_candidates(candidates: Vec<ExtractedCompany>) -> Vec<ExtractedCompany> {
    let mut seen: HashMap<(Ats, String), ExtractedCompany> = HashMap::new();
    for candidate in candidates {
        let key = (candidate.ats, candidate.slug.clone());
        match seen.get(&key) {
            Some(existing) if existing.name.is_some() || candidate.name.is_none() => {}
            _ => {
                seen.insert(key, candidate);
            }
        }
    }
    let mut out: Vec<ExtractedCompany> = seen.into_values().collect();
    out.sort_by(|a, b| (a.ats.as_str(), &a.slug).cmp(&(b.ats.as_str(), &b.slug)));
    out
}

// --- Result-file mining ---

fn read_json_file(path: &Path) -> Option<Value> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| warn!(path = %path.display(), error = %e, "failed to read file"))
        .ok()?;
    serde_json::from_str(&contents)
        .map_err(|e| warn!(path = %path.display(), error = %e, "failed to parse file"))
        .ok()
}

fn results_array(data: &Value) -> Vec<Value> {
    data.get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Mine ATS candidates from a search-export file:
/// `{ meta: {...}, results: [{ title, url, company, platform, ... }] }`.
fn extract_from_search_results(path: &Path) -> Vec<ExtractedCompany> {
    let Some(data) = read_json_file(path) else {
        return vec![];
    };
    let file_name = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut companies = Vec::new();
    for result in results_array(&data) {
        let Some(url) = result.get("url").and_then(Value::as_str) else {
            continue;
        };
        if let Some(mut extracted) = extract_slug_from_url(url) {
            extracted.name = result
                .get("company")
                .and_then(Value::as_str)
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());
            extracted.source_file = file_name.clone();
            companies.push(extracted);
        }
    }
    info!(file = %file_name, companies = companies.len(), "extracted ATS candidates");
    companies
}

/// Postings recoverable directly from result files, keyed by detected ATS.
fn extract_postings_from_file(path: &Path, linkedin: bool) -> Vec<(String, NormalizedPosting)> {
    let Some(data) = read_json_file(path) else {
        return vec![];
    };

    let mut postings = Vec::new();
    for result in results_array(&data) {
        let Some(url) = result.get("url").and_then(Value::as_str) else {
            continue;
        };
        let Some(title) = result
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            continue;
        };

        let ats_tag = if linkedin {
            "linkedin".to_string()
        } else {
            let Some(tag) = url::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_lowercase))
                .and_then(|host| ats_for_host(&host))
            else {
                continue;
            };
            tag.to_string()
        };

        let location = result
            .get("location")
            .and_then(Value::as_str)
            .map(str::to_string);
        let (salary_min, salary_max, salary_currency) =
            parse_salary_text(result.get("salary").and_then(Value::as_str).unwrap_or(""));

        let remote_hint = result.get("remote_search").and_then(Value::as_bool) == Some(true)
            || title.to_lowercase().contains("remote")
            || location
                .as_deref()
                .is_some_and(|l| l.to_lowercase().contains("remote"));

        postings.push((
            ats_tag,
            NormalizedPosting {
                url: url.to_string(),
                title: title.to_string(),
                location,
                salary_min,
                salary_max,
                salary_currency,
                remote_type: if remote_hint {
                    RemoteType::Remote
                } else {
                    RemoteType::Unknown
                },
                category: result
                    .get("category")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                easy_apply: result.get("easy_apply").and_then(Value::as_bool) == Some(true),
                raw_data: result.clone(),
                ..Default::default()
            },
        ));
    }
    postings
}

// --- Entry point ---

pub fn run(config: &Config, db: &Database, opts: &SeedOptions) -> Result<SeedSummary> {
    db.ensure_initialized()?;

    let (search_files, linkedin_files) = scan_data_dir(&opts.data_dir, opts.file_filter.as_deref())
        .with_context(|| format!("Failed to scan {}", opts.data_dir.display()))?;
    info!(
        search_files = search_files.len(),
        linkedin_files = linkedin_files.len(),
        "scanning seed files"
    );
    if search_files.is_empty() && linkedin_files.is_empty() {
        warn!(dir = %opts.data_dir.display(), "no JSON files found, nothing to seed");
        return Ok(SeedSummary::default());
    }

    let mut summary = SeedSummary::default();

    // Phase 1: ATS candidates from job URLs.
    let mut candidates: Vec<ExtractedCompany> = Vec::new();
    for path in &search_files {
        candidates.extend(extract_from_search_results(path));
    }
    summary.candidates = candidates.len();
    let unique = dedupe_candidates(candidates);
    info!(unique = unique.len(), raw = summary.candidates, "deduped candidates");

    // Name-only companies mined from LinkedIn exports, for cross-probing.
    let mut name_only: Vec<(String, Option<String>, String)> = Vec::new();
    for path in &linkedin_files {
        let Some(data) = read_json_file(path) else {
            continue;
        };
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        for result in results_array(&data) {
            if let Some(name) = result
                .get("company")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|n| !n.is_empty())
            {
                let slug = slug_from_name(name);
                if is_valid_slug(&slug) {
                    name_only.push((slug, Some(name.to_string()), file_name.clone()));
                }
            }
        }
    }
    name_only.sort();
    name_only.dedup_by(|a, b| a.0 == b.0);
    summary.name_only_companies = name_only.len();

    if opts.dry_run {
        info!("dry run, not writing to database");
        for candidate in unique.iter().take(20) {
            info!(
                ats = %candidate.ats,
                slug = %candidate.slug,
                name = candidate.name.as_deref().unwrap_or(""),
                "candidate"
            );
        }
        summary.ats_companies = unique.len();
        return Ok(summary);
    }

    let run_id = db.start_run(
        "seed",
        &serde_json::json!({
            "data_dir": opts.data_dir.display().to_string(),
            "seed_jobs": opts.seed_jobs,
        }),
    )?;

    for candidate in &unique {
        let upsert = CompanyUpsert {
            ats: candidate.ats.as_str().to_string(),
            slug: candidate.slug.clone(),
            name: candidate.name.clone(),
            api_url: Some(candidate.ats.api_url(&candidate.slug)),
            careers_url: candidate.careers_url.clone(),
            source: Some(format!("seed:{}", candidate.source_file)),
            metadata: None,
        };
        match db.upsert_company(&upsert) {
            Ok(_) => summary.ats_companies += 1,
            Err(e) => {
                warn!(slug = %candidate.slug, error = %e, "failed to upsert company");
                summary.errors += 1;
            }
        }
    }

    for (slug, name, file_name) in &name_only {
        let upsert = CompanyUpsert {
            ats: "linkedin".to_string(),
            slug: slug.clone(),
            name: name.clone(),
            source: Some(format!("seed:{file_name}")),
            ..Default::default()
        };
        if let Err(e) = db.upsert_company(&upsert) {
            warn!(slug = %slug, error = %e, "failed to upsert name-only company");
            summary.errors += 1;
        }
    }

    // Phase 2 (optional): the postings themselves.
    if opts.seed_jobs {
        let now = Utc::now();
        let mut all: Vec<(String, NormalizedPosting)> = Vec::new();
        for path in &search_files {
            all.extend(extract_postings_from_file(path, false));
        }
        for path in &linkedin_files {
            all.extend(extract_postings_from_file(path, true));
        }
        info!(postings = all.len(), "seeding postings");

        for (ats_tag, posting) in &all {
            let company_ref = CompanyRef {
                id: None,
                name: None,
                ats: ats_tag.clone(),
            };
            match db.upsert_posting(posting, &company_ref, now) {
                Ok(true) => summary.postings_seeded += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(url = %posting.url, error = %e, "failed to seed posting");
                    summary.errors += 1;
                }
            }
        }
    }

    db.finish_run(
        run_id,
        (summary.ats_companies + summary.name_only_companies) as i64,
        summary.ats_companies as i64 + summary.postings_seeded,
        summary.errors,
        "completed",
    )?;

    Ok(summary)
}

/// Categorize .json files by name: "linkedin" exports vs everything else.
fn scan_data_dir(dir: &Path, filter: Option<&str>) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut search_files = Vec::new();
    let mut linkedin_files = Vec::new();

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    entries.sort();

    for path in entries {
        let name = path
            .file_name()
            .map(|f| f.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if let Some(filter) = filter {
            if !name.contains(&filter.to_lowercase()) {
                continue;
            }
        }
        if name.contains("linkedin") {
            linkedin_files.push(path);
        } else {
            search_files.push(path);
        }
    }

    Ok((search_files, linkedin_files))
}
