//! Company discovery: mine candidate (provider, slug) pairs from seed lists,
//! probe candidate boards for liveness, and cross-probe name-only companies
//! against the high-volume providers. Probes that fail leave the candidate
//! registered unverified so a later pass can retry it.

use std::sync::Arc;
use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::adapters;
use crate::config::{Config, GITHUB_HIRING_REPOS, ats_for_host};
use crate::db::{CompanyUpsert, Database};
use crate::fetch::{FetchError, Fetcher};
use crate::models::Ats;
use crate::seed::{ExtractedCompany, extract_slug_from_url};

#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub github: bool,
    pub probe: bool,
    pub cross_probe: bool,
    pub dry_run: bool,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        DiscoverOptions {
            github: true,
            probe: true,
            cross_probe: true,
            dry_run: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct DiscoverSummary {
    pub discovered: i64,
    pub probed: usize,
    pub verified: usize,
    pub cross_found: i64,
    pub errors: i64,
}

/// The providers worth blind cross-probing by slug; the long tail yields
/// almost nothing for the requests it costs.
const CROSS_PROBE_ATS: [Ats; 5] = [
    Ats::Greenhouse,
    Ats::Lever,
    Ats::Ashby,
    Ats::Workable,
    Ats::SmartRecruiters,
];

pub async fn run(config: &Config, db: &Database, opts: &DiscoverOptions) -> Result<DiscoverSummary> {
    db.ensure_initialized()?;
    let fetcher = Arc::new(Fetcher::new(config)?);
    let mut summary = DiscoverSummary::default();

    let run_id = if opts.dry_run {
        None
    } else {
        Some(db.start_run(
            "discover",
            &serde_json::json!({
                "github": opts.github,
                "probe": opts.probe,
                "cross_probe": opts.cross_probe,
            }),
        )?)
    };

    if opts.github {
        info!("discovering from GitHub hiring repos");
        let candidates = discover_from_github(&fetcher).await;
        info!(candidates = candidates.len(), "GitHub discovery done");

        if opts.dry_run {
            for candidate in candidates.iter().take(20) {
                info!(ats = %candidate.ats, slug = %candidate.slug, "candidate");
            }
        } else {
            for candidate in &candidates {
                let upsert = CompanyUpsert {
                    ats: candidate.ats.as_str().to_string(),
                    slug: candidate.slug.clone(),
                    name: candidate.name.clone(),
                    api_url: Some(candidate.ats.api_url(&candidate.slug)),
                    careers_url: candidate.careers_url.clone(),
                    source: Some(candidate.source_file.clone()),
                    metadata: None,
                };
                match db.upsert_company(&upsert) {
                    Ok(_) => summary.discovered += 1,
                    Err(e) => {
                        warn!(slug = %candidate.slug, error = %e, "failed to upsert candidate");
                        summary.errors += 1;
                    }
                }
            }
        }
    }

    if opts.probe && !opts.dry_run {
        info!("probing unverified companies");
        let (verified, probed) = probe_unverified(&fetcher, db, &mut summary).await?;
        summary.verified = verified;
        summary.probed = probed;
        info!(probed, verified, "probe pass done");
    }

    if opts.cross_probe && !opts.dry_run {
        info!("cross-probing name-only companies");
        summary.cross_found = cross_probe(&fetcher, db, &mut summary).await?;
        info!(found = summary.cross_found, "cross-probe done");
    }

    if let Some(id) = run_id {
        db.finish_run(
            id,
            summary.discovered + summary.cross_found,
            summary.discovered + summary.cross_found,
            summary.errors,
            "completed",
        )?;
    }

    Ok(summary)
}

// --- Seed lists (GitHub hiring repos) ---

async fn discover_from_github(fetcher: &Fetcher) -> Vec<ExtractedCompany> {
    let mut companies = Vec::new();

    for repo in GITHUB_HIRING_REPOS {
        let main_url = format!("https://raw.githubusercontent.com/{repo}/main/README.md");
        let text = match fetcher.get_text(&main_url).await {
            Ok(text) => Some(text),
            // Some repos still use a master default branch.
            Err(err) if err.is_board_gone() => {
                let master_url =
                    format!("https://raw.githubusercontent.com/{repo}/master/README.md");
                match fetcher.get_text(&master_url).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!(repo, error = %e, "README not reachable on main or master");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(repo, error = %e, "failed to fetch README");
                None
            }
        };

        if let Some(text) = text {
            let extracted = extract_ats_links_from_markdown(&text, &format!("github:{repo}"));
            info!(repo, companies = extracted.len(), "extracted from README");
            companies.extend(extracted);
        }
    }

    companies
}

/// Pull ATS board links out of markdown: `[Name](url)` links and bare URLs.
fn extract_ats_links_from_markdown(text: &str, source: &str) -> Vec<ExtractedCompany> {
    static LINK_RE: OnceLock<Regex> = OnceLock::new();
    let re = LINK_RE.get_or_init(|| {
        Regex::new(r"\[([^\]]*)\]\((https?://[^\s\)]+)\)|(https?://[^\s\)\]]+)")
            .expect("markdown link regex")
    });

    let mut companies = Vec::new();
    for capture in re.captures_iter(text) {
        let link_text = capture.get(1).map(|m| m.as_str()).unwrap_or("");
        let Some(url) = capture.get(2).or_else(|| capture.get(3)).map(|m| m.as_str()) else {
            continue;
        };

        // Only URLs on a known ATS domain with an adapter are candidates.
        let Some(host) = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
        else {
            continue;
        };
        match ats_for_host(&host) {
            Some(tag) if Ats::resolve(tag).is_ok() => {}
            _ => continue,
        }

        if let Some(mut extracted) = extract_slug_from_url(url) {
            extracted.source_file = source.to_string();
            extracted.name = clean_link_text(link_text);
            companies.push(extracted);
        }
    }
    companies
}

fn clean_link_text(text: &str) -> Option<String> {
    static MARKUP_RE: OnceLock<Regex> = OnceLock::new();
    let re = MARKUP_RE.get_or_init(|| Regex::new(r"[|*\[\]]").expect("markup regex"));
    let name = re.replace_all(text, "").trim().to_string();
    if name.is_empty() || name.len() >= 100 {
        None
    } else {
        Some(name)
    }
}

// --- Probing ---

enum ProbeOutcome {
    /// Board answered with a parseable response.
    Live { job_count: usize },
    /// Board is definitively absent (404).
    Absent,
    /// Anything else: stay unverified, retry on a later pass.
    Inconclusive,
}

/// One lightweight liveness probe against a provider board.
async fn probe_board(fetcher: &Fetcher, ats: Ats, slug: &str, api_url: &str) -> ProbeOutcome {
    match fetcher.get_json(api_url).await {
        Ok(data) => {
            let parsed = adapters::parse_postings(ats, &data, slug);
            ProbeOutcome::Live {
                job_count: parsed.postings.len(),
            }
        }
        Err(err) if err.is_board_gone() => ProbeOutcome::Absent,
        Err(FetchError::Decode { .. }) => {
            // A 200 with a non-JSON body still proves something answers here.
            ProbeOutcome::Live { job_count: 0 }
        }
        Err(_) => ProbeOutcome::Inconclusive,
    }
}

/// Probe every unverified company that has an API URL; verify the live ones.
/// Failed probes change nothing; the candidate stays registered.
async fn probe_unverified(
    fetcher: &Arc<Fetcher>,
    db: &Database,
    summary: &mut DiscoverSummary,
) -> Result<(usize, usize)> {
    let unverified = db.get_unverified_companies()?;
    if unverified.is_empty() {
        info!("no unverified companies to probe");
        return Ok((0, 0));
    }
    let probed = unverified.len();

    let mut tasks: JoinSet<(i64, ProbeOutcome)> = JoinSet::new();
    for company in unverified {
        let fetcher = Arc::clone(fetcher);
        tasks.spawn(async move {
            let api_url = company
                .api_url
                .clone()
                .unwrap_or_else(|| company.ats.api_url(&company.slug));
            let outcome = probe_board(&fetcher, company.ats, &company.slug, &api_url).await;
            (company.id, outcome)
        });
    }

    let mut verified = 0;
    while let Some(joined) = tasks.join_next().await {
        let Ok((company_id, outcome)) = joined else {
            summary.errors += 1;
            continue;
        };
        if let ProbeOutcome::Live { job_count } = outcome {
            db.set_company_verified(company_id, job_count as i64)?;
            verified += 1;
        }
    }

    Ok((verified, probed))
}

/// Companies known only by name (mined from LinkedIn exports) get probed
/// against each high-volume provider; a live board with postings becomes a
/// new verified company under that provider.
async fn cross_probe(
    fetcher: &Arc<Fetcher>,
    db: &Database,
    summary: &mut DiscoverSummary,
) -> Result<i64> {
    let name_only = db.get_candidates_by_tag("linkedin")?;
    if name_only.is_empty() {
        info!("no name-only companies to cross-probe");
        return Ok(0);
    }
    info!(companies = name_only.len(), "cross-probing against {} providers", CROSS_PROBE_ATS.len());

    let mut tasks: JoinSet<(Ats, String, Option<String>, ProbeOutcome)> = JoinSet::new();
    for company in name_only {
        for ats in CROSS_PROBE_ATS {
            let fetcher = Arc::clone(fetcher);
            let slug = company.slug.clone();
            let name = company.name.clone();
            tasks.spawn(async move {
                let api_url = ats.api_url(&slug);
                let outcome = probe_board(&fetcher, ats, &slug, &api_url).await;
                (ats, slug, name, outcome)
            });
        }
    }

    let mut discovered = 0;
    while let Some(joined) = tasks.join_next().await {
        let Ok((ats, slug, name, outcome)) = joined else {
            summary.errors += 1;
            continue;
        };
        // Empty boards are skipped: a 200 with zero postings is usually a
        // provider-level placeholder page, not this company's board.
        if let ProbeOutcome::Live { job_count } = outcome {
            if job_count > 0 {
                let id = db.upsert_company(&CompanyUpsert {
                    ats: ats.as_str().to_string(),
                    slug: slug.clone(),
                    name,
                    api_url: Some(ats.api_url(&slug)),
                    careers_url: None,
                    source: Some("cross_probe:linkedin".to_string()),
                    metadata: None,
                })?;
                db.set_company_verified(id, job_count as i64)?;
                discovered += 1;
            }
        }
    }

    Ok(discovered)
}
