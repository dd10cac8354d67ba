//! The scrape run: read verified companies, fetch and normalize their boards
//! with bounded parallelism, and commit deduplicated postings in checkpointed
//! chunks so a killed run resumes where it left off.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::adapters;
use crate::config::Config;
use crate::db::{CompanyRef, Database};
use crate::fetch::{FetchError, Fetcher};
use crate::models::{Ats, Company, NormalizedPosting};

#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub ats: Option<Ats>,
    pub company: Option<String>,
    pub limit: Option<usize>,
    pub dry_run: bool,
    /// Ignore any existing checkpoint and start over.
    pub fresh: bool,
}

#[derive(Debug, Default)]
pub struct ScrapeSummary {
    pub companies_total: usize,
    pub companies_with_postings: usize,
    pub total_found: i64,
    pub new_found: i64,
    pub errors: i64,
    pub elapsed_secs: f64,
}

/// Progress marker for the current run, persisted after every few committed
/// companies. The external scheduler may kill the process at any time; the
/// next invocation picks up from here instead of re-fetching everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: Option<i64>,
    pub completed_ids: Vec<i64>,
    pub total_found: i64,
    pub new_found: i64,
    pub errors: i64,
    pub updated_at: Option<String>,
}

impl Checkpoint {
    pub fn load(path: &PathBuf) -> Option<Checkpoint> {
        let contents = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    pub fn save(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to save checkpoint to {}", path.display()))
    }

    pub fn clear(path: &PathBuf) {
        let _ = std::fs::remove_file(path);
    }
}

pub fn checkpoint_path(config: &Config) -> PathBuf {
    if let Some(dir) = &config.data_dir {
        return dir.join("scrape_checkpoint.json");
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "boardfeed") {
        proj_dirs.data_dir().join("scrape_checkpoint.json")
    } else {
        PathBuf::from("scrape_checkpoint.json")
    }
}

/// Drop companies already committed by an interrupted run.
fn filter_remaining(companies: Vec<Company>, completed: &HashSet<i64>) -> Vec<Company> {
    companies
        .into_iter()
        .filter(|c| !completed.contains(&c.id))
        .collect()
}

/// Everything one company task produces. `postings` may be partial when a
/// later page failed; the error is still recorded.
struct CompanyFetch {
    company: Company,
    postings: Vec<NormalizedPosting>,
    skipped: usize,
    error: Option<FetchError>,
}

pub async fn run(config: &Config, db: &Database, opts: &ScrapeOptions) -> Result<ScrapeSummary> {
    db.ensure_initialized()?;
    let started = Instant::now();

    let ckpt_path = checkpoint_path(config);
    if opts.fresh {
        Checkpoint::clear(&ckpt_path);
    }
    let mut checkpoint = if opts.fresh || opts.dry_run {
        Checkpoint::default()
    } else {
        Checkpoint::load(&ckpt_path).unwrap_or_default()
    };
    let mut completed: HashSet<i64> = checkpoint.completed_ids.iter().copied().collect();
    if !completed.is_empty() {
        info!(
            companies = completed.len(),
            "resuming from checkpoint (use --fresh to start over)"
        );
    }

    let mut companies = db.get_verified_companies(opts.ats)?;
    if let Some(slug) = &opts.company {
        let slug = slug.to_lowercase();
        companies.retain(|c| c.slug == slug);
    }
    if let Some(limit) = opts.limit {
        companies.truncate(limit);
    }
    let companies_total = companies.len();
    if companies_total == 0 {
        warn!("no companies to scrape");
        return Ok(ScrapeSummary::default());
    }

    let remaining = filter_remaining(companies, &completed);
    log_ats_breakdown(&remaining, companies_total - remaining.len());

    let run_id = if opts.dry_run {
        None
    } else if let Some(id) = checkpoint.run_id {
        Some(id)
    } else {
        let mut snapshot = config.snapshot();
        snapshot["ats_filter"] = serde_json::json!(opts.ats.map(|a| a.as_str()));
        snapshot["company_filter"] = serde_json::json!(opts.company);
        snapshot["company_count"] = serde_json::json!(companies_total);
        Some(db.start_run("scrape", &snapshot)?)
    };
    checkpoint.run_id = run_id;

    // Fan out fetch+parse work; the loop below is the only writer, so the
    // checkpoint and counters never race.
    let fetcher = Arc::new(Fetcher::new(config)?);
    let pool = Arc::new(Semaphore::new(config.concurrency));
    let mut tasks: JoinSet<CompanyFetch> = JoinSet::new();
    let max_pages = config.max_pages;
    for company in remaining {
        let fetcher = Arc::clone(&fetcher);
        let pool = Arc::clone(&pool);
        tasks.spawn(async move {
            let _permit = pool.acquire_owned().await;
            fetch_company(&fetcher, company, max_pages).await
        });
    }

    let mut summary = ScrapeSummary {
        companies_total,
        total_found: checkpoint.total_found,
        new_found: checkpoint.new_found,
        errors: checkpoint.errors,
        ..Default::default()
    };

    while let Some(joined) = tasks.join_next().await {
        let fetched = match joined {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, "company task aborted");
                summary.errors += 1;
                continue;
            }
        };
        let company = &fetched.company;

        summary.errors += fetched.skipped as i64;
        if let Some(err) = &fetched.error {
            summary.errors += 1;
            if err.is_board_gone() {
                info!(ats = %company.ats, slug = %company.slug, "board gone, leaving for re-verification");
            } else {
                warn!(ats = %company.ats, slug = %company.slug, error = %err, "scrape failed");
            }
        }

        summary.total_found += fetched.postings.len() as i64;
        if !fetched.postings.is_empty() {
            summary.companies_with_postings += 1;
        }

        if opts.dry_run {
            if let Some(sample) = fetched.postings.first() {
                info!(
                    ats = %company.ats,
                    slug = %company.slug,
                    postings = fetched.postings.len(),
                    sample = %sample.title,
                    "[dry run]"
                );
            }
            summary.new_found += fetched.postings.len() as i64;
            continue;
        }

        // Datastore failures are run-fatal: save the checkpoint, mark the
        // run failed, propagate. Everything already committed stays.
        if let Err(e) = commit_company(config, db, &fetched, &mut summary) {
            checkpoint.completed_ids = completed.iter().copied().collect();
            checkpoint.total_found = summary.total_found;
            checkpoint.new_found = summary.new_found;
            checkpoint.errors = summary.errors;
            checkpoint.updated_at = Some(Utc::now().to_rfc3339());
            checkpoint.save(&ckpt_path)?;
            if let Some(id) = run_id {
                let _ = db.finish_run(
                    id,
                    summary.total_found,
                    summary.new_found,
                    summary.errors,
                    "failed",
                );
            }
            return Err(e.context(format!(
                "failed writing postings for {}/{}; checkpoint saved, re-run to resume",
                company.ats, company.slug
            )));
        }

        completed.insert(company.id);
        if completed.len() % config.checkpoint_every.max(1) == 0 {
            checkpoint.completed_ids = completed.iter().copied().collect();
            checkpoint.total_found = summary.total_found;
            checkpoint.new_found = summary.new_found;
            checkpoint.errors = summary.errors;
            checkpoint.updated_at = Some(Utc::now().to_rfc3339());
            checkpoint.save(&ckpt_path)?;
            info!(
                done = completed.len(),
                total = companies_total,
                new = summary.new_found,
                "checkpoint saved"
            );
        }
    }

    summary.elapsed_secs = started.elapsed().as_secs_f64();

    if let Some(id) = run_id {
        db.finish_run(
            id,
            summary.total_found,
            summary.new_found,
            summary.errors,
            "completed",
        )?;
    }
    if !opts.dry_run {
        Checkpoint::clear(&ckpt_path);
    }

    Ok(summary)
}

/// Fetch and normalize every page of one company's board. Pagination is
/// sequential; a mid-pagination failure keeps the pages already parsed.
async fn fetch_company(fetcher: &Fetcher, company: Company, max_pages: usize) -> CompanyFetch {
    let mut out = CompanyFetch {
        postings: Vec::new(),
        skipped: 0,
        error: None,
        company,
    };

    let mut url = match &out.company.api_url {
        Some(url) => url.clone(),
        None => out.company.ats.api_url(&out.company.slug),
    };

    for _page in 0..max_pages {
        let data = match fetcher.get_json(&url).await {
            Ok(data) => data,
            Err(err) => {
                out.error = Some(err);
                break;
            }
        };

        let parsed = adapters::parse_postings(out.company.ats, &data, &out.company.slug);
        out.postings.extend(parsed.postings);
        out.skipped += parsed.skipped;

        match adapters::next_page_url(out.company.ats, &data, &url) {
            Some(next) if next != url => url = next,
            _ => break,
        }
    }

    out
}

/// Commit one company's postings in fixed-size transactional chunks, then
/// advance its scrape bookkeeping.
fn commit_company(
    config: &Config,
    db: &Database,
    fetched: &CompanyFetch,
    summary: &mut ScrapeSummary,
) -> Result<()> {
    let company = &fetched.company;
    let company_ref = CompanyRef {
        id: Some(company.id),
        name: company.name.clone(),
        ats: company.ats.as_str().to_string(),
    };

    let now = Utc::now();
    for chunk in fetched.postings.chunks(config.batch_size.max(1)) {
        let (new_count, _touched) = db.commit_postings(chunk, &company_ref, now)?;
        summary.new_found += new_count as i64;
    }

    // Advance last-scraped on every attempt that actually reached the
    // provider; a timeout or connect failure never did.
    let reached = match &fetched.error {
        None => true,
        Some(e) => e.reached_provider(),
    };
    if reached {
        let count = if fetched.error.is_none() {
            Some(fetched.postings.len() as i64)
        } else {
            None
        };
        db.mark_company_scraped(company.id, count)?;
    }
    Ok(())
}

fn log_ats_breakdown(remaining: &[Company], skipped: usize) {
    let mut counts: std::collections::HashMap<Ats, usize> = std::collections::HashMap::new();
    for company in remaining {
        *counts.entry(company.ats).or_default() += 1;
    }
    info!(
        companies = remaining.len(),
        skipped_from_checkpoint = skipped,
        platforms = counts.len(),
        "starting scrape"
    );
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by_key(|(_, n)| std::cmp::Reverse(*n));
    for (ats, count) in counts {
        info!("  {}: {} companies", ats, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemoteType;

    fn company(id: i64, slug: &str) -> Company {
        Company {
            id,
            ats: Ats::Greenhouse,
            slug: slug.to_string(),
            name: Some(slug.to_string()),
            api_url: Some(Ats::Greenhouse.api_url(slug)),
            careers_url: None,
            verified: true,
            job_count: 0,
            last_scraped_at: None,
            sources: vec![],
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let dir = std::env::temp_dir().join("boardfeed-ckpt-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scrape_checkpoint.json");

        let checkpoint = Checkpoint {
            run_id: Some(7),
            completed_ids: vec![1, 2, 3],
            total_found: 42,
            new_found: 5,
            errors: 1,
            updated_at: Some(Utc::now().to_rfc3339()),
        };
        checkpoint.save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(loaded.run_id, Some(7));
        assert_eq!(loaded.completed_ids, vec![1, 2, 3]);
        assert_eq!(loaded.total_found, 42);

        Checkpoint::clear(&path);
        assert!(Checkpoint::load(&path).is_none());
        // Clearing twice is fine.
        Checkpoint::clear(&path);
    }

    #[test]
    fn test_filter_remaining_skips_completed() {
        let companies = vec![company(1, "a"), company(2, "b"), company(3, "c")];
        let completed: HashSet<i64> = [1, 3].into_iter().collect();
        let remaining = filter_remaining(companies, &completed);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].slug, "b");
    }

    #[test]
    fn test_commit_company_chunks_and_counts() {
        let db = Database::open_in_memory().unwrap();
        // Seed the company so postings can satisfy the company_id foreign key
        // (production opens the DB with `PRAGMA foreign_keys = ON`). A fresh
        // in-memory DB assigns this first company row id = 1, matching
        // `company(1, "acme")` below.
        let company_id = db
            .upsert_company(&crate::db::CompanyUpsert {
                ats: "greenhouse".to_string(),
                slug: "acme".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(company_id, 1);
        let mut config = Config::default();
        config.batch_size = 2;

        let postings: Vec<NormalizedPosting> = (0..5)
            .map(|i| NormalizedPosting {
                url: format!("https://boards.greenhouse.io/acme/jobs/{i}"),
                title: format!("Engineer {i}"),
                salary_currency: "USD".to_string(),
                remote_type: RemoteType::Unknown,
                raw_data: serde_json::json!({}),
                ..Default::default()
            })
            .collect();

        let fetched = CompanyFetch {
            company: company(1, "acme"),
            postings,
            skipped: 0,
            error: None,
        };

        let mut summary = ScrapeSummary::default();
        commit_company(&config, &db, &fetched, &mut summary).unwrap();
        assert_eq!(summary.new_found, 5);
        assert_eq!(db.posting_count(false).unwrap(), 5);

        // Re-committing the same company (a resumed run that lost its
        // checkpoint mid-chunk) finds nothing new.
        let mut summary = ScrapeSummary::default();
        commit_company(&config, &db, &fetched, &mut summary).unwrap();
        assert_eq!(summary.new_found, 0);
        assert_eq!(db.posting_count(false).unwrap(), 5);
    }
}
