//! Staleness reconciliation, on its own schedule: deactivate postings the
//! provider no longer lists, then purge long-inactive ones so storage stays
//! bounded. Both passes are idempotent and safe to run repeatedly.

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::info;

use crate::config::Config;
use crate::db::Database;

#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub deactivated: usize,
    pub purged: usize,
    pub active_remaining: i64,
}

pub fn run(config: &Config, db: &Database, dry_run: bool) -> Result<ReconcileSummary> {
    db.ensure_initialized()?;
    let now = Utc::now();
    let stale_cutoff = now - Duration::hours(config.stale_hours);
    let purge_cutoff = now - Duration::days(config.retention_days);

    if dry_run {
        info!(
            stale_cutoff = %stale_cutoff.to_rfc3339(),
            purge_cutoff = %purge_cutoff.to_rfc3339(),
            "dry run, not modifying postings"
        );
        return Ok(ReconcileSummary::default());
    }

    let run_id = db.start_run(
        "reconcile",
        &serde_json::json!({
            "stale_hours": config.stale_hours,
            "retention_days": config.retention_days,
        }),
    )?;

    let deactivated = db.deactivate_stale(stale_cutoff)?;
    info!(
        deactivated,
        stale_hours = config.stale_hours,
        "deactivated postings unseen past the freshness threshold"
    );

    let purged = db.purge_inactive(purge_cutoff)?;
    info!(
        purged,
        retention_days = config.retention_days,
        "purged inactive postings past the retention window"
    );

    let active_remaining = db.posting_count(true)?;
    db.finish_run(
        run_id,
        (deactivated + purged) as i64,
        0,
        0,
        "completed",
    )?;

    Ok(ReconcileSummary {
        deactivated,
        purged,
        active_remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CompanyRef;
    use crate::models::NormalizedPosting;

    fn posting(url: &str) -> NormalizedPosting {
        NormalizedPosting {
            url: url.to_string(),
            title: "Engineer".to_string(),
            salary_currency: "USD".to_string(),
            raw_data: serde_json::json!({}),
            ..Default::default()
        }
    }

    fn company_ref() -> CompanyRef {
        CompanyRef {
            id: None,
            name: Some("Acme".to_string()),
            ats: "greenhouse".to_string(),
        }
    }

    #[test]
    fn test_reconcile_deactivates_then_purges() {
        let db = Database::open_in_memory().unwrap();
        let config = Config::default(); // 48h staleness, 90d retention
        let now = Utc::now();

        // Fresh, stale, and long-gone postings.
        db.upsert_posting(&posting("https://a.example.com/1"), &company_ref(), now)
            .unwrap();
        db.upsert_posting(
            &posting("https://a.example.com/2"),
            &company_ref(),
            now - Duration::hours(72),
        )
        .unwrap();
        db.upsert_posting(
            &posting("https://a.example.com/3"),
            &company_ref(),
            now - Duration::days(120),
        )
        .unwrap();

        let summary = run(&config, &db, false).unwrap();
        // Both old postings go inactive; only the 120-day one is also past
        // retention and gets deleted.
        assert_eq!(summary.deactivated, 2);
        assert_eq!(summary.purged, 1);
        assert_eq!(summary.active_remaining, 1);
        assert_eq!(db.posting_count(false).unwrap(), 2);

        let summary = run(&config, &db, false).unwrap();
        assert_eq!(summary.deactivated, 0);
        assert_eq!(summary.purged, 0);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let now = Utc::now();
        db.upsert_posting(
            &posting("https://a.example.com/old"),
            &company_ref(),
            now - Duration::hours(100),
        )
        .unwrap();

        let first = run(&config, &db, false).unwrap();
        assert_eq!(first.deactivated, 1);
        let second = run(&config, &db, false).unwrap();
        assert_eq!(second.deactivated, 0);
        assert_eq!(second.purged, 0);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        db.upsert_posting(
            &posting("https://a.example.com/old"),
            &company_ref(),
            Utc::now() - Duration::hours(100),
        )
        .unwrap();

        let summary = run(&config, &db, true).unwrap();
        assert_eq!(summary.deactivated, 0);
        assert_eq!(db.posting_count(true).unwrap(), 1);
    }
}
