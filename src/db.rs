use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use crate::config::Config;
use crate::dedupe::url_hash;
use crate::models::{Ats, Company, NormalizedPosting, Posting, RemoteType};

/// Everything the pipeline knows about persistence lives behind this struct:
/// unique-constrained upserts, chunked transactional writes, and the filtered
/// scans the reconciler needs.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

/// Input to a company upsert, produced by discovery and seeding.
#[derive(Debug, Clone, Default)]
pub struct CompanyUpsert {
    pub ats: String,
    pub slug: String,
    pub name: Option<String>,
    pub api_url: Option<String>,
    pub careers_url: Option<String>,
    pub source: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Which company a batch of postings belongs to.
#[derive(Debug, Clone)]
pub struct CompanyRef {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub ats: String,
}

/// A slug+name row for tags that have no adapter (cross-probe input).
#[derive(Debug, Clone)]
pub struct CandidateRow {
    pub slug: String,
    pub name: Option<String>,
}

impl Database {
    pub fn open(config: &Config) -> Result<Self> {
        let path = Self::default_path(config)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn, path })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path(config: &Config) -> Result<PathBuf> {
        if let Some(dir) = &config.data_dir {
            return Ok(dir.join("boardfeed.db"));
        }
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "boardfeed") {
            Ok(proj_dirs.data_dir().join("boardfeed.db"))
        } else {
            Ok(PathBuf::from("boardfeed.db"))
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ats TEXT NOT NULL,
                slug TEXT NOT NULL,
                name TEXT,
                api_url TEXT,
                careers_url TEXT,
                verified INTEGER NOT NULL DEFAULT 0,
                job_count INTEGER NOT NULL DEFAULT 0,
                last_scraped_at TEXT,
                sources TEXT NOT NULL DEFAULT '[]',
                metadata TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (ats, slug)
            );

            CREATE TABLE IF NOT EXISTS postings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url_hash TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                ats_source TEXT NOT NULL,
                company_id INTEGER REFERENCES companies(id),
                company_name TEXT,
                location TEXT,
                description TEXT,
                salary_min INTEGER,
                salary_max INTEGER,
                salary_currency TEXT,
                remote_type TEXT NOT NULL DEFAULT 'unknown'
                    CHECK (remote_type IN ('remote', 'hybrid', 'onsite', 'unknown')),
                seniority TEXT,
                category TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                easy_apply INTEGER NOT NULL DEFAULT 0,
                posted_at TEXT,
                expires_at TEXT,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                raw_data TEXT
            );

            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                config TEXT,
                total_found INTEGER NOT NULL DEFAULT 0,
                new_found INTEGER NOT NULL DEFAULT 0,
                errors INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'running'
                    CHECK (status IN ('running', 'completed', 'failed')),
                started_at TEXT NOT NULL,
                finished_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_companies_verified ON companies(verified);
            CREATE INDEX IF NOT EXISTS idx_postings_company ON postings(company_id);
            CREATE INDEX IF NOT EXISTS idx_postings_staleness ON postings(active, last_seen);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='postings'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'boardfeed init' first."));
        }
        Ok(())
    }

    // --- Company operations ---

    /// Insert or update a company keyed on (ats, slug). Never downgrades
    /// verification and never erases fields the caller didn't supply.
    /// Returns the row id.
    pub fn upsert_company(&self, c: &CompanyUpsert) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let slug = c.slug.trim().to_lowercase();
        let ats = c.ats.trim().to_lowercase();

        let metadata = c.metadata.as_ref().map(|m| m.to_string());
        self.conn.execute(
            "INSERT INTO companies (ats, slug, name, api_url, careers_url, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (ats, slug) DO UPDATE SET
                 name = COALESCE(excluded.name, name),
                 api_url = COALESCE(excluded.api_url, api_url),
                 careers_url = COALESCE(excluded.careers_url, careers_url),
                 metadata = COALESCE(excluded.metadata, metadata),
                 updated_at = excluded.updated_at",
            params![ats, slug, c.name, c.api_url, c.careers_url, metadata, now],
        )?;

        let id: i64 = self.conn.query_row(
            "SELECT id FROM companies WHERE ats = ?1 AND slug = ?2",
            params![ats, slug],
            |row| row.get(0),
        )?;

        if let Some(source) = &c.source {
            self.append_company_source(id, source)?;
        }
        Ok(id)
    }

    fn append_company_source(&self, company_id: i64, source: &str) -> Result<()> {
        let current: String = self.conn.query_row(
            "SELECT sources FROM companies WHERE id = ?1",
            [company_id],
            |row| row.get(0),
        )?;
        let mut sources: Vec<String> = serde_json::from_str(&current).unwrap_or_default();
        if !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
            self.conn.execute(
                "UPDATE companies SET sources = ?1 WHERE id = ?2",
                params![serde_json::to_string(&sources)?, company_id],
            )?;
        }
        Ok(())
    }

    pub fn set_company_verified(&self, company_id: i64, job_count: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE companies SET verified = 1, job_count = ?1, updated_at = ?2 WHERE id = ?3",
            params![job_count, Utc::now().to_rfc3339(), company_id],
        )?;
        Ok(())
    }

    /// Advance last_scraped_at; called for every scrape attempt that reached
    /// the provider, success or not.
    pub fn mark_company_scraped(&self, company_id: i64, job_count: Option<i64>) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        match job_count {
            Some(count) => self.conn.execute(
                "UPDATE companies
                 SET last_scraped_at = ?1, job_count = ?2, verified = 1, updated_at = ?1
                 WHERE id = ?3",
                params![now, count, company_id],
            )?,
            None => self.conn.execute(
                "UPDATE companies SET last_scraped_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![now, company_id],
            )?,
        };
        Ok(())
    }

    pub fn get_verified_companies(&self, ats: Option<Ats>) -> Result<Vec<Company>> {
        let mut sql = String::from(
            "SELECT id, ats, slug, name, api_url, careers_url, verified, job_count,
                    last_scraped_at, sources, metadata, created_at, updated_at
             FROM companies
             WHERE verified = 1 AND api_url IS NOT NULL",
        );
        if ats.is_some() {
            sql.push_str(" AND ats = ?1");
        }
        sql.push_str(" ORDER BY ats, slug");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = if let Some(a) = ats {
            stmt.query_map([a.as_str()], Self::row_to_company)?
        } else {
            stmt.query_map([], Self::row_to_company)?
        };
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list verified companies")
    }

    /// Name-only candidates recorded under a tag with no adapter
    /// ("linkedin" rows awaiting cross-probe). These rows never pass through
    /// the typed Company model.
    pub fn get_candidates_by_tag(&self, tag: &str) -> Result<Vec<CandidateRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT slug, name FROM companies WHERE ats = ?1 ORDER BY slug")?;
        let rows = stmt.query_map([tag], |row| {
            Ok(CandidateRow {
                slug: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list candidates by tag")
    }

    pub fn get_unverified_companies(&self) -> Result<Vec<Company>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ats, slug, name, api_url, careers_url, verified, job_count,
                    last_scraped_at, sources, metadata, created_at, updated_at
             FROM companies
             WHERE verified = 0 AND api_url IS NOT NULL
             ORDER BY ats, slug",
        )?;
        let rows = stmt.query_map([], Self::row_to_company)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list unverified companies")
    }

    pub fn get_company(&self, ats: &str, slug: &str) -> Result<Option<Company>> {
        let result = self.conn.query_row(
            "SELECT id, ats, slug, name, api_url, careers_url, verified, job_count,
                    last_scraped_at, sources, metadata, created_at, updated_at
             FROM companies WHERE ats = ?1 AND slug = ?2",
            params![ats, slug],
            Self::row_to_company,
        );
        match result {
            Ok(company) => Ok(Some(company)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn company_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))?)
    }

    fn row_to_company(row: &rusqlite::Row) -> rusqlite::Result<Company> {
        let ats_str: String = row.get(1)?;
        let sources_json: String = row.get(9)?;
        let metadata_json: Option<String> = row.get(10)?;
        Ok(Company {
            id: row.get(0)?,
            ats: Ats::resolve(&ats_str).map_err(|_| rusqlite::Error::InvalidQuery)?,
            slug: row.get(2)?,
            name: row.get(3)?,
            api_url: row.get(4)?,
            careers_url: row.get(5)?,
            verified: row.get(6)?,
            job_count: row.get(7)?,
            last_scraped_at: parse_ts_opt(row.get::<_, Option<String>>(8)?),
            sources: serde_json::from_str(&sources_json).unwrap_or_default(),
            metadata: metadata_json.and_then(|m| serde_json::from_str(&m).ok()),
            created_at: parse_ts(&row.get::<_, String>(11)?),
            updated_at: parse_ts(&row.get::<_, String>(12)?),
        })
    }

    // --- Posting operations ---

    /// Insert-or-refresh one posting, keyed on the URL fingerprint.
    /// Returns true when this fingerprint had never been seen before.
    ///
    /// On refresh, only descriptive fields move: first_seen stays fixed,
    /// last_seen advances, active flips back on.
    pub fn upsert_posting(
        &self,
        p: &NormalizedPosting,
        company: &CompanyRef,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let hash = url_hash(&p.url);
        let now_str = now.to_rfc3339();
        let tags_json = serde_json::to_string(&p.tags)?;
        let description = p.description.as_deref().map(truncate_chars);

        let existing: Option<i64> = match self.conn.query_row(
            "SELECT id FROM postings WHERE url_hash = ?1",
            [&hash],
            |row| row.get(0),
        ) {
            Ok(id) => Some(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        match existing {
            None => {
                self.conn.execute(
                    "INSERT INTO postings (
                         url_hash, url, title, ats_source, company_id, company_name,
                         location, description, salary_min, salary_max, salary_currency,
                         remote_type, seniority, category, tags, easy_apply,
                         posted_at, expires_at, first_seen, last_seen, active, raw_data
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                               ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?19, 1, ?20)",
                    params![
                        hash,
                        p.url.trim(),
                        p.title.trim(),
                        company.ats,
                        company.id,
                        company.name,
                        p.location,
                        description,
                        p.salary_min,
                        p.salary_max,
                        p.salary_currency,
                        p.remote_type.as_str(),
                        p.seniority.map(|s| s.as_str()),
                        p.category,
                        tags_json,
                        p.easy_apply,
                        p.posted_at,
                        p.expires_at,
                        now_str,
                        p.raw_data.to_string(),
                    ],
                )?;
                Ok(true)
            }
            Some(id) => {
                self.conn.execute(
                    "UPDATE postings SET
                         last_seen = ?1, active = 1,
                         company_id = COALESCE(?2, company_id),
                         company_name = COALESCE(?3, company_name),
                         location = COALESCE(?4, location),
                         description = COALESCE(?5, description),
                         salary_min = COALESCE(?6, salary_min),
                         salary_max = COALESCE(?7, salary_max),
                         salary_currency = COALESCE(?8, salary_currency),
                         remote_type = ?9,
                         seniority = COALESCE(?10, seniority),
                         category = COALESCE(?11, category),
                         tags = ?12,
                         expires_at = ?13
                     WHERE id = ?14",
                    params![
                        now_str,
                        company.id,
                        company.name,
                        p.location,
                        description,
                        p.salary_min,
                        p.salary_max,
                        p.salary_currency,
                        p.remote_type.as_str(),
                        p.seniority.map(|s| s.as_str()),
                        p.category,
                        tags_json,
                        p.expires_at,
                        id,
                    ],
                )?;
                Ok(false)
            }
        }
    }

    /// Commit one chunk of postings in a single transaction.
    /// Returns (new, touched) counts. A failure rolls the whole chunk back,
    /// so a re-run commits it again from scratch; idempotent either way.
    pub fn commit_postings(
        &self,
        chunk: &[NormalizedPosting],
        company: &CompanyRef,
        now: DateTime<Utc>,
    ) -> Result<(usize, usize)> {
        let tx = self.conn.unchecked_transaction()?;
        let mut new_count = 0;
        let mut touched = 0;
        for posting in chunk {
            if self.upsert_posting(posting, company, now)? {
                new_count += 1;
            } else {
                touched += 1;
            }
        }
        tx.commit()?;
        Ok((new_count, touched))
    }

    pub fn posting_count(&self, active_only: bool) -> Result<i64> {
        let sql = if active_only {
            "SELECT COUNT(*) FROM postings WHERE active = 1"
        } else {
            "SELECT COUNT(*) FROM postings"
        };
        Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
    }

    pub fn get_posting_by_url(&self, url: &str) -> Result<Option<Posting>> {
        let hash = url_hash(url);
        let result = self.conn.query_row(
            "SELECT id, url_hash, url, title, ats_source, company_id, company_name,
                    location, description, salary_min, salary_max, salary_currency,
                    remote_type, seniority, category, tags, easy_apply,
                    posted_at, expires_at, first_seen, last_seen, active
             FROM postings WHERE url_hash = ?1",
            [&hash],
            Self::row_to_posting,
        );
        match result {
            Ok(posting) => Ok(Some(posting)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn row_to_posting(row: &rusqlite::Row) -> rusqlite::Result<Posting> {
        let tags_json: String = row.get(15)?;
        let remote: String = row.get(12)?;
        Ok(Posting {
            id: row.get(0)?,
            url_hash: row.get(1)?,
            url: row.get(2)?,
            title: row.get(3)?,
            ats_source: row.get(4)?,
            company_id: row.get(5)?,
            company_name: row.get(6)?,
            location: row.get(7)?,
            description: row.get(8)?,
            salary_min: row.get(9)?,
            salary_max: row.get(10)?,
            salary_currency: row.get(11)?,
            remote_type: RemoteType::from_str_lossy(&remote),
            seniority: row.get(13)?,
            category: row.get(14)?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            easy_apply: row.get(16)?,
            posted_at: row.get(17)?,
            expires_at: row.get(18)?,
            first_seen: parse_ts(&row.get::<_, String>(19)?),
            last_seen: parse_ts(&row.get::<_, String>(20)?),
            active: row.get(21)?,
        })
    }

    // --- Staleness reconciliation ---

    /// Flip active postings unseen since `cutoff` to inactive.
    /// Postings seen at or after the cutoff are never touched.
    pub fn deactivate_stale(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE postings SET active = 0 WHERE active = 1 AND last_seen < ?1",
            [cutoff.to_rfc3339()],
        )?;
        Ok(changed)
    }

    /// Permanently delete inactive postings unseen since `cutoff`.
    pub fn purge_inactive(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM postings WHERE active = 0 AND last_seen < ?1",
            [cutoff.to_rfc3339()],
        )?;
        Ok(deleted)
    }

    // --- Run records ---

    pub fn start_run(&self, source: &str, config: &serde_json::Value) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO runs (source, config, status, started_at)
             VALUES (?1, ?2, 'running', ?3)",
            params![source, config.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn finish_run(
        &self,
        run_id: i64,
        total_found: i64,
        new_found: i64,
        errors: i64,
        status: &str,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE runs SET total_found = ?1, new_found = ?2, errors = ?3,
                             status = ?4, finished_at = ?5
             WHERE id = ?6",
            params![
                total_found,
                new_found,
                errors,
                status,
                Utc::now().to_rfc3339(),
                run_id
            ],
        )?;
        Ok(())
    }

    pub fn get_run(&self, run_id: i64) -> Result<Option<crate::models::Run>> {
        let result = self.conn.query_row(
            "SELECT id, source, config, total_found, new_found, errors, status,
                    started_at, finished_at
             FROM runs WHERE id = ?1",
            [run_id],
            |row| {
                let config_json: Option<String> = row.get(2)?;
                Ok(crate::models::Run {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    config: config_json.and_then(|c| serde_json::from_str(&c).ok()),
                    total_found: row.get(3)?,
                    new_found: row.get(4)?,
                    errors: row.get(5)?,
                    status: row.get(6)?,
                    started_at: parse_ts(&row.get::<_, String>(7)?),
                    finished_at: parse_ts_opt(row.get::<_, Option<String>>(8)?),
                })
            },
        );
        match result {
            Ok(run) => Ok(Some(run)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

fn parse_ts_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_ts(&s))
}

/// Descriptions are capped; the full payload stays in raw_data.
fn truncate_chars(s: &str) -> String {
    s.chars().take(500).collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_posting(url: &str) -> NormalizedPosting {
        NormalizedPosting {
            url: url.to_string(),
            title: "Software Engineer".to_string(),
            location: Some("San Francisco, CA".to_string()),
            salary_min: Some(120_000),
            salary_max: Some(180_000),
            salary_currency: "USD".to_string(),
            remote_type: RemoteType::Remote,
            raw_data: serde_json::json!({"id": 1}),
            ..Default::default()
        }
    }

    fn acme_ref(id: Option<i64>) -> CompanyRef {
        CompanyRef {
            id,
            name: Some("Acme".to_string()),
            ats: "greenhouse".to_string(),
        }
    }

    #[test]
    fn test_upsert_company_is_unique_per_ats_slug() {
        let db = Database::open_in_memory().unwrap();
        let first = db
            .upsert_company(&CompanyUpsert {
                ats: "greenhouse".to_string(),
                slug: "acme".to_string(),
                source: Some("seed:test".to_string()),
                ..Default::default()
            })
            .unwrap();
        let second = db
            .upsert_company(&CompanyUpsert {
                ats: "greenhouse".to_string(),
                slug: "ACME".to_string(),
                name: Some("Acme Corp".to_string()),
                source: Some("github:repo".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(db.company_count().unwrap(), 1);

        let company = db.get_company("greenhouse", "acme").unwrap().unwrap();
        assert_eq!(company.name.as_deref(), Some("Acme Corp"));
        assert_eq!(company.sources, vec!["seed:test", "github:repo"]);
    }

    #[test]
    fn test_upsert_does_not_erase_existing_fields() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_company(&CompanyUpsert {
            ats: "lever".to_string(),
            slug: "acme".to_string(),
            name: Some("Acme".to_string()),
            api_url: Some("https://api.lever.co/v0/postings/acme?mode=json".to_string()),
            ..Default::default()
        })
        .unwrap();
        // Second sighting with no name or api_url must keep both.
        db.upsert_company(&CompanyUpsert {
            ats: "lever".to_string(),
            slug: "acme".to_string(),
            ..Default::default()
        })
        .unwrap();

        let company = db.get_company("lever", "acme").unwrap().unwrap();
        assert_eq!(company.name.as_deref(), Some("Acme"));
        assert!(company.api_url.is_some());
    }

    #[test]
    fn test_verification_flip_keeps_single_row() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .upsert_company(&CompanyUpsert {
                ats: "ashby".to_string(),
                slug: "acme".to_string(),
                api_url: Some(Ats::Ashby.api_url("acme")),
                ..Default::default()
            })
            .unwrap();

        let company = db.get_company("ashby", "acme").unwrap().unwrap();
        assert!(!company.verified);

        db.set_company_verified(id, 12).unwrap();
        let company = db.get_company("ashby", "acme").unwrap().unwrap();
        assert!(company.verified);
        assert_eq!(company.job_count, 12);
        assert_eq!(db.company_count().unwrap(), 1);
    }

    #[test]
    fn test_upsert_posting_new_then_touched() {
        let db = Database::open_in_memory().unwrap();
        let t0 = Utc::now();
        let t1 = t0 + Duration::hours(1);

        let is_new = db
            .upsert_posting(
                &sample_posting("https://boards.example.com/jobs/42?utm_source=x"),
                &acme_ref(None),
                t0,
            )
            .unwrap();
        assert!(is_new);

        // Same posting without the tracking param: touched, not duplicated.
        let is_new = db
            .upsert_posting(
                &sample_posting("https://boards.example.com/jobs/42"),
                &acme_ref(None),
                t1,
            )
            .unwrap();
        assert!(!is_new);

        assert_eq!(db.posting_count(false).unwrap(), 1);
        let posting = db
            .get_posting_by_url("https://boards.example.com/jobs/42")
            .unwrap()
            .unwrap();
        assert_eq!(posting.first_seen, t0);
        assert_eq!(posting.last_seen, t1);
        assert!(posting.active);
    }

    #[test]
    fn test_touch_refreshes_mutable_fields_only() {
        let db = Database::open_in_memory().unwrap();
        let t0 = Utc::now();

        let mut p = sample_posting("https://boards.example.com/jobs/7");
        db.upsert_posting(&p, &acme_ref(None), t0).unwrap();

        p.salary_min = Some(130_000);
        p.location = Some("Remote".to_string());
        p.tags = vec!["Full-time".to_string()];
        db.upsert_posting(&p, &acme_ref(None), t0 + Duration::minutes(5))
            .unwrap();

        let posting = db
            .get_posting_by_url("https://boards.example.com/jobs/7")
            .unwrap()
            .unwrap();
        assert_eq!(posting.salary_min, Some(130_000));
        assert_eq!(posting.location.as_deref(), Some("Remote"));
        assert_eq!(posting.tags, vec!["Full-time"]);
        assert_eq!(posting.first_seen, t0);
    }

    #[test]
    fn test_commit_postings_counts_and_replays() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let chunk = vec![
            sample_posting("https://boards.example.com/jobs/1"),
            sample_posting("https://boards.example.com/jobs/2"),
            sample_posting("https://boards.example.com/jobs/3"),
        ];

        let (new_count, touched) = db.commit_postings(&chunk, &acme_ref(None), now).unwrap();
        assert_eq!((new_count, touched), (3, 0));

        // Replaying the identical chunk never double-counts "new".
        let (new_count, touched) = db
            .commit_postings(&chunk, &acme_ref(None), now + Duration::minutes(1))
            .unwrap();
        assert_eq!((new_count, touched), (0, 3));
        assert_eq!(db.posting_count(false).unwrap(), 3);
    }

    #[test]
    fn test_deactivate_respects_freshness_threshold() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        db.upsert_posting(
            &sample_posting("https://a.example.com/jobs/old"),
            &acme_ref(None),
            now - Duration::hours(72),
        )
        .unwrap();
        db.upsert_posting(
            &sample_posting("https://a.example.com/jobs/fresh"),
            &acme_ref(None),
            now - Duration::hours(1),
        )
        .unwrap();

        let cutoff = now - Duration::hours(48);
        assert_eq!(db.deactivate_stale(cutoff).unwrap(), 1);

        let fresh = db
            .get_posting_by_url("https://a.example.com/jobs/fresh")
            .unwrap()
            .unwrap();
        assert!(fresh.active);
        let old = db
            .get_posting_by_url("https://a.example.com/jobs/old")
            .unwrap()
            .unwrap();
        assert!(!old.active);

        // Second pass finds nothing left to do.
        assert_eq!(db.deactivate_stale(cutoff).unwrap(), 0);
    }

    #[test]
    fn test_purge_only_old_inactive_rows() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        db.upsert_posting(
            &sample_posting("https://a.example.com/jobs/ancient"),
            &acme_ref(None),
            now - Duration::days(120),
        )
        .unwrap();
        db.upsert_posting(
            &sample_posting("https://a.example.com/jobs/recent"),
            &acme_ref(None),
            now - Duration::days(10),
        )
        .unwrap();
        db.deactivate_stale(now - Duration::hours(48)).unwrap();

        // Both are inactive now, but only the one past retention is deleted.
        assert_eq!(db.purge_inactive(now - Duration::days(90)).unwrap(), 1);
        assert_eq!(db.posting_count(false).unwrap(), 1);
        assert!(
            db.get_posting_by_url("https://a.example.com/jobs/recent")
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_listing_splits_verified_unverified_and_candidates() {
        let db = Database::open_in_memory().unwrap();
        let verified_id = db
            .upsert_company(&CompanyUpsert {
                ats: "greenhouse".to_string(),
                slug: "acme".to_string(),
                api_url: Some(Ats::Greenhouse.api_url("acme")),
                ..Default::default()
            })
            .unwrap();
        db.set_company_verified(verified_id, 3).unwrap();
        db.upsert_company(&CompanyUpsert {
            ats: "lever".to_string(),
            slug: "beta".to_string(),
            api_url: Some(Ats::Lever.api_url("beta")),
            ..Default::default()
        })
        .unwrap();
        // Name-only candidate under a tag with no adapter.
        db.upsert_company(&CompanyUpsert {
            ats: "linkedin".to_string(),
            slug: "gamma-corp".to_string(),
            name: Some("Gamma Corp".to_string()),
            ..Default::default()
        })
        .unwrap();

        let verified = db.get_verified_companies(None).unwrap();
        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].slug, "acme");

        let unverified = db.get_unverified_companies().unwrap();
        assert_eq!(unverified.len(), 1);
        assert_eq!(unverified[0].slug, "beta");

        let candidates = db.get_candidates_by_tag("linkedin").unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].slug, "gamma-corp");
        assert_eq!(candidates[0].name.as_deref(), Some("Gamma Corp"));
    }

    #[test]
    fn test_run_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let run_id = db
            .start_run("scrape", &serde_json::json!({"concurrency": 20}))
            .unwrap();

        let run = db.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.status, "running");
        assert!(run.finished_at.is_none());

        db.finish_run(run_id, 100, 7, 2, "completed").unwrap();
        let run = db.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.status, "completed");
        assert_eq!(run.total_found, 100);
        assert_eq!(run.new_found, 7);
        assert_eq!(run.errors, 2);
        assert!(run.finished_at.is_some());
    }
}
