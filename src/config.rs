use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::models::Ats;

/// All tunables for one invocation, read from the environment once at startup
/// and passed around immutably.
#[derive(Debug, Clone)]
pub struct Config {
    /// Global ceiling on in-flight HTTP requests.
    pub concurrency: usize,
    /// Per-provider-host ceiling, to stay under individual rate limits.
    pub per_host_limit: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retry attempts for transient failures before giving up on a company.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_jitter_ms: u64,
    /// Consecutive transport failures before the HTTP client is replaced.
    pub client_reset_threshold: u32,
    /// Cap on pages fetched per company for paginated providers.
    pub max_pages: usize,
    /// Postings committed per transaction.
    pub batch_size: usize,
    /// Companies between checkpoint saves.
    pub checkpoint_every: usize,
    /// Postings unseen for this long are deactivated.
    pub stale_hours: i64,
    /// Inactive postings unseen for this long are deleted.
    pub retention_days: i64,
    /// Override for where the database and checkpoint live.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            concurrency: 20,
            per_host_limit: 3,
            timeout_secs: 10,
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_jitter_ms: 250,
            client_reset_threshold: 5,
            max_pages: 10,
            batch_size: 50,
            checkpoint_every: 10,
            stale_hours: 48,
            retention_days: 90,
            data_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Config> {
        let mut cfg = Config::default();
        if let Some(v) = read_env("BOARDFEED_CONCURRENCY")? {
            cfg.concurrency = v;
        }
        if let Some(v) = read_env("BOARDFEED_PER_HOST_LIMIT")? {
            cfg.per_host_limit = v;
        }
        if let Some(v) = read_env("BOARDFEED_TIMEOUT_SECS")? {
            cfg.timeout_secs = v;
        }
        if let Some(v) = read_env("BOARDFEED_MAX_RETRIES")? {
            cfg.max_retries = v;
        }
        if let Some(v) = read_env("BOARDFEED_BATCH_SIZE")? {
            cfg.batch_size = v;
        }
        if let Some(v) = read_env("BOARDFEED_STALE_HOURS")? {
            cfg.stale_hours = v;
        }
        if let Some(v) = read_env("BOARDFEED_RETENTION_DAYS")? {
            cfg.retention_days = v;
        }
        if let Ok(dir) = env::var("BOARDFEED_DATA_DIR") {
            if !dir.is_empty() {
                cfg.data_dir = Some(PathBuf::from(dir));
            }
        }
        Ok(cfg)
    }

    /// Snapshot stored on each Run row.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "concurrency": self.concurrency,
            "per_host_limit": self.per_host_limit,
            "timeout_secs": self.timeout_secs,
            "max_retries": self.max_retries,
            "batch_size": self.batch_size,
            "stale_hours": self.stale_hours,
            "retention_days": self.retention_days,
        })
    }
}

fn read_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(val) if !val.is_empty() => {
            let parsed = val
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {}", key, val))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

/// GitHub repos whose READMEs carry ATS links worth mining during discovery.
pub const GITHUB_HIRING_REPOS: [&str; 5] = [
    "poteto/hiring-without-whiteboards",
    "pittcsc/Summer2025-Internships",
    "SimplifyJobs/New-Grad-Positions",
    "remoteintech/remote-jobs",
    "tramcar/awesome-job-boards",
];

/// Domain substring → ATS, most specific entries first.
/// "linkedin" and "wellfound" are recognized but have no adapter: companies
/// found only there are recorded by name for later cross-probing.
pub const ATS_DOMAIN_MAP: [(&str, &str); 28] = [
    ("boards.greenhouse.io", "greenhouse"),
    ("boards-api.greenhouse.io", "greenhouse"),
    ("greenhouse.io", "greenhouse"),
    ("jobs.lever.co", "lever"),
    ("api.lever.co", "lever"),
    ("lever.co", "lever"),
    ("jobs.ashbyhq.com", "ashby"),
    ("api.ashbyhq.com", "ashby"),
    ("ashbyhq.com", "ashby"),
    ("apply.workable.com", "workable"),
    ("workable.com", "workable"),
    ("jobs.smartrecruiters.com", "smartrecruiters"),
    ("api.smartrecruiters.com", "smartrecruiters"),
    ("smartrecruiters.com", "smartrecruiters"),
    ("recruitee.com", "recruitee"),
    ("app.dover.com", "dover"),
    ("dover.com", "dover"),
    ("breezy.hr", "breezy"),
    ("bamboohr.com", "bamboohr"),
    ("teamtailor.com", "teamtailor"),
    ("pinpointhq.com", "pinpoint"),
    ("ats.rippling.com", "rippling"),
    ("rippling-ats.com", "rippling"),
    ("rippling.com", "rippling"),
    ("jobs.personio.de", "personio"),
    ("personio.de", "personio"),
    ("freshteam.com", "freshteam"),
    ("linkedin.com", "linkedin"),
];

/// Find the ATS tag for a hostname, longest (most specific) match first.
pub fn ats_for_host(hostname: &str) -> Option<&'static str> {
    let mut entries: Vec<(&str, &str)> = ATS_DOMAIN_MAP.to_vec();
    entries.sort_by_key(|(domain, _)| std::cmp::Reverse(domain.len()));
    entries
        .iter()
        .find(|(domain, _)| hostname.contains(domain))
        .map(|(_, ats)| *ats)
}

/// How to pull a company slug out of a careers URL for each provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugStrategy {
    /// slug is the nth path segment (0-indexed)
    PathSegment(usize),
    /// slug is the leftmost subdomain before the provider's base domain
    Subdomain,
    /// slug is the path segment immediately after a marker segment
    PathAfter(&'static str),
}

pub struct SlugPattern {
    pub ats: Ats,
    pub domain_contains: &'static str,
    pub strategy: SlugStrategy,
}

pub const SLUG_PATTERNS: [SlugPattern; 14] = [
    // boards.greenhouse.io/stripe/jobs/123 → "stripe"
    SlugPattern {
        ats: Ats::Greenhouse,
        domain_contains: "greenhouse.io",
        strategy: SlugStrategy::PathSegment(0),
    },
    // jobs.lever.co/stripe/abc123 → "stripe"
    SlugPattern {
        ats: Ats::Lever,
        domain_contains: "lever.co",
        strategy: SlugStrategy::PathSegment(0),
    },
    // jobs.ashbyhq.com/stripe → "stripe"
    SlugPattern {
        ats: Ats::Ashby,
        domain_contains: "ashbyhq.com",
        strategy: SlugStrategy::PathSegment(0),
    },
    // apply.workable.com/stripe/ → "stripe"
    SlugPattern {
        ats: Ats::Workable,
        domain_contains: "workable.com",
        strategy: SlugStrategy::PathSegment(0),
    },
    // jobs.smartrecruiters.com/Stripe/1234 → "Stripe"
    SlugPattern {
        ats: Ats::SmartRecruiters,
        domain_contains: "smartrecruiters.com",
        strategy: SlugStrategy::PathSegment(0),
    },
    // stripe.recruitee.com/o/job-title → "stripe"
    SlugPattern {
        ats: Ats::Recruitee,
        domain_contains: "recruitee.com",
        strategy: SlugStrategy::Subdomain,
    },
    // app.dover.com/apply/stripe/abc → slug after "apply"
    SlugPattern {
        ats: Ats::Dover,
        domain_contains: "dover.com",
        strategy: SlugStrategy::PathAfter("apply"),
    },
    // stripe.breezy.hr/p/job-title → "stripe"
    SlugPattern {
        ats: Ats::Breezy,
        domain_contains: "breezy.hr",
        strategy: SlugStrategy::Subdomain,
    },
    // stripe.bamboohr.com/careers/123 → "stripe"
    SlugPattern {
        ats: Ats::BambooHr,
        domain_contains: "bamboohr.com",
        strategy: SlugStrategy::Subdomain,
    },
    // company.teamtailor.com/jobs/123 → "company"
    SlugPattern {
        ats: Ats::Teamtailor,
        domain_contains: "teamtailor.com",
        strategy: SlugStrategy::Subdomain,
    },
    // company.pinpointhq.com/postings/123 → "company"
    SlugPattern {
        ats: Ats::Pinpoint,
        domain_contains: "pinpointhq.com",
        strategy: SlugStrategy::Subdomain,
    },
    // ats.rippling.com/company/jobs/123 → "company"
    SlugPattern {
        ats: Ats::Rippling,
        domain_contains: "rippling.com",
        strategy: SlugStrategy::PathSegment(0),
    },
    // company.jobs.personio.de/job/123 → "company"
    SlugPattern {
        ats: Ats::Personio,
        domain_contains: "personio.de",
        strategy: SlugStrategy::Subdomain,
    },
    // company.freshteam.com/jobs/123 → "company"
    SlugPattern {
        ats: Ats::Freshteam,
        domain_contains: "freshteam.com",
        strategy: SlugStrategy::Subdomain,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.concurrency, 20);
        assert_eq!(cfg.per_host_limit, 3);
        assert_eq!(cfg.stale_hours, 48);
        assert_eq!(cfg.retention_days, 90);
    }

    #[test]
    fn test_ats_for_host_prefers_specific_domain() {
        // "boards-api.greenhouse.io" must not fall through to a shorter match
        assert_eq!(ats_for_host("boards-api.greenhouse.io"), Some("greenhouse"));
        assert_eq!(ats_for_host("jobs.lever.co"), Some("lever"));
        assert_eq!(ats_for_host("stripe.recruitee.com"), Some("recruitee"));
        assert_eq!(ats_for_host("www.linkedin.com"), Some("linkedin"));
        assert_eq!(ats_for_host("example.com"), None);
    }

    #[test]
    fn test_snapshot_carries_tunables() {
        let cfg = Config::default();
        let snap = cfg.snapshot();
        assert_eq!(snap["concurrency"], 20);
        assert_eq!(snap["batch_size"], 50);
    }
}
