use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The ATS platforms we know how to poll. One adapter per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ats {
    Greenhouse,
    Lever,
    Ashby,
    Workable,
    SmartRecruiters,
    Recruitee,
    Dover,
    Breezy,
    BambooHr,
    Teamtailor,
    Pinpoint,
    Rippling,
    Personio,
    Freshteam,
}

pub const ALL_ATS: [Ats; 14] = [
    Ats::Greenhouse,
    Ats::Lever,
    Ats::Ashby,
    Ats::Workable,
    Ats::SmartRecruiters,
    Ats::Recruitee,
    Ats::Dover,
    Ats::Breezy,
    Ats::BambooHr,
    Ats::Teamtailor,
    Ats::Pinpoint,
    Ats::Rippling,
    Ats::Personio,
    Ats::Freshteam,
];

impl Ats {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ats::Greenhouse => "greenhouse",
            Ats::Lever => "lever",
            Ats::Ashby => "ashby",
            Ats::Workable => "workable",
            Ats::SmartRecruiters => "smartrecruiters",
            Ats::Recruitee => "recruitee",
            Ats::Dover => "dover",
            Ats::Breezy => "breezy",
            Ats::BambooHr => "bamboohr",
            Ats::Teamtailor => "teamtailor",
            Ats::Pinpoint => "pinpoint",
            Ats::Rippling => "rippling",
            Ats::Personio => "personio",
            Ats::Freshteam => "freshteam",
        }
    }

    pub fn resolve(name: &str) -> Result<Ats> {
        match name.to_lowercase().as_str() {
            "greenhouse" => Ok(Ats::Greenhouse),
            "lever" => Ok(Ats::Lever),
            "ashby" => Ok(Ats::Ashby),
            "workable" => Ok(Ats::Workable),
            "smartrecruiters" => Ok(Ats::SmartRecruiters),
            "recruitee" => Ok(Ats::Recruitee),
            "dover" => Ok(Ats::Dover),
            "breezy" => Ok(Ats::Breezy),
            "bamboohr" => Ok(Ats::BambooHr),
            "teamtailor" => Ok(Ats::Teamtailor),
            "pinpoint" => Ok(Ats::Pinpoint),
            "rippling" => Ok(Ats::Rippling),
            "personio" => Ok(Ats::Personio),
            "freshteam" => Ok(Ats::Freshteam),
            other => Err(anyhow!(
                "Unknown ATS '{}'. Available: greenhouse, lever, ashby, workable, \
                 smartrecruiters, recruitee, dover, breezy, bamboohr, teamtailor, \
                 pinpoint, rippling, personio, freshteam",
                other
            )),
        }
    }

    /// API URL for a company's board, `{slug}` filled in.
    pub fn api_url(&self, slug: &str) -> String {
        match self {
            Ats::Greenhouse => {
                format!("https://boards-api.greenhouse.io/v1/boards/{slug}/jobs")
            }
            Ats::Lever => format!("https://api.lever.co/v0/postings/{slug}?mode=json"),
            Ats::Ashby => format!("https://api.ashbyhq.com/posting-api/job-board/{slug}"),
            Ats::Workable => {
                format!("https://apply.workable.com/api/v3/accounts/{slug}/jobs")
            }
            Ats::SmartRecruiters => {
                format!("https://api.smartrecruiters.com/v1/companies/{slug}/postings")
            }
            Ats::Recruitee => format!("https://{slug}.recruitee.com/api/offers"),
            Ats::Dover => format!("https://app.dover.com/api/careers-page/{slug}/jobs"),
            Ats::Breezy => format!("https://{slug}.breezy.hr/json"),
            Ats::BambooHr => format!("https://{slug}.bamboohr.com/careers/list"),
            Ats::Teamtailor => format!("https://{slug}.teamtailor.com/api/v1/jobs"),
            Ats::Pinpoint => format!("https://{slug}.pinpointhq.com/postings.json"),
            Ats::Rippling => format!("https://ats.rippling.com/api/{slug}/jobs"),
            Ats::Personio => format!("https://{slug}.jobs.personio.de/search.json"),
            Ats::Freshteam => format!("https://{slug}.freshteam.com/api/job_postings"),
        }
    }
}

impl std::fmt::Display for Ats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteType {
    Remote,
    Hybrid,
    Onsite,
    #[default]
    Unknown,
}

impl RemoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteType::Remote => "remote",
            RemoteType::Hybrid => "hybrid",
            RemoteType::Onsite => "onsite",
            RemoteType::Unknown => "unknown",
        }
    }

    pub fn from_str_lossy(s: &str) -> RemoteType {
        match s {
            "remote" => RemoteType::Remote,
            "hybrid" => RemoteType::Hybrid,
            "onsite" => RemoteType::Onsite,
            _ => RemoteType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    Intern,
    Junior,
    Mid,
    Senior,
    Manager,
    Director,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Intern => "intern",
            Seniority::Junior => "junior",
            Seniority::Mid => "mid",
            Seniority::Senior => "senior",
            Seniority::Manager => "manager",
            Seniority::Director => "director",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub ats: Ats,
    pub slug: String,
    pub name: Option<String>,
    pub api_url: Option<String>,
    pub careers_url: Option<String>,
    pub verified: bool,
    pub job_count: i64,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub sources: Vec<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A posting as an adapter emits it; no identity or lifecycle fields yet.
/// Fingerprint, first/last-seen and the active flag are assigned at write time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedPosting {
    pub url: String,
    pub title: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub salary_currency: String,
    pub remote_type: RemoteType,
    pub seniority: Option<Seniority>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub easy_apply: bool,
    pub posted_at: Option<String>,
    pub expires_at: Option<String>,
    pub raw_data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    pub id: i64,
    pub url_hash: String,
    pub url: String,
    pub title: String,
    pub ats_source: String,
    pub company_id: Option<i64>,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub salary_currency: Option<String>,
    pub remote_type: RemoteType,
    pub seniority: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub easy_apply: bool,
    pub posted_at: Option<String>,
    pub expires_at: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub source: String,
    pub config: Option<serde_json::Value>,
    pub total_found: i64,
    pub new_found: i64,
    pub errors: i64,
    pub status: String, // "running", "completed", "failed"
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_ats_names() {
        assert_eq!(Ats::resolve("greenhouse").unwrap(), Ats::Greenhouse);
        assert_eq!(Ats::resolve("Lever").unwrap(), Ats::Lever);
        assert_eq!(Ats::resolve("SMARTRECRUITERS").unwrap(), Ats::SmartRecruiters);
        assert!(Ats::resolve("taleo").is_err());
    }

    #[test]
    fn test_ats_round_trip() {
        for ats in ALL_ATS {
            assert_eq!(Ats::resolve(ats.as_str()).unwrap(), ats);
        }
    }

    #[test]
    fn test_api_url_templates() {
        assert_eq!(
            Ats::Greenhouse.api_url("stripe"),
            "https://boards-api.greenhouse.io/v1/boards/stripe/jobs"
        );
        assert_eq!(
            Ats::Recruitee.api_url("acme"),
            "https://acme.recruitee.com/api/offers"
        );
        assert_eq!(
            Ats::Lever.api_url("openai"),
            "https://api.lever.co/v0/postings/openai?mode=json"
        );
    }

    #[test]
    fn test_remote_type_round_trip() {
        for rt in [
            RemoteType::Remote,
            RemoteType::Hybrid,
            RemoteType::Onsite,
            RemoteType::Unknown,
        ] {
            assert_eq!(RemoteType::from_str_lossy(rt.as_str()), rt);
        }
        assert_eq!(RemoteType::from_str_lossy("office"), RemoteType::Unknown);
    }
}
