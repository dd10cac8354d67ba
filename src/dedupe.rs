use sha2::{Digest, Sha256};
use url::Url;

/// Canonicalize a posting URL for deduplication:
/// - lowercase scheme and host
/// - strip the `www.` prefix
/// - drop query parameters and fragments (tracking params carry no identity)
/// - strip the trailing slash
///
/// The whole rule set lives here on purpose: every fingerprint in the
/// database derives from this one function, so changing the rules means
/// re-fingerprinting, not hunting call sites.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        // Not a parseable absolute URL; fall back to a trimmed lowercase copy
        // so hashing still behaves deterministically.
        return trimmed.trim_end_matches('/').to_lowercase();
    };

    let scheme = parsed.scheme().to_lowercase();
    let mut host = parsed.host_str().unwrap_or("").to_lowercase();
    if let Some(stripped) = host.strip_prefix("www.") {
        host = stripped.to_string();
    }
    let path = parsed.path().trim_end_matches('/');

    format!("{}://{}{}", scheme, host, path)
}

/// Stable fingerprint of a posting: SHA-256 over the canonical URL.
pub fn url_hash(raw: &str) -> String {
    let normalized = normalize_url(raw);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_tracking_params() {
        assert_eq!(
            normalize_url("https://boards.example.com/jobs/42?utm_source=x"),
            "https://boards.example.com/jobs/42"
        );
        assert_eq!(
            normalize_url("https://boards.example.com/jobs/42"),
            "https://boards.example.com/jobs/42"
        );
    }

    #[test]
    fn test_normalize_host_case_and_scheme() {
        assert_eq!(
            normalize_url("HTTPS://Boards.Example.COM/Jobs/42"),
            "https://boards.example.com/Jobs/42"
        );
    }

    #[test]
    fn test_normalize_strips_www_and_trailing_slash() {
        assert_eq!(
            normalize_url("https://www.example.com/careers/"),
            "https://example.com/careers"
        );
    }

    #[test]
    fn test_normalize_strips_fragment() {
        assert_eq!(
            normalize_url("https://example.com/job?id=1#section"),
            "https://example.com/job"
        );
    }

    #[test]
    fn test_hash_is_deterministic() {
        let url = "https://jobs.lever.co/acme/abc-123";
        assert_eq!(url_hash(url), url_hash(url));
    }

    #[test]
    fn test_hash_collapses_url_variants() {
        let with_tracking = "https://boards.example.com/jobs/42?utm_source=x";
        let without = "https://boards.example.com/jobs/42";
        assert_eq!(url_hash(with_tracking), url_hash(without));

        let www = "https://www.boards.example.com/jobs/42/";
        assert_eq!(url_hash(www), url_hash(without));
    }

    #[test]
    fn test_hash_distinguishes_different_postings() {
        assert_ne!(
            url_hash("https://boards.example.com/jobs/42"),
            url_hash("https://boards.example.com/jobs/43")
        );
    }

    #[test]
    fn test_hash_format() {
        let hash = url_hash("https://example.com/job/1");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_unparseable_input_still_hashes() {
        // Garbage in, deterministic garbage out; never a panic.
        assert_eq!(url_hash("not a url"), url_hash("not a url"));
        assert_eq!(normalize_url("  Not A URL/  "), "not a url");
    }
}
