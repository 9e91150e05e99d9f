//! Normalization of raw search hits into [`JobRecord`]s.
//!
//! The company name is derived from the listing URL. ATS boards put the
//! company slug right after the board domain (`boards.greenhouse.io/acme/...`),
//! so those are matched first; anything else falls back to the first label
//! of the host name.

use crate::models::{JobRecord, RawHit};

/// Company value when the link is missing or cannot be split.
pub const MANUAL_CHECK: &str = "Manual Check";

/// Company value when an ATS pattern matches but carries no slug.
pub const UNKNOWN_COMPANY: &str = "Unknown";

/// ATS domains whose first path segment is the company slug.
const ATS_PATTERNS: [&str; 3] = ["greenhouse.io/", "lever.co/", "ashbyhq.com/"];

const SCHEME_PREFIXES: [&str; 2] = ["https://", "http://"];

/// Derive a company name from a listing link. Never fails.
///
/// ```rust
/// use job_harvester::normalize::extract_company;
///
/// assert_eq!(extract_company(Some("https://boards.greenhouse.io/acme/jobs/123")), "Acme");
/// assert_eq!(extract_company(Some("https://example.com/careers/42")), "Example");
/// assert_eq!(extract_company(None), "Manual Check");
/// ```
pub fn extract_company(link: Option<&str>) -> String {
    let link = match link.map(str::trim) {
        Some(l) if !l.is_empty() => l,
        _ => return MANUAL_CHECK.to_string(),
    };

    let stripped = strip_scheme_and_www(link);
    let lowered = stripped.to_ascii_lowercase();

    for pattern in ATS_PATTERNS {
        if let Some(pos) = lowered.find(pattern) {
            let rest = &stripped[pos + pattern.len()..];
            let segment = rest.split(['/', '?', '#']).next().unwrap_or("");
            if segment.is_empty() {
                return UNKNOWN_COMPANY.to_string();
            }
            return capitalize(segment);
        }
    }

    let host = stripped.split(['/', '?', '#']).next().unwrap_or("");
    match host.split_once('.') {
        Some((label, _)) if !label.is_empty() => capitalize(label),
        _ => MANUAL_CHECK.to_string(),
    }
}

/// Short platform label for a site domain: its first dot-delimited label.
pub fn platform_label(site: &str) -> String {
    let label = site.trim().split('.').next().unwrap_or_default();
    label.to_string()
}

/// Turn a raw hit from `site` into a record stamped with the run's timestamp.
pub fn normalize_hit(hit: RawHit, site: &str, timestamp: &str) -> JobRecord {
    JobRecord {
        timestamp: timestamp.to_string(),
        company: extract_company(hit.link.as_deref()),
        platform: platform_label(site),
        title: hit.title.unwrap_or_default(),
        link: hit.link.unwrap_or_default(),
        snippet: hit.snippet.unwrap_or_default(),
    }
}

fn strip_scheme_and_www(link: &str) -> &str {
    let mut rest = link;
    for prefix in SCHEME_PREFIXES {
        if let Some(stripped) = strip_prefix_ignore_case(rest, prefix) {
            rest = stripped;
            break;
        }
    }
    strip_prefix_ignore_case(rest, "www.").unwrap_or(rest)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Upper-case the first character and lower-case the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greenhouse_slug() {
        assert_eq!(
            extract_company(Some("https://boards.greenhouse.io/acme/jobs/123")),
            "Acme"
        );
    }

    #[test]
    fn test_lever_slug() {
        assert_eq!(
            extract_company(Some("https://jobs.lever.co/widgetco/abcd")),
            "Widgetco"
        );
    }

    #[test]
    fn test_ashby_slug_is_capitalized() {
        assert_eq!(
            extract_company(Some("https://jobs.ashbyhq.com/Foo-Inc/xyz")),
            "Foo-inc"
        );
    }

    #[test]
    fn test_fallback_to_first_label() {
        assert_eq!(
            extract_company(Some("https://example.com/careers/42")),
            "Example"
        );
    }

    #[test]
    fn test_missing_or_malformed_link() {
        assert_eq!(extract_company(None), MANUAL_CHECK);
        assert_eq!(extract_company(Some("")), MANUAL_CHECK);
        assert_eq!(extract_company(Some("   ")), MANUAL_CHECK);
        assert_eq!(extract_company(Some("not-a-url")), MANUAL_CHECK);
        assert_eq!(extract_company(Some("https://.com/x")), MANUAL_CHECK);
    }

    #[test]
    fn test_scheme_and_www_are_case_insensitive() {
        assert_eq!(
            extract_company(Some("HTTPS://WWW.Example.com/jobs")),
            "Example"
        );
        assert_eq!(
            extract_company(Some("http://www.rippling.com/x")),
            "Rippling"
        );
        assert_eq!(
            extract_company(Some("HTTP://Jobs.Lever.Co/Stripe/1")),
            "Stripe"
        );
    }

    #[test]
    fn test_ats_pattern_without_slug_is_unknown() {
        assert_eq!(
            extract_company(Some("https://boards.greenhouse.io/")),
            UNKNOWN_COMPANY
        );
        assert_eq!(
            extract_company(Some("https://jobs.lever.co/?q=rust")),
            UNKNOWN_COMPANY
        );
    }

    #[test]
    fn test_slug_stops_at_query_string() {
        assert_eq!(
            extract_company(Some("https://jobs.ashbyhq.com/linear?utm=x")),
            "Linear"
        );
    }

    #[test]
    fn test_platform_label() {
        assert_eq!(platform_label("greenhouse.io"), "greenhouse");
        assert_eq!(platform_label("app.dover.io"), "app");
        assert_eq!(platform_label("myworkdayjobs.com"), "myworkdayjobs");
    }

    #[test]
    fn test_normalize_passes_fields_through() {
        let hit = RawHit {
            title: None,
            link: Some("https://jobs.lever.co/widgetco/abcd".into()),
            snippet: Some("Remote, $200k".into()),
        };
        let record = normalize_hit(hit, "lever.co", "2026-10-19");
        assert_eq!(record.timestamp, "2026-10-19");
        assert_eq!(record.company, "Widgetco");
        assert_eq!(record.platform, "lever");
        assert_eq!(record.title, "");
        assert_eq!(record.link, "https://jobs.lever.co/widgetco/abcd");
        assert_eq!(record.snippet, "Remote, $200k");
    }

    #[test]
    fn test_normalize_without_link_flags_manual_check() {
        let record = normalize_hit(RawHit::default(), "greenhouse.io", "2026-10-19");
        assert_eq!(record.company, MANUAL_CHECK);
        assert_eq!(record.link, "");
    }
}
