//! URL canonicalization and admission rules.
//!
//! Canonical form: scheme and host lowercased, fragment stripped, path/query
//! otherwise preserved — identity used everywhere else in the crawl engine.

use url::Url;

/// The default allowed-host-suffix family (Open Question 1: the four-suffix
/// UCI family, not the single-suffix `.ics.uci.edu`-only variant).
pub const DEFAULT_ALLOWED_SUFFIXES: &[&str] = &[
    ".ics.uci.edu",
    ".cs.uci.edu",
    ".informatics.uci.edu",
    ".stat.uci.edu",
];

/// Path-suffix denylist (case-insensitive), fixed by spec.md §6.
pub const DENYLISTED_EXTENSIONS: &[&str] = &[
    "css", "js", "bmp", "gif", "jpg", "jpeg", "ico", "png", "tiff", "tif", "mid", "mp2", "mp3",
    "mp4", "wav", "avi", "mov", "mpeg", "mpg", "ram", "m4v", "mkv", "ogg", "ogv", "pdf", "ps",
    "eps", "tex", "ppt", "pptx", "doc", "docx", "xls", "xlsx", "names", "data", "dat", "exe",
    "bz2", "tar", "msi", "bin", "7z", "psd", "dmg", "iso", "epub", "dll", "cnf", "tgz", "sha1",
    "thmx", "mso", "arff", "rtf", "jar", "csv", "rm", "smil", "wmv", "swf", "wma", "zip", "rar",
    "gz", "xml", "rss", "json", "txt", "py", "java", "cpp", "c", "h", "hpp", "cc", "svg", "woff",
    "woff2", "ttf", "eot", "otf",
];

/// A URL in canonical form: a parsed, re-serializable identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    /// Wrap an already-canonical string verbatim. Callers that start from a
    /// raw URL should go through [`canonicalize_str`] instead; this exists
    /// for constructing test fixtures and for round-tripping values already
    /// known to be canonical (e.g. read back out of the frontier's store).
    pub fn new(canonical: String) -> Self {
        Self(canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve `href` against `base` and canonicalize the result.
///
/// Returns `None` on any parse/resolution failure — callers treat that as
/// "not a link", matching spec.md 4.3's graceful-degradation rule.
pub fn resolve(base: &Url, href: &str) -> Option<CanonicalUrl> {
    let resolved = base.join(href).ok()?;
    Some(canonicalize(&resolved))
}

/// Canonicalize an already-parsed URL: lowercase scheme/host, drop fragment,
/// keep path/params/query as-is.
pub fn canonicalize(url: &Url) -> CanonicalUrl {
    let mut u = url.clone();
    let _ = u.set_scheme(&u.scheme().to_ascii_lowercase());
    if let Some(host) = u.host_str() {
        let lowered = host.to_ascii_lowercase();
        let _ = u.set_host(Some(&lowered));
    }
    u.set_fragment(None);
    CanonicalUrl(u.to_string())
}

/// Canonicalize a possibly-relative or absolute URL string directly.
pub fn canonicalize_str(raw: &str) -> Option<CanonicalUrl> {
    let parsed = Url::parse(raw).ok()?;
    Some(canonicalize(&parsed))
}

/// Validity predicate: scheme/host-suffix/fragment/extension checks.
///
/// Any parse exception is treated as invalid, matching spec.md 4.2's
/// "any exception during parsing -> invalid" rule.
pub fn is_valid(url: &str, allowed_suffixes: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    is_valid_parsed(&parsed, allowed_suffixes)
}

fn is_valid_parsed(parsed: &Url, allowed_suffixes: &[String]) -> bool {
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }

    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host_lower = host.to_ascii_lowercase();
    if !allowed_suffixes
        .iter()
        .any(|suffix| host_lower.ends_with(suffix.as_str()))
    {
        return false;
    }

    if !parsed.fragment().unwrap_or("").is_empty() {
        return false;
    }

    let path_lower = parsed.path().to_ascii_lowercase();
    if has_denylisted_extension(&path_lower) {
        return false;
    }

    true
}

fn has_denylisted_extension(path_lower: &str) -> bool {
    DENYLISTED_EXTENSIONS
        .iter()
        .any(|ext| path_lower.ends_with(&format!(".{ext}")))
}

/// Default allowed-suffix list as owned strings, for plugging into config.
pub fn default_allowed_suffixes() -> Vec<String> {
    DEFAULT_ALLOWED_SUFFIXES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suffixes() -> Vec<String> {
        default_allowed_suffixes()
    }

    #[test]
    fn accepts_allowed_host_and_path() {
        assert!(is_valid("https://www.ics.uci.edu/about.html", &suffixes()));
    }

    #[test]
    fn rejects_disallowed_host() {
        assert!(!is_valid("https://example.com/", &suffixes()));
    }

    #[test]
    fn rejects_denylisted_extension() {
        assert!(!is_valid("https://foo.ics.uci.edu/a.pdf", &suffixes()));
    }

    #[test]
    fn accepts_query_string() {
        assert!(is_valid("https://foo.ics.uci.edu/page?x=1", &suffixes()));
    }

    #[test]
    fn fragment_is_stripped_by_canonicalization_then_valid() {
        let canon = canonicalize_str("https://foo.ics.uci.edu/page#top").unwrap();
        assert_eq!(canon.as_str(), "https://foo.ics.uci.edu/page");
        assert!(is_valid(canon.as_str(), &suffixes()));
    }

    #[test]
    fn resolves_relative_dotdot() {
        let base = Url::parse("https://h.ics.uci.edu/x/y/").unwrap();
        let resolved = resolve(&base, "../b").unwrap();
        assert_eq!(resolved.as_str(), "https://h.ics.uci.edu/x/b");
    }

    #[test]
    fn extension_check_ignores_query_string() {
        assert!(!is_valid(
            "https://foo.ics.uci.edu/archive.zip?download=1",
            &suffixes()
        ));
    }

    #[test]
    fn malformed_url_is_invalid_not_a_panic() {
        assert!(!is_valid("ht!tp://[::not a url", &suffixes()));
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let once = canonicalize_str("HTTPS://Foo.ICS.UCI.EDU/Page?q=1#frag").unwrap();
        let twice = canonicalize_str(once.as_str()).unwrap();
        assert_eq!(once, twice);
        assert!(twice.as_str().parse::<Url>().unwrap().fragment().is_none());
    }

    proptest::proptest! {
        #[test]
        fn canonicalize_idempotent_prop(host in "[a-z]{1,10}\\.ics\\.uci\\.edu", path in "[a-z/]{0,10}") {
            let raw = format!("https://{host}/{path}");
            if let Some(once) = canonicalize_str(&raw) {
                let twice = canonicalize_str(once.as_str()).unwrap();
                proptest::prop_assert_eq!(once, twice);
            }
        }
    }
}
