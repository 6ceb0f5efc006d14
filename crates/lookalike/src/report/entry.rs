//! Report rows and persisted artifact paths.

use crate::case::{TestId, TestResult};
use serde::Serialize;
use std::path::Path;
use url::Url;

/// Report-relative paths of the artifacts persisted for one result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedPaths {
    /// Candidate image
    pub source: Option<String>,
    /// Reference image, or the original reference locator when not copied
    pub reference: Option<String>,
    /// Difference map
    pub difference: Option<String>,
}

/// Report-ready projection of a retained [`TestResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Case identifier
    pub test_id: TestId,
    /// Whether the case passed
    pub test_passed: bool,
    /// Diagnostic trail
    pub comments: Vec<String>,
    /// URI of the persisted candidate image, empty if none
    pub source_path: String,
    /// URI of the reference image, empty if none
    pub reference_path: String,
    /// URI of the persisted difference map, empty if none
    pub difference_path: String,
    /// URI of the original source locator, empty if unresolvable
    pub original_source: String,
    /// Case execution time in milliseconds
    pub duration_ms: u64,
}

impl ReportEntry {
    /// Project a result and its persisted paths into a row
    #[must_use]
    pub fn new(result: &TestResult, paths: &PersistedPaths) -> Self {
        let uri = |path: &Option<String>| path.as_deref().map(make_uri).unwrap_or_default();
        Self {
            test_id: result.test_id.clone(),
            test_passed: result.test_passed,
            comments: result.comments().to_vec(),
            source_path: uri(&paths.source),
            reference_path: uri(&paths.reference),
            difference_path: uri(&paths.difference),
            original_source: make_uri(&result.original_source_location),
            duration_ms: result.duration.as_millis() as u64,
        }
    }
}

/// Normalize a path or locator into URI form.
///
/// Absolute URIs are kept, absolute paths become `file://` URIs and relative
/// paths stay relative with `/` separators. Anything that cannot be expressed
/// as a URI yields an empty string.
#[must_use]
pub fn make_uri(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        return String::new();
    }
    if let Ok(url) = Url::parse(path) {
        // One-letter schemes are Windows drive letters, not URIs
        if url.scheme().len() > 1 {
            return url.into();
        }
    }
    if Path::new(path).is_absolute() {
        return Url::from_file_path(path).map(String::from).unwrap_or_default();
    }
    if path.contains(':') {
        return String::new();
    }
    encode_relative(path)
}

fn encode_relative(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '\\' => out.push('/'),
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::case::TestCase;
    use std::time::Duration;

    mod make_uri_tests {
        use super::*;

        #[test]
        fn test_relative_path_stays_relative() {
            assert_eq!(make_uri("images/1-abc-generated.png"), "images/1-abc-generated.png");
        }

        #[test]
        fn test_relative_path_is_escaped() {
            assert_eq!(make_uri("golden shots\\a#1.png"), "golden%20shots/a%231.png");
        }

        #[test]
        fn test_parent_segments_survive() {
            assert_eq!(make_uri("../golden/a.png"), "../golden/a.png");
        }

        #[test]
        fn test_absolute_uri_is_kept() {
            assert_eq!(
                make_uri("https://ci.example.com/run/7/a.png"),
                "https://ci.example.com/run/7/a.png"
            );
        }

        #[cfg(unix)]
        #[test]
        fn test_absolute_path_becomes_file_uri() {
            assert_eq!(make_uri("/srv/golden/a b.png"), "file:///srv/golden/a%20b.png");
        }

        #[test]
        fn test_blank_is_empty() {
            assert_eq!(make_uri("   "), "");
        }

        #[cfg(unix)]
        #[test]
        fn test_unresolvable_is_empty() {
            assert_eq!(make_uri("C:relative\\odd.png"), "");
        }
    }

    mod entry_tests {
        use super::*;

        #[test]
        fn test_entry_from_result() {
            let case = TestCase::new(2u32, "out/b.png", "https://golden/b.png");
            let result = TestResult::failure(&case, "boom").with_duration(Duration::from_millis(12));
            let paths = PersistedPaths {
                source: Some("images/2-x-generated.png".to_string()),
                reference: Some(case.reference_location.clone()),
                difference: None,
            };

            let entry = ReportEntry::new(&result, &paths);
            assert_eq!(entry.test_id, TestId::Number(2));
            assert!(!entry.test_passed);
            assert_eq!(entry.comments, ["boom"]);
            assert_eq!(entry.source_path, "images/2-x-generated.png");
            assert_eq!(entry.reference_path, "https://golden/b.png");
            assert_eq!(entry.difference_path, "");
            assert_eq!(entry.original_source, "out/b.png");
            assert_eq!(entry.duration_ms, 12);
        }

        #[test]
        fn test_entry_serializes_flat() {
            let case = TestCase::new("login", "a.png", "b.png");
            let entry = ReportEntry::new(&TestResult::failure(&case, "x"), &PersistedPaths::default());
            let json = serde_json::to_value(&entry).unwrap();
            assert_eq!(json["test_id"], "login");
            assert_eq!(json["test_passed"], false);
            assert_eq!(json["comments"][0], "x");
        }
    }
}
