//! Manifest files listing the cases of a run.
//!
//! ```yaml
//! cases:
//!   - test_id: 1
//!     source: out/home.png
//!     reference: golden/home.png
//!     type: page
//! report:
//!   report_name: nightly
//! batch:
//!   max_workers: 8
//! comparison:
//!   threshold: 0.02
//! ```
//!
//! JSON is accepted too; `.yaml`/`.yml` files are read as YAML, anything
//! else as JSON. Relative local locators resolve against the manifest's
//! directory.

use crate::assets::Locator;
use crate::batch::BatchConfig;
use crate::case::TestCase;
use crate::comparer::ComparisonConfig;
use crate::report::ReportConfiguration;
use crate::result::{LookalikeError, LookalikeResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Cases plus optional configuration sections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Cases to run
    pub cases: Vec<TestCase>,
    /// Report settings
    pub report: Option<ReportConfiguration>,
    /// Batch settings
    pub batch: Option<BatchConfig>,
    /// Comparison tolerances
    pub comparison: Option<ComparisonConfig>,
}

impl Manifest {
    /// Load and validate a manifest file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or lists a test id twice
    pub fn load(path: &Path) -> LookalikeResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let manifest = if is_yaml {
            Self::from_yaml(&contents)?
        } else {
            Self::from_json(&contents)?
        };

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let manifest = manifest.resolve_against(base);
        tracing::debug!(path = %path.display(), cases = manifest.cases.len(), "manifest loaded");
        Ok(manifest)
    }

    /// Parse JSON
    ///
    /// # Errors
    ///
    /// Returns error on malformed JSON or duplicate test ids
    pub fn from_json(contents: &str) -> LookalikeResult<Self> {
        let manifest: Self = serde_json::from_str(contents)?;
        manifest.validate()
    }

    /// Parse YAML
    ///
    /// # Errors
    ///
    /// Returns error on malformed YAML or duplicate test ids
    pub fn from_yaml(contents: &str) -> LookalikeResult<Self> {
        let manifest: Self = serde_yaml_ng::from_str(contents)?;
        manifest.validate()
    }

    fn validate(self) -> LookalikeResult<Self> {
        let mut seen = HashSet::new();
        for case in &self.cases {
            if !seen.insert(&case.test_id) {
                return Err(LookalikeError::config(format!(
                    "test id {} appears more than once",
                    case.test_id
                )));
            }
        }
        Ok(self)
    }

    /// Rebase relative local locators onto `base`
    #[must_use]
    pub fn resolve_against(mut self, base: &Path) -> Self {
        if base.as_os_str().is_empty() {
            return self;
        }
        for case in &mut self.cases {
            case.source_location = rebase(&case.source_location, base);
            case.reference_location = rebase(&case.reference_location, base);
        }
        self
    }
}

fn rebase(locator: &str, base: &Path) -> String {
    match Locator::parse(locator) {
        Ok(Locator::File(path)) if path.is_relative() => {
            base.join(path).to_string_lossy().into_owned()
        }
        _ => locator.to_string(),
    }
}
