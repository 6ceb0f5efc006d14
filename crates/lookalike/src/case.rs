//! Test cases and their results.

use crate::resource::ImageResource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Comment recorded when a case's images match
pub const PASSED_COMMENT: &str = "Passed";

/// Comment recorded when a case's images differ beyond the threshold
pub const MISMATCH_COMMENT: &str = "Source and Reference image do not match according to threshold.";

/// Comment recorded for cases cancelled before they completed
pub const CANCELLED_COMMENT: &str = "Cancelled before completion.";

/// Identifier of a test case, numeric or textual
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestId {
    /// Numeric identifier
    Number(u64),
    /// Free-form identifier
    Name(String),
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Name(s) => f.write_str(s),
        }
    }
}

impl From<u64> for TestId {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<u32> for TestId {
    fn from(n: u32) -> Self {
        Self::Number(u64::from(n))
    }
}

impl From<&str> for TestId {
    fn from(s: &str) -> Self {
        Self::Name(s.to_string())
    }
}

impl From<String> for TestId {
    fn from(s: String) -> Self {
        Self::Name(s)
    }
}

/// Input descriptor naming a freshly rendered image and its golden reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique identifier
    pub test_id: TestId,
    /// Locator of the freshly rendered image
    #[serde(rename = "source")]
    pub source_location: String,
    /// Locator of the golden image
    #[serde(rename = "reference")]
    pub reference_location: String,
    /// Classification tag, opaque to the pipeline
    #[serde(rename = "type", default)]
    pub case_type: String,
}

impl TestCase {
    /// Create a new test case
    #[must_use]
    pub fn new(
        test_id: impl Into<TestId>,
        source_location: impl Into<String>,
        reference_location: impl Into<String>,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            source_location: source_location.into(),
            reference_location: reference_location.into(),
            case_type: String::new(),
        }
    }

    /// Set the classification tag
    #[must_use]
    pub fn with_type(mut self, case_type: impl Into<String>) -> Self {
        self.case_type = case_type.into();
        self
    }
}

/// Outcome of executing one [`TestCase`]
///
/// Owns its three images until [`TestResult::release_images`] is called or
/// the result is dropped. Readers such as the report service borrow them.
#[derive(Debug)]
pub struct TestResult {
    /// Identifier of the case this result belongs to
    pub test_id: TestId,
    /// Whether the candidate matched the reference
    pub test_passed: bool,
    comments: Vec<String>,
    /// Source locator exactly as given in the case
    pub original_source_location: String,
    /// Reference locator exactly as given in the case
    pub original_reference_location: String,
    /// Candidate image, absent if the case failed before decoding it
    pub source_image: Option<ImageResource>,
    /// Golden image, absent if the case failed before decoding it
    pub reference_image: Option<ImageResource>,
    /// Difference map, absent if the case never reached comparison
    pub difference_image: Option<ImageResource>,
    cancelled: bool,
    /// Wall time spent executing the case
    pub duration: Duration,
}

impl TestResult {
    /// Empty, not-yet-passed result. Callers inside the crate must pass it or
    /// comment it before handing it on; public constructors always explain a
    /// failure.
    #[must_use]
    pub(crate) fn for_case(case: &TestCase) -> Self {
        Self {
            test_id: case.test_id.clone(),
            test_passed: false,
            comments: Vec::new(),
            original_source_location: case.source_location.clone(),
            original_reference_location: case.reference_location.clone(),
            source_image: None,
            reference_image: None,
            difference_image: None,
            cancelled: false,
            duration: Duration::ZERO,
        }
    }

    /// Passed result carrying the standard pass comment
    #[must_use]
    pub fn success(case: &TestCase) -> Self {
        Self::for_case(case).passed(true).with_comment(PASSED_COMMENT)
    }

    /// Failed result carrying a single explanatory comment
    #[must_use]
    pub fn failure(case: &TestCase, message: impl Into<String>) -> Self {
        Self::for_case(case).passed(false).with_comment(message)
    }

    /// Failed result for a case cancelled before completion
    #[must_use]
    pub fn cancelled(case: &TestCase) -> Self {
        let mut result = Self::failure(case, CANCELLED_COMMENT);
        result.cancelled = true;
        result
    }

    /// Override the test id
    #[must_use]
    pub fn for_test_id(mut self, test_id: impl Into<TestId>) -> Self {
        self.test_id = test_id.into();
        self
    }

    /// Set the pass flag
    #[must_use]
    pub const fn passed(mut self, passed: bool) -> Self {
        self.test_passed = passed;
        self
    }

    /// Append a diagnostic comment
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comments.push(comment.into());
        self
    }

    /// Append a diagnostic comment in place
    pub fn add_comment(&mut self, comment: impl Into<String>) {
        self.comments.push(comment.into());
    }

    /// Set the execution time
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Diagnostic trail, oldest first
    #[must_use]
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Whether the case was cancelled rather than executed
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether the case reached the comparison step
    #[must_use]
    pub const fn has_difference(&self) -> bool {
        self.difference_image.is_some()
    }

    /// A failed result must explain itself
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.test_passed || !self.comments.is_empty()
    }

    /// Free all owned images. Calling it again is a no-op.
    pub fn release_images(&mut self) {
        for image in [
            self.source_image.take(),
            self.reference_image.take(),
            self.difference_image.take(),
        ]
        .into_iter()
        .flatten()
        {
            image.release();
        }
    }
}
