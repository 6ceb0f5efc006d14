//! Single-case execution.

use crate::assets::AssetStore;
use crate::case::{TestCase, TestResult, MISMATCH_COMMENT, PASSED_COMMENT};
use crate::comparer::ImageComparer;
use crate::resource::ImageResource;
use crate::result::{LookalikeError, LookalikeResult};
use std::sync::Arc;
use std::time::Instant;

/// Runs one [`TestCase`] end to end: fetch, decode, compare, diff.
#[derive(Debug, Clone)]
pub struct CaseExecutor {
    comparer: Arc<dyn ImageComparer>,
    assets: Arc<dyn AssetStore>,
}

impl CaseExecutor {
    /// Create an executor over a comparer and an asset store
    #[must_use]
    pub fn new(comparer: Arc<dyn ImageComparer>, assets: Arc<dyn AssetStore>) -> Self {
        Self { comparer, assets }
    }

    /// Execute a case.
    ///
    /// Retrieval and decoding failures come back as a failed [`TestResult`]
    /// with the error (and its cause) in the comments and no images.
    ///
    /// # Errors
    ///
    /// Any error that is not [`LookalikeError::is_recoverable`] propagates.
    pub fn execute(&self, case: &TestCase) -> LookalikeResult<TestResult> {
        let started = Instant::now();
        tracing::debug!(test_id = %case.test_id, "executing case");
        let mut result = TestResult::for_case(case);

        match self.compare(case, &mut result) {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => {
                tracing::warn!(test_id = %case.test_id, error = %e, "case failed before comparison");
                result.test_passed = false;
                result.add_comment(e.to_string());
                if let Some(cause) = e.cause_message() {
                    result.add_comment(cause);
                }
            }
            Err(e) => return Err(e),
        }

        Ok(result.with_duration(started.elapsed()))
    }

    fn compare(&self, case: &TestCase, result: &mut TestResult) -> LookalikeResult<()> {
        // Both decoded images live only inside this scope; the result keeps copies.
        let candidate = self.load(&case.source_location)?;
        let reference = self.load(&case.reference_location)?;

        if self.comparer.matches(reference.image(), candidate.image()) {
            result.test_passed = true;
            result.add_comment(PASSED_COMMENT);
        } else {
            result.test_passed = false;
            result.add_comment(MISMATCH_COMMENT);
        }

        let difference = self
            .comparer
            .difference_map(reference.image(), candidate.image());

        result.reference_image = Some(reference.duplicate());
        result.source_image = Some(candidate.duplicate());
        result.difference_image = Some(difference);
        Ok(())
    }

    fn load(&self, locator: &str) -> LookalikeResult<ImageResource> {
        let bytes = self.assets.fetch_bytes(locator)?;
        ImageResource::decode(locator, &bytes)
    }
}

/// Convert an error that escaped a case into a failed result
pub(crate) fn failed_from_error(case: &TestCase, error: &LookalikeError) -> TestResult {
    let mut result = TestResult::failure(case, error.to_string());
    if let Some(cause) = error.cause_message() {
        result.add_comment(cause);
    }
    result
}
