//! Lookalike: concurrent visual regression runner with HTML reporting
//!
//! Each [`TestCase`] names a freshly rendered image and its golden reference.
//! The [`BatchRunner`] executes cases concurrently, the [`CaseExecutor`]
//! compares each pair and the [`ReportService`] aggregates the outcomes into a
//! persisted report.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    LOOKALIKE Pipeline                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ TestCase   │    │ Batch      │    │ Case       │            │
//! │   │ manifest   │───►│ Runner     │───►│ Executor   │            │
//! │   │            │    │ (bounded)  │    │ fetch/diff │            │
//! │   └────────────┘    └─────┬──────┘    └────────────┘            │
//! │                           │ TestResult                          │
//! │                           ▼                                     │
//! │                     ┌────────────┐    ┌────────────┐            │
//! │                     │ Report     │───►│ report.html│            │
//! │                     │ Service    │    │ images/*   │            │
//! │                     └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lookalike::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> LookalikeResult<()> {
//! let assets: Arc<dyn AssetStore> = Arc::new(NativeAssetStore::new());
//! let executor = CaseExecutor::new(Arc::new(ThresholdComparer::default()), Arc::clone(&assets));
//! let runner = BatchRunner::new(executor, BatchConfig::default());
//!
//! let mut results = runner.run_blocking(vec![
//!     TestCase::new(1u32, "out/home.png", "golden/home.png"),
//! ])?;
//! let report = generate_report(assets, ReportConfiguration::default(), &results)?;
//! for result in &mut results {
//!     result.release_images();
//! }
//! println!("report written to {}", report.display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Artifact retrieval and persistence
pub mod assets;

/// Concurrent batch execution
pub mod batch;

mod case;

/// Image comparison and difference maps
pub mod comparer;

mod executor;

/// Manifest files
pub mod manifest;

/// Result aggregation and HTML reporting
pub mod report;

mod resource;
mod result;

pub use assets::{AssetStore, Locator, NativeAssetStore, DEFAULT_FETCH_TIMEOUT};
pub use batch::{BatchCancellation, BatchConfig, BatchRunner};
pub use case::{TestCase, TestId, TestResult, CANCELLED_COMMENT, MISMATCH_COMMENT, PASSED_COMMENT};
pub use comparer::{ComparisonConfig, DiffStats, ImageComparer, ThresholdComparer};
pub use executor::CaseExecutor;
pub use manifest::Manifest;
pub use report::{
    generate_report, MustacheView, PersistedPaths, ReportConfiguration, ReportEntry,
    ReportService, ReportSummary, ReportView, DEFAULT_TEMPLATE,
};
pub use resource::{FormatHint, ImageResource};
pub use result::{LookalikeError, LookalikeResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        generate_report, AssetStore, BatchCancellation, BatchConfig, BatchRunner, CaseExecutor,
        ComparisonConfig, FormatHint, ImageComparer, ImageResource, LookalikeError,
        LookalikeResult, Manifest, MustacheView, NativeAssetStore, ReportConfiguration,
        ReportService, ReportView, TestCase, TestId, TestResult, ThresholdComparer,
    };
}
