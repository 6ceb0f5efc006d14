//! Result aggregation and report rendering.

use super::config::{ReportConfiguration, IMAGES_FOLDER};
use super::entry::{PersistedPaths, ReportEntry};
use super::view::escape_xml;
use crate::assets::AssetStore;
use crate::case::{TestId, TestResult};
use crate::resource::ImageResource;
use crate::result::{LookalikeError, LookalikeResult};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Pass/fail tallies of an aggregation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Results that passed
    pub passed_tests: usize,
    /// Results that failed
    pub failed_tests: usize,
    /// Results retained as report rows
    pub entries: usize,
}

impl ReportSummary {
    /// Total results seen
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed_tests + self.failed_tests
    }

    /// Whether nothing failed
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failed_tests == 0
    }
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} passed, {} failed",
            self.passed_tests,
            self.total(),
            self.failed_tests
        )
    }
}

#[derive(Debug, Default)]
struct ReportState {
    passed_tests: usize,
    failed_tests: usize,
    failed_ids: Vec<TestId>,
    entries: Vec<ReportEntry>,
}

/// Collects [`TestResult`]s into a persisted HTML report.
///
/// `add_result` may be called concurrently. It reads the result's images to
/// persist them but never takes ownership; the caller releases them afterwards.
#[derive(Debug)]
pub struct ReportService {
    assets: Arc<dyn AssetStore>,
    config: ReportConfiguration,
    state: Mutex<ReportState>,
}

impl ReportService {
    /// Create a service and its `images` folder
    ///
    /// # Errors
    ///
    /// Returns [`LookalikeError::Persistence`] if the folder cannot be created
    pub fn new(assets: Arc<dyn AssetStore>, config: ReportConfiguration) -> LookalikeResult<Self> {
        assets.create_folder(&config.images_directory())?;
        Ok(Self {
            assets,
            config,
            state: Mutex::new(ReportState::default()),
        })
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &ReportConfiguration {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, ReportState> {
        // Tallies are updated in single statements, so a poisoned lock holds consistent data
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a result and, if the inclusion policy keeps it, persist its
    /// artifacts and record a report row.
    ///
    /// # Errors
    ///
    /// Returns [`LookalikeError::Persistence`] if an artifact cannot be
    /// encoded or written. The result stays counted but gets no row, and any
    /// of its artifacts already written are removed.
    pub fn add_result(&self, result: &TestResult) -> LookalikeResult<()> {
        {
            let mut state = self.state();
            if result.test_passed {
                state.passed_tests += 1;
            } else {
                state.failed_tests += 1;
                state.failed_ids.push(result.test_id.clone());
            }
        }

        if !self.config.includes(result.test_passed) {
            tracing::debug!(test_id = %result.test_id, "passing result not retained");
            return Ok(());
        }

        let paths = self.persist_assets(result).map_err(|e| {
            tracing::warn!(test_id = %result.test_id, error = %e, "could not persist artifacts");
            e
        })?;
        let entry = ReportEntry::new(result, &paths);
        self.state().entries.push(entry);
        Ok(())
    }

    /// Write a result's images under `images/` with one random suffix per
    /// result. All or nothing: a failed write removes the files before it.
    fn persist_assets(&self, result: &TestResult) -> LookalikeResult<PersistedPaths> {
        let stem = format!(
            "{}-{}",
            file_safe(&result.test_id),
            Uuid::new_v4().simple()
        );

        let mut written = Vec::new();
        let persisted = self.persist_images(result, &stem, &mut written);
        if persisted.is_err() {
            for path in &written {
                if let Err(e) = self.assets.delete_file(path) {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove partial artifact");
                }
            }
        }
        persisted
    }

    fn persist_images(
        &self,
        result: &TestResult,
        stem: &str,
        written: &mut Vec<PathBuf>,
    ) -> LookalikeResult<PersistedPaths> {
        let source = self.persist(result.source_image.as_ref(), stem, "generated", written)?;
        let difference = self.persist(result.difference_image.as_ref(), stem, "diff", written)?;
        let reference = if self.config.copy_reference_images {
            self.persist(result.reference_image.as_ref(), stem, "reference", written)?
        } else {
            Some(result.original_reference_location.clone())
        };

        Ok(PersistedPaths {
            source,
            reference,
            difference,
        })
    }

    fn persist(
        &self,
        image: Option<&ImageResource>,
        stem: &str,
        role: &str,
        written: &mut Vec<PathBuf>,
    ) -> LookalikeResult<Option<String>> {
        let Some(image) = image else {
            return Ok(None);
        };
        let file_name = format!("{stem}-{role}.{}", image.format_hint().extension());
        let bytes = image.encode()?;
        let path = self.config.images_directory().join(&file_name);
        self.assets.save_bytes(&bytes, &path)?;
        written.push(path);
        Ok(Some(format!("{IMAGES_FOLDER}/{file_name}")))
    }

    /// Results that passed so far
    #[must_use]
    pub fn passed_tests(&self) -> usize {
        self.state().passed_tests
    }

    /// Results that failed so far
    #[must_use]
    pub fn failed_tests(&self) -> usize {
        self.state().failed_tests
    }

    /// Snapshot of the report rows, in insertion order
    #[must_use]
    pub fn entries(&self) -> Vec<ReportEntry> {
        self.state().entries.clone()
    }

    /// Current tallies
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        let state = self.state();
        ReportSummary {
            passed_tests: state.passed_tests,
            failed_tests: state.failed_tests,
            entries: state.entries.len(),
        }
    }

    /// Comma-joined ids of every failed result, in the order they were added
    #[must_use]
    pub fn failures(&self) -> String {
        join_ids(&self.state().failed_ids)
    }

    /// Data model handed to the report view
    #[must_use]
    pub fn data_model(&self) -> Value {
        let state = self.state();
        json!({
            "reportname": self.config.report_name,
            "result": state.entries,
            "passed": state.passed_tests,
            "failed": state.failed_tests,
            "total": state.passed_tests + state.failed_tests,
            "failures": join_ids(&state.failed_ids),
        })
    }

    /// Render and write `report.html` (and `junit.xml` when enabled).
    ///
    /// Repeatable: the same accumulated state renders the same bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LookalikeError::Template`] if the template cannot be read or
    /// rendered and [`LookalikeError::Persistence`] if the output cannot be
    /// written. Collected results are untouched either way.
    pub fn finalize(&self) -> LookalikeResult<PathBuf> {
        let template = self.read_template()?;
        let model = self.data_model();
        let html = self.config.report_view.render(&template, &model)?;

        self.assets.create_folder(&self.config.report_directory())?;
        let report_path = self.config.report_path();
        self.assets.save_text(&html, &report_path)?;

        if self.config.write_junit {
            let junit_path = self.config.junit_path();
            self.assets.save_text(&self.render_junit(), &junit_path)?;
            tracing::debug!(path = %junit_path.display(), "junit written");
        }

        tracing::info!(
            path = %report_path.display(),
            summary = %self.summary(),
            "report written"
        );
        Ok(report_path)
    }

    fn read_template(&self) -> LookalikeResult<String> {
        let path = self.config.template_path();
        let locator = path.to_string_lossy();
        let bytes = self.assets.fetch_bytes(&locator).map_err(|e| {
            LookalikeError::template(format!("could not read template {locator}: {e}"))
        })?;
        String::from_utf8(bytes)
            .map_err(|e| LookalikeError::template(format!("template {locator} is not UTF-8: {e}")))
    }

    /// Render the retained rows as JUnit XML
    #[must_use]
    pub fn render_junit(&self) -> String {
        let state = self.state();
        let failed = state.entries.iter().filter(|e| !e.test_passed).count();
        let seconds: f64 = state
            .entries
            .iter()
            .map(|e| e.duration_ms as f64 / 1000.0)
            .sum();

        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<testsuite name="{}" tests="{}" failures="{}" time="{:.3}">"#,
            escape_xml(&self.config.report_name),
            state.entries.len(),
            failed,
            seconds
        ));
        xml.push('\n');

        for entry in &state.entries {
            xml.push_str(&format!(
                r#"  <testcase name="{}" classname="{}" time="{:.3}">"#,
                escape_xml(&entry.test_id.to_string()),
                escape_xml(&self.config.report_name),
                entry.duration_ms as f64 / 1000.0
            ));
            xml.push('\n');

            if !entry.test_passed {
                let message = entry.comments.join("; ");
                xml.push_str(&format!(
                    r#"    <failure message="{}">{}</failure>"#,
                    escape_xml(&message),
                    escape_xml(&entry.comments.join("\n"))
                ));
                xml.push('\n');
            }

            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }
}

fn join_ids(ids: &[TestId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Test id as a file name component
fn file_safe(test_id: &TestId) -> String {
    test_id
        .to_string()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Aggregate a finished batch and write its report in one call.
///
/// # Errors
///
/// Returns the first persistence or template error encountered
pub fn generate_report(
    assets: Arc<dyn AssetStore>,
    config: ReportConfiguration,
    results: &[TestResult],
) -> LookalikeResult<PathBuf> {
    let service = ReportService::new(assets, config)?;
    for result in results {
        service.add_result(result)?;
    }
    service.finalize()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::assets::NativeAssetStore;
    use crate::case::{TestCase, MISMATCH_COMMENT, PASSED_COMMENT};
    use crate::resource::FormatHint;
    use crate::report::DEFAULT_TEMPLATE;
    use image::{DynamicImage, RgbaImage};
    use proptest::prelude::*;
    use std::fs;
    use std::io::Read;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn image(hint: FormatHint) -> ImageResource {
        ImageResource::new(DynamicImage::ImageRgba8(RgbaImage::new(2, 2)), hint)
    }

    fn compared(id: u32, passed: bool) -> TestResult {
        let case = TestCase::new(id, format!("out/{id}.png"), format!("golden/{id}.png"));
        let comment = if passed { PASSED_COMMENT } else { MISMATCH_COMMENT };
        let mut result = TestResult::for_case(&case).passed(passed).with_comment(comment);
        result.source_image = Some(image(FormatHint::Png));
        result.reference_image = Some(image(FormatHint::Gif));
        result.difference_image = Some(image(FormatHint::Unknown));
        result
    }

    fn service(dir: &TempDir, config: ReportConfiguration) -> ReportService {
        let templates = dir.path().join("templates");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("template.html"), DEFAULT_TEMPLATE).unwrap();
        let config = config
            .with_output_directory(dir.path().join("out"))
            .with_template_directory(templates);
        ReportService::new(Arc::new(NativeAssetStore::new()), config).unwrap()
    }

    fn image_files(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir.path().join("out/report/images"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    mod add_result_tests {
        use super::*;

        #[test]
        fn test_new_creates_images_folder() {
            let dir = TempDir::new().unwrap();
            let _service = service(&dir, ReportConfiguration::new());
            assert!(dir.path().join("out/report/images").is_dir());
        }

        #[test]
        fn test_persists_three_artifacts_with_shared_suffix() {
            let dir = TempDir::new().unwrap();
            let service = service(&dir, ReportConfiguration::new());
            service.add_result(&compared(1, true)).unwrap();

            let files = image_files(&dir);
            assert_eq!(files.len(), 3);
            let suffix = files[0].trim_start_matches("1-").split('-').next().unwrap().to_string();
            assert_eq!(suffix.len(), 32);
            assert!(files.contains(&format!("1-{suffix}-diff.jpg")));
            assert!(files.contains(&format!("1-{suffix}-generated.png")));
            assert!(files.contains(&format!("1-{suffix}-reference.gif")));

            let entry = &service.entries()[0];
            assert_eq!(entry.source_path, format!("images/1-{suffix}-generated.png"));
            assert_eq!(entry.difference_path, format!("images/1-{suffix}-diff.jpg"));
            assert_eq!(entry.original_source, "out/1.png");
        }

        #[test]
        fn test_hidden_success_counts_without_artifacts() {
            let dir = TempDir::new().unwrap();
            let service = service(&dir, ReportConfiguration::new().with_display_successes(false));
            service.add_result(&compared(1, true)).unwrap();

            assert_eq!(service.passed_tests(), 1);
            assert!(service.entries().is_empty());
            assert!(image_files(&dir).is_empty());
        }

        #[test]
        fn test_failure_always_retained() {
            let dir = TempDir::new().unwrap();
            let service = service(&dir, ReportConfiguration::new().with_display_successes(false));
            service.add_result(&compared(2, false)).unwrap();
            assert_eq!(service.failed_tests(), 1);
            assert_eq!(service.entries().len(), 1);
        }

        #[test]
        fn test_linked_reference_uses_original_locator() {
            let dir = TempDir::new().unwrap();
            let service = service(&dir, ReportConfiguration::new().with_copy_reference_images(false));
            service.add_result(&compared(3, false)).unwrap();

            assert_eq!(service.entries()[0].reference_path, "golden/3.png");
            assert!(image_files(&dir).iter().all(|f| !f.contains("reference")));
            assert_eq!(image_files(&dir).len(), 2);
        }

        #[test]
        fn test_result_without_images() {
            let dir = TempDir::new().unwrap();
            let service = service(&dir, ReportConfiguration::new());
            let case = TestCase::new(4u32, "missing.png", "golden/4.png");
            service.add_result(&TestResult::failure(&case, "gone")).unwrap();

            let entry = &service.entries()[0];
            assert_eq!(entry.source_path, "");
            assert_eq!(entry.reference_path, "");
            assert_eq!(entry.difference_path, "");
            assert!(image_files(&dir).is_empty());
        }

        #[test]
        fn test_caller_keeps_images() {
            let dir = TempDir::new().unwrap();
            let service = service(&dir, ReportConfiguration::new());
            let mut result = compared(5, true);
            service.add_result(&result).unwrap();
            assert!(result.source_image.is_some());
            result.release_images();
            assert!(!result.has_difference());
        }

        #[test]
        fn test_persistence_failure_keeps_tally() {
            let dir = TempDir::new().unwrap();
            let service = service(&dir, ReportConfiguration::new());
            fs::remove_dir_all(dir.path().join("out/report/images")).unwrap();

            let err = service.add_result(&compared(6, false)).unwrap_err();
            assert!(matches!(err, LookalikeError::Persistence { .. }));
            assert_eq!(service.failed_tests(), 1);
            assert!(service.entries().is_empty());
            assert_eq!(service.failures(), "6");
        }

        /// Native store whose second image write fails
        #[derive(Debug, Default)]
        struct SecondSaveFails {
            inner: NativeAssetStore,
            saves: AtomicUsize,
        }

        impl AssetStore for SecondSaveFails {
            fn get(&self, locator: &str) -> LookalikeResult<Box<dyn Read + Send>> {
                self.inner.get(locator)
            }
            fn save_bytes(&self, bytes: &[u8], path: &Path) -> LookalikeResult<()> {
                if self.saves.fetch_add(1, Ordering::SeqCst) == 1 {
                    return Err(LookalikeError::persistence(path.display().to_string(), "disk full"));
                }
                self.inner.save_bytes(bytes, path)
            }
            fn save_text(&self, contents: &str, path: &Path) -> LookalikeResult<()> {
                self.inner.save_text(contents, path)
            }
            fn create_folder(&self, path: &Path) -> LookalikeResult<()> {
                self.inner.create_folder(path)
            }
            fn delete_file(&self, path: &Path) -> LookalikeResult<()> {
                self.inner.delete_file(path)
            }
        }

        #[test]
        fn test_partial_write_is_rolled_back() {
            let dir = TempDir::new().unwrap();
            let config = ReportConfiguration::new().with_output_directory(dir.path().join("out"));
            let service = ReportService::new(Arc::new(SecondSaveFails::default()), config).unwrap();

            let err = service.add_result(&compared(1, false)).unwrap_err();

            assert!(matches!(err, LookalikeError::Persistence { .. }));
            assert!(image_files(&dir).is_empty());
            assert!(service.entries().is_empty());
            assert_eq!(service.failed_tests(), 1);
            assert_eq!(service.failures(), "1");
            assert_eq!(service.data_model()["failures"], "1");
        }

        #[test]
        fn test_text_ids_are_file_safe() {
            assert_eq!(file_safe(&TestId::from("pages/home page")), "pages_home_page");
            assert_eq!(file_safe(&TestId::from(12u32)), "12");
        }
    }

    mod concurrency_tests {
        use super::*;

        #[test]
        fn test_concurrent_add_result() {
            let dir = TempDir::new().unwrap();
            let service = Arc::new(service(&dir, ReportConfiguration::new()));
            let handles: Vec<_> = (0..8u32)
                .map(|t| {
                    let service = Arc::clone(&service);
                    std::thread::spawn(move || {
                        for i in 0..5u32 {
                            let case = TestCase::new(t * 100 + i, "s", "r");
                            let result = TestResult::for_case(&case)
                                .passed(i % 2 == 0)
                                .with_comment("c");
                            service.add_result(&result).unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(service.passed_tests(), 24);
            assert_eq!(service.failed_tests(), 16);
            assert_eq!(service.entries().len(), 40);
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            #[test]
            fn prop_tallies_are_exact(outcomes in proptest::collection::vec(any::<bool>(), 0..40)) {
                let dir = TempDir::new().unwrap();
                let service = Arc::new(service(&dir, ReportConfiguration::new().with_display_successes(false)));
                let handles: Vec<_> = outcomes
                    .chunks(5)
                    .enumerate()
                    .map(|(t, chunk)| {
                        let service = Arc::clone(&service);
                        let chunk = chunk.to_vec();
                        std::thread::spawn(move || {
                            for (i, passed) in chunk.into_iter().enumerate() {
                                let case = TestCase::new((t * 10 + i) as u64, "s", "r");
                                let result = TestResult::for_case(&case).passed(passed).with_comment("c");
                                service.add_result(&result).unwrap();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }

                let passed = outcomes.iter().filter(|p| **p).count();
                prop_assert_eq!(service.passed_tests(), passed);
                prop_assert_eq!(service.failed_tests(), outcomes.len() - passed);
                prop_assert_eq!(service.entries().len(), outcomes.len() - passed);
            }
        }
    }

    mod finalize_tests {
        use super::*;

        #[test]
        fn test_data_model_keys() {
            let dir = TempDir::new().unwrap();
            let service = service(&dir, ReportConfiguration::new().with_report_name("nightly"));
            service.add_result(&compared(1, true)).unwrap();
            service.add_result(&compared(2, false)).unwrap();
            service.add_result(&compared(3, false)).unwrap();

            let model = service.data_model();
            assert_eq!(model["reportname"], "nightly");
            assert_eq!(model["passed"], 1);
            assert_eq!(model["failed"], 2);
            assert_eq!(model["total"], 3);
            assert_eq!(model["failures"], "2,3");
            assert_eq!(model["result"].as_array().unwrap().len(), 3);
            assert_eq!(service.failures(), "2,3");
        }

        #[test]
        fn test_finalize_writes_report() {
            let dir = TempDir::new().unwrap();
            let service = service(&dir, ReportConfiguration::new());
            service.add_result(&compared(1, false)).unwrap();

            let path = service.finalize().unwrap();
            assert_eq!(path, dir.path().join("out/report/report.html"));
            let html = fs::read_to_string(path).unwrap();
            assert!(html.contains(MISMATCH_COMMENT));
            assert!(!dir.path().join("out/report/junit.xml").exists());
        }

        #[test]
        fn test_finalize_is_repeatable() {
            let dir = TempDir::new().unwrap();
            let service = service(&dir, ReportConfiguration::new());
            service.add_result(&compared(1, true)).unwrap();
            service.add_result(&compared(2, false)).unwrap();

            let first = fs::read(service.finalize().unwrap()).unwrap();
            let second = fs::read(service.finalize().unwrap()).unwrap();
            assert_eq!(first, second);
        }

        #[test]
        fn test_missing_template_is_template_error() {
            let dir = TempDir::new().unwrap();
            let service = service(&dir, ReportConfiguration::new().with_template_name("absent.html"));
            service.add_result(&compared(1, false)).unwrap();

            let err = service.finalize().unwrap_err();
            assert!(matches!(err, LookalikeError::Template { .. }));
            assert_eq!(service.failed_tests(), 1);
            assert_eq!(service.entries().len(), 1);
        }

        #[test]
        fn test_junit_written_when_enabled() {
            let dir = TempDir::new().unwrap();
            let service = service(&dir, ReportConfiguration::new().with_junit(true));
            service.add_result(&compared(1, true)).unwrap();
            service.add_result(&compared(2, false)).unwrap();
            service.finalize().unwrap();

            let xml = fs::read_to_string(dir.path().join("out/report/junit.xml")).unwrap();
            assert!(xml.contains(r#"tests="2" failures="1""#));
            assert!(xml.contains(r#"<testcase name="2""#));
            assert!(xml.contains("<failure message="));
        }

        #[test]
        fn test_generate_report_helper() {
            let dir = TempDir::new().unwrap();
            let templates = dir.path().join("t");
            fs::create_dir_all(&templates).unwrap();
            fs::write(templates.join("template.html"), "{{passed}}/{{failed}} [{{failures}}]").unwrap();
            let config = ReportConfiguration::new()
                .with_output_directory(dir.path().join("out"))
                .with_template_directory(templates);

            let results = vec![compared(1, true), compared(7, false)];
            let path = generate_report(Arc::new(NativeAssetStore::new()), config, &results).unwrap();
            assert_eq!(fs::read_to_string(path).unwrap(), "1/1 [7]");
        }
    }

    #[test]
    fn test_summary_display() {
        let summary = ReportSummary {
            passed_tests: 3,
            failed_tests: 1,
            entries: 4,
        };
        assert_eq!(summary.to_string(), "3/4 passed, 1 failed");
        assert_eq!(summary.total(), 4);
        assert!(!summary.all_passed());
    }
}
