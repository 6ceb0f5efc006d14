//! Report configuration.

use super::view::{MustacheView, ReportView};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Default output directory
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "target/lookalike";

/// Default report name
pub const DEFAULT_REPORT_NAME: &str = "report";

/// Default template directory
pub const DEFAULT_TEMPLATE_DIRECTORY: &str = "templates";

/// Default template file name
pub const DEFAULT_TEMPLATE_NAME: &str = "template.html";

/// Folder under the report directory holding persisted artifacts
pub const IMAGES_FOLDER: &str = "images";

/// Name of the rendered report
pub const REPORT_FILE: &str = "report.html";

/// Name of the optional JUnit output
pub const JUNIT_FILE: &str = "junit.xml";

/// Where and how the report is written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfiguration {
    /// Root directory for all report output
    pub output_directory: PathBuf,
    /// Subfolder of `output_directory` this report is written to
    pub report_name: String,
    /// Directory the template is read from
    pub template_directory: PathBuf,
    /// Template file inside `template_directory`
    pub template_name: String,
    /// Persist and list passing cases too
    pub display_successes: bool,
    /// Copy reference images into the report instead of linking the original
    pub copy_reference_images: bool,
    /// Also write `junit.xml` next to the report
    pub write_junit: bool,
    /// Template renderer
    #[serde(skip, default = "default_view")]
    pub report_view: Arc<dyn ReportView>,
}

fn default_view() -> Arc<dyn ReportView> {
    Arc::new(MustacheView::new())
}

impl Default for ReportConfiguration {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from(DEFAULT_OUTPUT_DIRECTORY),
            report_name: DEFAULT_REPORT_NAME.to_string(),
            template_directory: PathBuf::from(DEFAULT_TEMPLATE_DIRECTORY),
            template_name: DEFAULT_TEMPLATE_NAME.to_string(),
            display_successes: true,
            copy_reference_images: true,
            write_junit: false,
            report_view: default_view(),
        }
    }
}

impl ReportConfiguration {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output directory
    #[must_use]
    pub fn with_output_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_directory = dir.into();
        self
    }

    /// Set the report name
    #[must_use]
    pub fn with_report_name(mut self, name: impl Into<String>) -> Self {
        self.report_name = name.into();
        self
    }

    /// Set the template directory
    #[must_use]
    pub fn with_template_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_directory = dir.into();
        self
    }

    /// Set the template file name
    #[must_use]
    pub fn with_template_name(mut self, name: impl Into<String>) -> Self {
        self.template_name = name.into();
        self
    }

    /// Persist and list passing cases
    #[must_use]
    pub const fn with_display_successes(mut self, display: bool) -> Self {
        self.display_successes = display;
        self
    }

    /// Copy reference images instead of linking them
    #[must_use]
    pub const fn with_copy_reference_images(mut self, copy: bool) -> Self {
        self.copy_reference_images = copy;
        self
    }

    /// Write JUnit XML alongside the report
    #[must_use]
    pub const fn with_junit(mut self, write: bool) -> Self {
        self.write_junit = write;
        self
    }

    /// Set the template renderer
    #[must_use]
    pub fn with_report_view(mut self, view: Arc<dyn ReportView>) -> Self {
        self.report_view = view;
        self
    }

    /// `{output_directory}/{report_name}`
    #[must_use]
    pub fn report_directory(&self) -> PathBuf {
        self.output_directory.join(&self.report_name)
    }

    /// `{output_directory}/{report_name}/images`
    #[must_use]
    pub fn images_directory(&self) -> PathBuf {
        self.report_directory().join(IMAGES_FOLDER)
    }

    /// `{output_directory}/{report_name}/report.html`
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.report_directory().join(REPORT_FILE)
    }

    /// `{output_directory}/{report_name}/junit.xml`
    #[must_use]
    pub fn junit_path(&self) -> PathBuf {
        self.report_directory().join(JUNIT_FILE)
    }

    /// `{template_directory}/{template_name}`
    #[must_use]
    pub fn template_path(&self) -> PathBuf {
        self.template_directory.join(&self.template_name)
    }

    /// Whether a result with this outcome gets artifacts and a report row
    #[must_use]
    pub const fn includes(&self, test_passed: bool) -> bool {
        !test_passed || self.display_successes
    }
}
