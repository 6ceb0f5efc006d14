//! Result aggregation and HTML reporting.
//!
//! Output layout:
//!
//! ```text
//! {output_directory}/{report_name}/
//! ├── images/{test_id}-{uuid}-{generated|diff|reference}.{png|jpg|gif}
//! ├── report.html
//! └── junit.xml      (optional)
//! ```

mod config;
mod entry;
mod service;
mod view;

pub use config::{
    ReportConfiguration, DEFAULT_OUTPUT_DIRECTORY, DEFAULT_REPORT_NAME,
    DEFAULT_TEMPLATE_DIRECTORY, DEFAULT_TEMPLATE_NAME, IMAGES_FOLDER, JUNIT_FILE, REPORT_FILE,
};
pub use entry::{make_uri, PersistedPaths, ReportEntry};
pub use service::{generate_report, ReportService, ReportSummary};
pub use view::{MustacheView, ReportView};

/// HTML template shipped with the library
pub const DEFAULT_TEMPLATE: &str = include_str!("template.html");
