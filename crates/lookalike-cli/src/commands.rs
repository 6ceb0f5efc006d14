//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use lookalike::report::DEFAULT_TEMPLATE_DIRECTORY;
use std::path::PathBuf;

/// Lookalike: run visual regression manifests and publish HTML reports
#[derive(Parser, Debug)]
#[command(name = "lookalike")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the visual regression cases of a manifest and write the report
    Run(RunArgs),

    /// Write the default report template
    Init(InitArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Manifest listing the cases (JSON, or YAML by .yaml/.yml extension)
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Root directory for report output
    #[arg(short, long, env = "LOOKALIKE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report subfolder name
    #[arg(long)]
    pub report_name: Option<String>,

    /// Directory holding the report template
    #[arg(long, env = "LOOKALIKE_TEMPLATE_DIR")]
    pub template_dir: Option<PathBuf>,

    /// Leave passing cases out of the report
    #[arg(long)]
    pub hide_successes: bool,

    /// Link reference images at their original location instead of copying them
    #[arg(long)]
    pub link_references: bool,

    /// Number of cases in flight (0 = auto-detect)
    #[arg(short = 'j', long, env = "LOOKALIKE_JOBS")]
    pub jobs: Option<usize>,

    /// Fraction of pixels (0.0-1.0) allowed to differ
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Per-pixel colour difference still treated as equal
    #[arg(long)]
    pub color_threshold: Option<u32>,

    /// Per-case time limit in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Also write junit.xml next to the report
    #[arg(long)]
    pub junit: bool,

    /// Summary output format
    #[arg(short, long, default_value = "text")]
    pub format: SummaryFormat,
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to write the template into
    #[arg(long, env = "LOOKALIKE_TEMPLATE_DIR", default_value = DEFAULT_TEMPLATE_DIRECTORY)]
    pub template_dir: PathBuf,

    /// Overwrite an existing template
    #[arg(long)]
    pub force: bool,
}

/// Summary output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SummaryFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON on stdout
    Json,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
