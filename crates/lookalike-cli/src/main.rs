//! Lookalike CLI: visual regression runs from the command line
//!
//! ## Usage
//!
//! ```bash
//! lookalike init                              # Write templates/template.html
//! lookalike run --manifest cases.yml          # Run cases, write target/lookalike/report
//! lookalike run -m cases.json --hide-successes --junit
//! ```

use clap::Parser;
use lookalike_cli::{
    init_logging, write_default_template, Cli, CliConfig, CliResult, ColorChoice, Commands,
    InitArgs, ProgressReporter, RunArgs, RunPlan, SummaryFormat, Verbosity, VisualRunner,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    init_logging(&config)?;

    match cli.command {
        Commands::Run(args) => run_manifest(&config, &args),
        Commands::Init(args) => {
            run_init(&config, &args)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
        .with_log_json(cli.log_json)
}

fn run_manifest(config: &CliConfig, args: &RunArgs) -> CliResult<ExitCode> {
    let plan = RunPlan::load(args)?;
    tracing::info!(
        manifest = %args.manifest.display(),
        cases = plan.cases.len(),
        "running manifest"
    );

    let outcome = VisualRunner::new(config).run(plan)?;
    if args.format == SummaryFormat::Json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    Ok(if outcome.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_init(config: &CliConfig, args: &InitArgs) -> CliResult<()> {
    let path = write_default_template(&args.template_dir, args.force)?;
    let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.success(&format!("Template written to {}", path.display()));
    Ok(())
}
