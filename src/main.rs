use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracker_import::config::LogFormat;
use tracker_import::domain::model::{JobReport, RunStatus};
use tracker_import::utils::error::ErrorSeverity;
use tracker_import::utils::{logger, validation::Validate};
use tracker_import::{app, CancellationFlag, CliArgs, ImportConfig, ImportError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    match args.log_format {
        LogFormat::Text => logger::init_cli_logger(args.verbose),
        LogFormat::Json => logger::init_json_logger(args.verbose),
    }

    tracing::info!("Loading configuration from {}", args.config);
    let config = ImportConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    if let Err(e) = config.validate() {
        fail(&e);
    }

    if args.dry_run {
        print_plan(&config, &args);
        return Ok(());
    }

    let cancel = CancellationFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping after the current record");
                cancel.cancel();
            }
        });
    }

    match app::run_import(Arc::new(config), &args.kinds, &cancel).await {
        Ok(report) => {
            print_report(&report);
            let exit_code = match report.status() {
                RunStatus::Succeeded => 0,
                RunStatus::PartiallyFailed => 2,
                RunStatus::Cancelled => 130,
                RunStatus::Aborted => 1,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
        Err(e) => fail(&e),
    }

    Ok(())
}

fn fail(e: &ImportError) -> ! {
    tracing::error!("{} (severity {:?})", e, e.severity());
    eprintln!("{}", e.user_friendly_message());
    eprintln!("Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}

fn print_plan(config: &ImportConfig, args: &CliArgs) {
    let kinds = if args.kinds.is_empty() {
        config.kinds()
    } else {
        args.kinds.clone()
    };
    println!("Project:        {}", config.project.id);
    println!(
        "Source project: {}",
        config.project.source_project_key.as_deref().unwrap_or("(none)")
    );
    println!(
        "Kinds:          {}",
        if kinds.is_empty() {
            "all".to_string()
        } else {
            kinds.join(", ")
        }
    );
    println!("Cache:          {:?} {}", config.cache.backend, config.cache_path());
    println!("Output:         {}", config.output.path);
}

fn print_report(report: &JobReport) {
    println!(
        "Import of {} into project {}: {:?}",
        report.source_project,
        report.project,
        report.status()
    );
    for run in &report.runs {
        println!(
            "  {:<8} {:?}: applied {}, skipped {}, discarded {}, failed {}",
            run.kind, run.status, run.applied, run.skipped, run.discarded, run.failed
        );
        if let Some(error) = &run.last_error {
            println!("           last error: {}", error);
        }
    }
}
