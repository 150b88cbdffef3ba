//! taq-import - main entry point

use clap::Parser;
use taq_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use taq_loader::exit_code::ExitCode;
use taq_loader::{schema, ChunkPlan, ChunkedLoader, Cli, LoaderError};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .output(LogOutput::Console)
        .include_targets(cli.verbose)
        .include_location(cli.verbose)
        .log_file_prefix("taq-import")
        .build();

    // Environment variables take precedence over flags
    let log_config = match log_config.clone().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring logging environment: {}", e);
            log_config
        }
    };

    // Keep the guard alive so file logs are flushed on exit
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        }
    };

    match execute(&cli).await {
        Ok(code) => code.into(),
        Err(e) => {
            error!(error = %e, "Import failed");
            eprintln!("Error: {}", e);
            ExitCode::Failure.into()
        }
    }
}

async fn execute(cli: &Cli) -> Result<ExitCode, LoaderError> {
    let config = cli.loader_config();
    let database_url = config.database_url.clone();
    let mut loader = ChunkedLoader::from_config(config)?;

    if cli.dry_run {
        let plan = loader.plan().await?;
        print_plan(&plan);
        return Ok(ExitCode::Success);
    }

    if cli.init_schema {
        info!("Applying schema migrations");
        schema::apply_migrations(&database_url).await?;
    }

    let report = loader.run().await?;
    println!("{}", report.render_summary());

    // The exit code reflects the load, not the report file
    if let Some(ref path) = cli.report_json {
        match report.write_json(path) {
            Ok(()) => info!(path = %path.display(), "Report written"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not write report");
                eprintln!("Warning: could not write report to {}: {}", path.display(), e);
            }
        }
    }

    report.check()?;
    Ok(ExitCode::for_status(report.status, cli.fail_on_partial))
}

fn print_plan(plan: &ChunkPlan) {
    println!("Source: {}", plan.layout.path.display());
    println!("Total lines: {}", plan.layout.total_lines);
    println!("Data lines: {}", plan.layout.data_lines);
    println!(
        "Chunks: {} (requested {})",
        plan.spans.len(),
        plan.requested_chunks
    );
    for span in &plan.spans {
        println!(
            "  chunk {}: {} ({} rows)",
            span.number(),
            span,
            span.line_count
        );
    }
}
