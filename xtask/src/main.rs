//! Build automation tasks for the TAQ importer
//!
//! Currently only regenerates the CLI reference from the clap definitions.

use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for taq-import", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the taq-import CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &Path) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<taq_loader::Cli>();

    let content = format!(
        r#"# taq-import CLI Reference

Auto-generated from the CLI source code. Last updated: {}.

## Overview

`taq-import` loads a NYSE Daily TAQ trade file into PostgreSQL. The header
line and the trailer line are skipped, the remaining lines are split into
contiguous chunks, and every chunk is bulk-copied by its own worker.

## Quick Start

```bash
# Create the taq_trades table and load a day of trades with 8 workers
taq-import --file EQY_US_ALL_TRADE_20240102 --init-schema \
  --database-url postgres://localhost/markets

# Show how the file would be split without loading anything
taq-import --file EQY_US_ALL_TRADE_20240102 --chunks 16 --dry-run

# Load with psql instead of the built-in COPY client
taq-import --file EQY_US_ALL_TRADE_20240102 --loader psql
```

## Exit Codes

| Code | Meaning |
|------|---------|
| 0 | Every chunk loaded, or some failed without `--fail-on-partial` |
| 1 | Fatal error, or every chunk failed |
| 2 | Some chunks failed and `--fail-on-partial` was given |

## Commands

{}

## Environment Variables

- `DATABASE_URL` - PostgreSQL connection URL
- `TAQ_CHUNKS`, `TAQ_TABLE`, `TAQ_LOADER`, `TAQ_WORK_DIR`, `PSQL_BIN` - defaults for the matching flags
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER` - logging

Variables may also be placed in a `.env` file in the working directory.

---

*To update, run `cargo run -p xtask -- generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    fs::create_dir_all(output_dir)?;

    let file_path = output_dir.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());
    Ok(())
}
