mod aggregate;
mod batch;
mod cli;
mod columns;
mod dialect;
mod error;
mod export;
mod extractor;
mod fmt;
mod header;
mod merge;
mod models;
mod normalize;
mod options;
mod settings;
mod workbook;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_logging(verbose: bool) {
    let default = if verbose { "malltax=debug" } else { "malltax=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init { output_dir, force } => cli::init::run(output_dir, force),
        Commands::Process {
            files,
            options,
            output,
            format,
            no_export,
            fail_fast,
        } => cli::process::run(cli::process::ProcessArgs {
            files,
            options,
            output,
            format,
            no_export,
            fail_fast,
        }),
        Commands::Headers {
            file,
            sheet,
            scan_rows,
        } => cli::headers::run(&file, sheet.as_deref(), scan_rows),
        Commands::Columns {
            file,
            sheet,
            header_row,
        } => cli::columns::run(&file, sheet, header_row),
        Commands::Summary { file } => cli::summary::run(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
