use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::batch::{process_files, FileOutcome};
use crate::cli::{expand, OptionArgs};
use crate::error::{MalltaxError, Result};
use crate::export::{export_results, ExportFormat};
use crate::fmt::{won, year_month};
use crate::models::CalculationResult;
use crate::settings::{load_settings, Settings};

pub struct ProcessArgs {
    pub files: Vec<String>,
    pub options: OptionArgs,
    pub output: Option<String>,
    pub format: Option<ExportFormat>,
    pub no_export: bool,
    pub fail_fast: bool,
}

fn result_table(result: &CalculationResult) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Month", "Tax-exempt", "Taxable", "Total"]);
    for m in &result.monthly_totals {
        table.add_row(vec![
            Cell::new(year_month(m.year, m.month)),
            Cell::new(won(m.tax_exempt)),
            Cell::new(won(m.taxable)),
            Cell::new(won(m.total)),
        ]);
    }
    let y = &result.yearly_total;
    table.add_row(vec![
        Cell::new("TOTAL".bold()),
        Cell::new(won(y.tax_exempt).bold()),
        Cell::new(won(y.taxable).bold()),
        Cell::new(won(y.total).bold()),
    ]);
    table
}

fn print_outcome(outcome: &FileOutcome) {
    match &outcome.result {
        Ok(result) => {
            println!("{} {} ({})", "✓".green(), result.mall_name.bold(), outcome.path.display());
            if result.monthly_totals.is_empty() {
                println!("  {}", "No dated rows found.".yellow());
            } else {
                println!("{}", result_table(result));
            }
        }
        Err(e) => println!("{} {}: {}", "✗".red(), outcome.path.display(), e),
    }
}

fn output_path(output: Option<String>, format: ExportFormat, settings: &Settings) -> PathBuf {
    output.map(|o| expand(&o)).unwrap_or_else(|| {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        expand(&settings.output_dir).join(format!("malltax-{stamp}.{}", format.extension()))
    })
}

fn pick_format(explicit: Option<ExportFormat>, output: Option<&str>, settings: &Settings) -> ExportFormat {
    explicit
        .or_else(|| output.and_then(|o| ExportFormat::from_path(Path::new(o))))
        .unwrap_or(settings.default_format)
}

pub fn run(args: ProcessArgs) -> Result<()> {
    let settings = load_settings();
    let options = args.options.resolve(&settings)?;
    options.validate()?;

    let paths: Vec<PathBuf> = args.files.iter().map(|f| expand(f)).collect();
    let outcomes = process_files(&paths, &options, args.fail_fast);
    for outcome in &outcomes {
        print_outcome(outcome);
    }

    let results: Vec<CalculationResult> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok().cloned())
        .collect();
    let failed = outcomes.len() - results.len();

    if !args.no_export && !results.is_empty() {
        let format = pick_format(args.format, args.output.as_deref(), &settings);
        let path = output_path(args.output, format, &settings);
        export_results(&results, format, &path)?;
        println!("Wrote {}", path.display());
    }

    if failed > 0 {
        return Err(MalltaxError::BatchFailed {
            failed,
            total: paths.len(),
        });
    }
    Ok(())
}
