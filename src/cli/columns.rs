use crate::cli::expand;
use crate::error::Result;
use crate::extractor::get_column_headers;
use crate::options::ProcessingOptions;
use crate::settings::load_settings;
use crate::workbook::load_sheet;

pub fn run(file: &str, sheet: Option<String>, header_row: Option<usize>) -> Result<()> {
    let options = ProcessingOptions {
        sheet,
        header_row,
        ..Default::default()
    }
    .with_defaults(&load_settings());
    let loaded = load_sheet(&expand(file), options.sheet.as_deref())?;
    let headers = get_column_headers(&loaded.grid, &loaded.merges, &options)?;

    println!("{}", loaded.name);
    for (i, name) in headers.iter().enumerate() {
        println!("{:>3}  {name}", i + 1);
    }
    Ok(())
}
