use comfy_table::{Cell, Table};

use crate::cli::expand;
use crate::dialect::HeaderSet;
use crate::error::Result;
use crate::header::{detect_header_row, detect_header_row_within};
use crate::merge::resolve_merges;
use crate::workbook::{load_sheet, sheet_names};

pub fn run(file: &str, sheet: Option<&str>, scan_rows: Option<usize>) -> Result<()> {
    let path = expand(file);
    let loaded = load_sheet(&path, sheet)?;
    let resolved = resolve_merges(&loaded.grid, &loaded.merges);
    let detection = match scan_rows {
        Some(rows) => detect_header_row_within(&resolved, Some(&loaded.name), rows),
        None => detect_header_row(&resolved, Some(&loaded.name)),
    };

    println!("Sheets:      {}", sheet_names(&path)?.join(", "));
    println!("Sheet:       {}", loaded.name);
    println!("Header row:  {}", detection.header_row);
    println!("Confidence:  {}", detection.confidence);
    if detection.is_multi_row() {
        let rows: Vec<String> = detection.header_rows().iter().map(usize::to_string).collect();
        println!("Header rows: {}", rows.join(", "));
    }
    match &detection.header_set {
        HeaderSet::Multi {
            dialect, confidence, ..
        } => println!("Dialect:     {} ({confidence})", dialect.key()),
        HeaderSet::Single(_) => println!("Dialect:     single_row"),
    }
    if !detection.reasons.is_empty() {
        println!("Reasons:     {}", detection.reasons.join(", "));
    }

    let mut table = Table::new();
    table.set_header(vec!["Row", "Score", "Reasons"]);
    for c in &detection.candidates {
        table.add_row(vec![
            Cell::new(c.row),
            Cell::new(c.score),
            Cell::new(c.reasons.join(", ")),
        ]);
    }
    println!("Candidates\n{table}");
    Ok(())
}
