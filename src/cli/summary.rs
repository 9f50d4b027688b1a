use comfy_table::{Cell, Table};

use crate::cli::expand;
use crate::error::Result;
use crate::export::read_summary_file;
use crate::fmt::won;

/// Print the summary of a previously exported xlsx or csv file.
pub fn run(file: &str) -> Result<()> {
    let rows = read_summary_file(&expand(file))?;

    let mut table = Table::new();
    table.set_header(vec!["Mall", "Tax-exempt", "Taxable", "Total"]);
    for row in &rows {
        let y = &row.yearly_total;
        table.add_row(vec![
            Cell::new(&row.mall_name),
            Cell::new(won(y.tax_exempt)),
            Cell::new(won(y.taxable)),
            Cell::new(won(y.total)),
        ]);
    }
    println!("Summary\n{table}");
    Ok(())
}
