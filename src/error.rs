use thiserror::Error;

#[derive(Error, Debug)]
pub enum MalltaxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("Export error: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported file: {0}")]
    UnsupportedFile(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Sheet is empty: {0}")]
    EmptySheet(String),

    #[error("Header row {row} is out of range (sheet has {rows} rows)")]
    HeaderRowOutOfRange { row: usize, rows: usize },

    #[error("Missing required options: {}", .0.join(", "))]
    MissingOptions(Vec<String>),

    #[error("Required columns not found: {} (available: {})", .missing.join(", "), .available.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("Multi-column sum selected but no amount columns were given")]
    NoAmountColumns,

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Day-only date without a year/month title: {0}")]
    MissingDateContext(String),

    #[error("{failed} of {total} files failed")]
    BatchFailed { failed: usize, total: usize },

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, MalltaxError>;
