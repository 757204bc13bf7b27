use thiserror::Error;

/// Every fault the dashboard can report to its host.
///
/// None of these are fatal: the host reports the message and keeps the
/// session interactive. An empty filter result is not an error and has no
/// variant here.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Unsupported file format: {0}. Please upload a CSV file.")]
    UnsupportedFormat(String),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid value {value:?} in column {column:?} on row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Duplicate student ID: {0}")]
    DuplicateId(String),

    #[error("Participation breakdown not computable for course {0}: no participation records")]
    NotComputable(String),

    #[error("Course not found: {0}")]
    CourseNotFound(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rust_xlsxwriter::XlsxError> for DashboardError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        DashboardError::Export(format!("spreadsheet writer: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
