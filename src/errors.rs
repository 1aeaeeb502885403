use reqwest::StatusCode;
use thiserror::Error;

/// Failures while fetching or parsing the source dataset.  Never retried.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to fetch dataset: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("dataset request returned HTTP {0}")]
    Status(StatusCode),

    #[error("failed to read dataset: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: expected 3 columns (index, height, weight), found {found}")]
    ColumnCount { line: u64, found: usize },

    #[error("line {line}: cannot convert {column} value '{value}' to float")]
    Float {
        line: u64,
        column: &'static str,
        value: String,
    },
}

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("invalid value '{value}' for {key}")]
    Config { key: &'static str, value: String },

    #[error("database connection failed: {0}")]
    Connection(#[source] postgres::Error),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("schema creation failed: {0}")]
    Schema(#[source] postgres::Error),

    #[error("bulk insert failed: {0}")]
    BulkInsert(String),

    #[error("transaction failed: {0}")]
    Transaction(#[source] postgres::Error),
}
