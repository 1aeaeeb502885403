use std::{
    io::Write,
    time::{Duration, Instant},
};

use log::{error, info, warn};
use postgres::Transaction;

use crate::{
    config::LoaderConfig,
    dataset::Dataset,
    errors::{DatasetError, LoaderError},
    utils::lib_postgres::{connect_with_retry, quote_ident, Session},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadReport {
    pub rows: u64,
    pub elapsed: Duration,
}

/// Terminal state of a run.
#[derive(Debug)]
pub enum Outcome {
    Committed(LoadReport),
    /// A session was open and the transaction was rolled back.
    RolledBack(LoaderError),
    /// The run stopped before a session existed.
    Failed(LoaderError),
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }
}

/// Loads the height/weight dataset into a PostgreSQL table.
pub struct PostgresLoader {
    pub config: LoaderConfig,
}

impl PostgresLoader {
    pub fn new(config: LoaderConfig) -> Self {
        PostgresLoader { config }
    }

    /// Open a session, retrying connection failures with linear backoff.
    pub fn connect(&self) -> Result<Session, LoaderError> {
        connect_with_retry(
            &self.config.pg_config(),
            self.config.connect_attempts,
            self.config.retry_base,
        )
        .map_err(LoaderError::Connection)
    }

    pub fn download_dataset(&self) -> Result<Dataset, DatasetError> {
        Dataset::download(&self.config.dataset_url, self.config.dataset_has_header)
    }

    /// Create the table and its indexes if they don't exist.  Does not commit.
    pub fn ensure_schema(&self, transaction: &mut Transaction<'_>) -> Result<(), LoaderError> {
        transaction
            .batch_execute(&self.create_table_sql())
            .map_err(LoaderError::Schema)
    }

    /// Stream the rows into `(height, weight)` with `COPY`, leaving the id and
    /// timestamps to their defaults.  Returns the number of rows copied.
    /// Does not commit.
    pub fn bulk_insert(
        &self,
        transaction: &mut Transaction<'_>,
        dataset: &Dataset,
    ) -> Result<u64, LoaderError> {
        let payload = dataset
            .to_tsv()
            .map_err(|e| LoaderError::BulkInsert(e.to_string()))?;
        self.copy_tsv(transaction, &payload)
    }

    fn copy_tsv(&self, transaction: &mut Transaction<'_>, payload: &[u8]) -> Result<u64, LoaderError> {
        let sql = self.copy_sql();
        let mut writer = transaction
            .copy_in(sql.as_str())
            .map_err(|e| LoaderError::BulkInsert(e.to_string()))?;
        writer
            .write_all(payload)
            .map_err(|e| LoaderError::BulkInsert(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| LoaderError::BulkInsert(e.to_string()))
    }

    /// Download, then load.  See [`PostgresLoader::load`].
    pub fn run(&self) -> Outcome {
        let start = Instant::now();
        let dataset = match self.download_dataset() {
            Ok(dataset) => dataset,
            Err(e) => return Outcome::Failed(e.into()),
        };
        self.load(&dataset, start)
    }

    /// Create the schema and copy the rows in a single transaction.  Commits
    /// only if everything succeeded.  The session is released on return.
    pub fn load(&self, dataset: &Dataset, start: Instant) -> Outcome {
        let mut session = match self.connect() {
            Ok(session) => session,
            Err(e) => return Outcome::Failed(e),
        };
        let mut transaction = match session.transaction() {
            Ok(transaction) => transaction,
            Err(e) => return Outcome::RolledBack(LoaderError::Transaction(e)),
        };

        let result = self
            .ensure_schema(&mut transaction)
            .and_then(|_| self.bulk_insert(&mut transaction, dataset));
        match result {
            Ok(rows) => match transaction.commit() {
                Ok(()) => Outcome::Committed(LoadReport {
                    rows,
                    elapsed: start.elapsed(),
                }),
                Err(e) => Outcome::RolledBack(LoaderError::Transaction(e)),
            },
            Err(e) => {
                if let Err(rb) = transaction.rollback() {
                    warn!("Rollback failed: {}", rb);
                }
                Outcome::RolledBack(e)
            }
        }
    }

    /// The whole workflow.  Returns `true` if the rows were committed.
    pub fn load_data(&self) -> bool {
        match self.run() {
            Outcome::Committed(report) => {
                info!(
                    "Successfully loaded {} rows in {:.2} seconds",
                    report.rows,
                    report.elapsed.as_secs_f64()
                );
                true
            }
            Outcome::RolledBack(LoaderError::BulkInsert(msg)) => {
                error!("Bulk insert failed: {}", msg);
                false
            }
            Outcome::RolledBack(e) | Outcome::Failed(e) => {
                error!("Data loading failed: {}", e);
                false
            }
        }
    }

    /// Open a connection and close it right away.  No schema or data changes.
    pub fn health_check(&self) -> bool {
        match self.connect() {
            Ok(session) => {
                drop(session);
                println!("Database connection healthy");
                true
            }
            Err(e) => {
                println!("Database connection failed: {}", e);
                false
            }
        }
    }

    fn create_table_sql(&self) -> String {
        let name = &self.config.table_name;
        let table = quote_ident(name);
        format!(
            r"
CREATE TABLE IF NOT EXISTS {table} (
    id SERIAL PRIMARY KEY,
    height FLOAT NOT NULL,
    weight FLOAT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS {height_idx} ON {table} (height);
CREATE INDEX IF NOT EXISTS {weight_idx} ON {table} (weight);
",
            height_idx = quote_ident(&format!("idx_{}_height", name)),
            weight_idx = quote_ident(&format!("idx_{}_weight", name)),
        )
    }

    fn copy_sql(&self) -> String {
        format!(
            "COPY {} (height, weight) FROM STDIN WITH (FORMAT text, DELIMITER E'\\t', NULL '')",
            quote_ident(&self.config.table_name)
        )
    }
}
