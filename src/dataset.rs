use std::io::Read;

use log::{error, info};
use serde::Serialize;

use crate::errors::DatasetError;

/// One row of the height/weight dataset.  The source index column is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurement {
    pub height: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<Measurement>,
}

impl From<Vec<Measurement>> for Dataset {
    fn from(rows: Vec<Measurement>) -> Self {
        Dataset { rows }
    }
}

impl Dataset {
    pub fn rows(&self) -> &[Measurement] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse a comma separated source with three columns: index, height, weight.
    /// Surrounding whitespace is ignored.  Any malformed line fails the whole
    /// read.
    pub fn from_reader<R: Read>(rdr: R, has_header: bool) -> Result<Dataset, DatasetError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(has_header)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);

        let mut rows: Vec<Measurement> = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line());
            if record.len() != 3 {
                return Err(DatasetError::ColumnCount {
                    line,
                    found: record.len(),
                });
            }
            rows.push(Measurement {
                height: parse_float(&record[1], line, "height")?,
                weight: parse_float(&record[2], line, "weight")?,
            });
        }
        Ok(Dataset { rows })
    }

    /// Fetch the dataset from `url` with a blocking GET.  Errors are logged
    /// and returned; no partial dataset is ever produced.
    pub fn download(url: &str, has_header: bool) -> Result<Dataset, DatasetError> {
        match Self::fetch(url, has_header) {
            Ok(dataset) => {
                info!("Downloaded dataset with {} rows", dataset.len());
                Ok(dataset)
            }
            Err(e) => {
                error!("Failed to download dataset: {}", e);
                Err(e)
            }
        }
    }

    fn fetch(url: &str, has_header: bool) -> Result<Dataset, DatasetError> {
        let response = reqwest::blocking::get(url)?;
        if !response.status().is_success() {
            return Err(DatasetError::Status(response.status()));
        }
        Dataset::from_reader(response, has_header)
    }

    /// Encode the rows in PostgreSQL `COPY` text format: tab separated
    /// `height, weight`, one row per line, no header.  A missing value would be
    /// written as an empty string, which the `COPY` statement maps to NULL.
    pub fn to_tsv(&self) -> Result<Vec<u8>, csv::Error> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(Vec::with_capacity(self.rows.len() * 16));
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        wtr.into_inner().map_err(|e| e.into_error().into())
    }
}

/// Missing markers such as `NaN` are not values, and neither are infinities.
fn parse_float(value: &str, line: u64, column: &'static str) -> Result<f64, DatasetError> {
    match value.parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => Err(DatasetError::Float {
            line,
            column,
            value: value.to_string(),
        }),
    }
}
