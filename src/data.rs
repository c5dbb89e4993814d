//! Loading the local data of a party from headerless CSV files.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::assembly::roles::{FeatureBlock, LocalDataset, ShapeError};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("cannot read data: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}, field {field}: '{value}' is not a number")]
    NotANumber {
        line: u64,
        field: usize,
        value: String,
    },
    #[error("the response has {0} values in a line, expected 1")]
    ResponseWidth(usize),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

fn read_records<R: Read>(reader: R) -> Result<Vec<Vec<f64>>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row = record
            .iter()
            .enumerate()
            .map(|(field, value)| {
                value.parse::<f64>().map_err(|_| DataError::NotANumber {
                    line,
                    field,
                    value: value.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }
    Ok(rows)
}

/// Reads a table of covariates, one sample per line.
pub fn read_covariates<R: Read>(reader: R) -> Result<FeatureBlock, DataError> {
    Ok(FeatureBlock::from_rows(read_records(reader)?)?)
}

/// Reads the response, one label per line.
pub fn read_response<R: Read>(reader: R) -> Result<Vec<f64>, DataError> {
    read_records(reader)?
        .into_iter()
        .map(|row| match row[..] {
            [y] => Ok(y),
            _ => Err(DataError::ResponseWidth(row.len())),
        })
        .collect()
}

/// Loads the local dataset, a party passes at most one of the files.
pub fn load_local_dataset(
    covariates: Option<&Path>,
    response: Option<&Path>,
) -> Result<LocalDataset, DataError> {
    match (covariates, response) {
        (Some(path), _) => Ok(LocalDataset::Features(read_covariates(File::open(path)?)?)),
        (None, Some(path)) => Ok(LocalDataset::Labels(read_response(File::open(path)?)?)),
        (None, None) => Ok(LocalDataset::Nothing),
    }
}
