//! Conversion of local plaintext data into fixed-point ring elements.
use rayon::prelude::*;

use crate::error::{SessionError, Side};
use crate::share::fixed;
use crate::share::z64::Z64;

use super::roles::{FeatureBlock, LocalDataset};

/// A party's data encoded as ring elements, not yet shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedInput {
    /// One vector per covariate, each with one entry per sample.
    Features { rows: usize, columns: Vec<Vec<Z64>> },
    Labels(Vec<Z64>),
    Nothing,
}

impl EncodedInput {
    pub fn len(&self) -> usize {
        match self {
            Self::Features { rows, .. } => *rows,
            Self::Labels(labels) => labels.len(),
            Self::Nothing => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Self::Features { .. } => Some(Side::Features),
            Self::Labels(_) => Some(Side::Labels),
            Self::Nothing => None,
        }
    }

    /// Number of covariates, if the party holds features.
    pub fn width(&self) -> Option<usize> {
        match self {
            Self::Features { columns, .. } => Some(columns.len()),
            _ => None,
        }
    }
}

/// Maps labels from `{0, 1}` or `{-1, 1}` to `{-1, 1}`.
pub fn normalize_labels(party: usize, labels: &[f64]) -> Result<Vec<f64>, SessionError> {
    if let Some(value) = labels
        .iter()
        .find(|y| **y != 0.0 && **y != 1.0 && **y != -1.0)
    {
        return Err(SessionError::InvalidLabelDomain {
            party,
            value: *value,
        });
    }
    let has_zero = labels.iter().any(|y| *y == 0.0);
    if has_zero && labels.iter().any(|y| *y == -1.0) {
        // 0 and -1 together belong to neither domain
        return Err(SessionError::InvalidLabelDomain { party, value: -1.0 });
    }
    Ok(labels
        .iter()
        .map(|y| if *y == 0.0 { -1.0 } else { *y })
        .collect())
}

fn encode_labels(party: usize, labels: &[f64]) -> Result<Vec<Z64>, SessionError> {
    normalize_labels(party, labels)?
        .into_iter()
        .map(|y| {
            fixed::encode(y).map_err(|_| SessionError::InvalidLabelDomain { party, value: y })
        })
        .collect()
}

fn encode_features(party: usize, block: &FeatureBlock) -> Result<Vec<Vec<Z64>>, SessionError> {
    (0..block.cols())
        .into_par_iter()
        .map(|column| {
            block
                .column(column)
                .enumerate()
                .map(|(row, value)| {
                    fixed::encode(value).map_err(|_| SessionError::InvalidFeatureValue {
                        party,
                        row,
                        column,
                        value,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect()
}

/// Encodes the local data of `party`. Does not communicate.
pub fn adapt(party: usize, data: &LocalDataset) -> Result<EncodedInput, SessionError> {
    match data {
        LocalDataset::Features(block) => Ok(EncodedInput::Features {
            rows: block.rows(),
            columns: encode_features(party, block)?,
        }),
        LocalDataset::Labels(labels) => Ok(EncodedInput::Labels(encode_labels(party, labels)?)),
        LocalDataset::Nothing => Ok(EncodedInput::Nothing),
    }
}
