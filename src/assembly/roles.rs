//! Static role assignment and the local data of a party.
use serde::Serialize;
use thiserror::Error;

use crate::error::{SessionError, Side};

/// Number of parties of a session.
pub const N_PARTIES: usize = 3;

/// Which parties may contribute feature columns and which party contributes the labels.
///
/// Fixed before the session starts and identical on all parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleAssignment {
    feature_senders: Vec<usize>,
    label_sender: usize,
}

impl RoleAssignment {
    /// Feature senders are sorted and deduplicated, this is the column order of the assembled
    /// matrix. The label sender must not be a feature sender.
    pub fn new(
        feature_senders: impl IntoIterator<Item = usize>,
        label_sender: usize,
    ) -> Result<Self, SessionError> {
        let mut feature_senders: Vec<usize> = feature_senders.into_iter().collect();
        feature_senders.sort_unstable();
        feature_senders.dedup();
        if feature_senders.is_empty() {
            return Err(SessionError::InvalidRoleAssignment(
                "at least one feature sender is required".to_string(),
            ));
        }
        if let Some(i) = feature_senders
            .iter()
            .chain([&label_sender])
            .find(|i| **i >= N_PARTIES)
        {
            return Err(SessionError::InvalidRoleAssignment(format!(
                "party index {} is out of range 0..{}",
                i, N_PARTIES
            )));
        }
        if feature_senders.contains(&label_sender) {
            return Err(SessionError::InvalidRoleAssignment(format!(
                "P{} cannot send both features and labels",
                label_sender
            )));
        }
        Ok(Self {
            feature_senders,
            label_sender,
        })
    }

    pub fn feature_senders(&self) -> &[usize] {
        &self.feature_senders
    }

    pub fn label_sender(&self) -> usize {
        self.label_sender
    }

    pub fn role_of(&self, party: usize) -> Role {
        if self.feature_senders.contains(&party) {
            Role::FeatureSender
        } else if self.label_sender == party {
            Role::LabelSender
        } else {
            Role::Neither
        }
    }

    /// True if `party` may contribute real values for `side`.
    pub fn authorizes(&self, party: usize, side: Side) -> bool {
        match side {
            Side::Features => self.feature_senders.contains(&party),
            Side::Labels => self.label_sender == party,
        }
    }

    /// Fails with [SessionError::RoleViolation] if `party` holds data for a side it may not send.
    pub fn check_side(&self, party: usize, side: Option<Side>) -> Result<(), SessionError> {
        match side {
            Some(side) if !self.authorizes(party, side) => {
                Err(SessionError::RoleViolation { party, side })
            }
            _ => Ok(()),
        }
    }

    pub fn check_dataset(&self, party: usize, data: &LocalDataset) -> Result<(), SessionError> {
        self.check_side(party, data.side())
    }
}

impl Default for RoleAssignment {
    fn default() -> Self {
        Self {
            feature_senders: vec![0, 2],
            label_sender: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    FeatureSender,
    LabelSender,
    Neither,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{len} values do not form rows of {cols} columns")]
pub struct ShapeError {
    pub len: usize,
    pub cols: usize,
}

/// A rectangular block of feature values, one row per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBlock {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl FeatureBlock {
    /// Creates a block from row-major `values`.
    pub fn new(cols: usize, values: Vec<f64>) -> Result<Self, ShapeError> {
        if (cols == 0 && !values.is_empty()) || (cols > 0 && values.len() % cols != 0) {
            return Err(ShapeError {
                len: values.len(),
                cols,
            });
        }
        let rows = if cols == 0 { 0 } else { values.len() / cols };
        Ok(Self { rows, cols, values })
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ShapeError> {
        let cols = rows.first().map(|row| row.len()).unwrap_or(0);
        let len = rows.iter().map(|row| row.len()).sum();
        if rows.iter().any(|row| row.len() != cols) {
            return Err(ShapeError { len, cols });
        }
        Self::new(cols, rows.concat())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.cols..(row + 1) * self.cols]
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().skip(col).step_by(self.cols.max(1)).copied()
    }
}

/// The private plaintext data of a party. A party never holds both sides.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalDataset {
    Features(FeatureBlock),
    Labels(Vec<f64>),
    Nothing,
}

impl LocalDataset {
    pub fn side(&self) -> Option<Side> {
        match self {
            Self::Features(_) => Some(Side::Features),
            Self::Labels(_) => Some(Side::Labels),
            Self::Nothing => None,
        }
    }

    /// The local number of samples.
    pub fn len(&self) -> usize {
        match self {
            Self::Features(block) => block.rows(),
            Self::Labels(labels) => labels.len(),
            Self::Nothing => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use crate::error::{SessionError, Side};

    use super::{FeatureBlock, LocalDataset, Role, RoleAssignment, ShapeError};

    #[test]
    fn default_roles() {
        let roles = RoleAssignment::default();
        assert_eq!(roles, RoleAssignment::new([2, 0], 1).unwrap());
        assert_eq!(roles.role_of(0), Role::FeatureSender);
        assert_eq!(roles.role_of(1), Role::LabelSender);
        assert_eq!(roles.role_of(2), Role::FeatureSender);
    }

    #[test]
    fn senders_are_sorted_and_deduplicated() {
        let roles = RoleAssignment::new([2, 0, 2], 1).unwrap();
        assert_eq!(roles.feature_senders(), &[0, 2]);
        let roles = RoleAssignment::new([1], 0).unwrap();
        assert_eq!(roles.role_of(2), Role::Neither);
    }

    #[test]
    fn invalid_assignments() {
        for (senders, label) in [(vec![0, 1], 1), (vec![0, 3], 1), (vec![0], 5), (vec![], 1)] {
            assert!(matches!(
                RoleAssignment::new(senders, label),
                Err(SessionError::InvalidRoleAssignment(_))
            ));
        }
    }

    #[test]
    fn dataset_must_match_role() {
        let roles = RoleAssignment::default();
        let features = LocalDataset::Features(FeatureBlock::new(1, vec![1.0]).unwrap());
        let labels = LocalDataset::Labels(vec![1.0]);
        assert!(roles.check_dataset(0, &features).is_ok());
        assert!(roles.check_dataset(1, &labels).is_ok());
        assert!(roles.check_dataset(1, &LocalDataset::Nothing).is_ok());
        assert!(matches!(
            roles.check_dataset(1, &features),
            Err(SessionError::RoleViolation { party: 1, side: Side::Features })
        ));
        assert!(matches!(
            roles.check_dataset(2, &labels),
            Err(SessionError::RoleViolation { party: 2, side: Side::Labels })
        ));
    }

    #[test]
    fn feature_block_shape() {
        let block = FeatureBlock::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!((block.rows(), block.cols()), (3, 2));
        assert_eq!(block.row(1), &[3.0, 4.0]);
        assert_eq!(block.column(1).collect::<Vec<_>>(), vec![2.0, 4.0, 6.0]);
        assert_eq!(block.get(2, 0), 5.0);
        assert_eq!(
            FeatureBlock::from_rows(vec![vec![1.0, 2.0], vec![3.0]]),
            Err(ShapeError { len: 3, cols: 2 })
        );
        assert_eq!(FeatureBlock::new(0, vec![]).unwrap().rows(), 0);
        assert!(FeatureBlock::new(2, vec![1.0]).is_err());
    }
}
