//! Secret sharing of the synthesized blocks, one designated sender at a time.
use crate::error::{SessionError, Side};
use crate::party::error::MpcError;
use crate::party::MainParty;
use crate::protocols::{input_from, Contribution};
use crate::share::z64::Z64;
use crate::share::{RssShare, RssShareVec};

use super::placeholder::{Block, SynthesizedInput};
use super::roles::RoleAssignment;

/// A secret-shared matrix in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedMatrix {
    rows: usize,
    cols: usize,
    data: RssShareVec<Z64>,
}

impl SharedMatrix {
    pub fn new(rows: usize, cols: usize, data: RssShareVec<Z64>) -> Self {
        debug_assert_eq!(rows * cols, data.len());
        Self { rows, cols, data }
    }

    /// Builds the matrix from column vectors that all have `rows` entries.
    pub fn from_columns(rows: usize, columns: &[RssShareVec<Z64>]) -> Self {
        let cols = columns.len();
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            data.extend(columns.iter().map(|column| column[r]));
        }
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> &RssShare<Z64> {
        &self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[RssShare<Z64>] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = &RssShare<Z64>> + '_ {
        self.data.iter().skip(col).step_by(self.cols.max(1))
    }

    pub fn data(&self) -> &[RssShare<Z64>] {
        &self.data
    }
}

/// The shared dataset as handed to the training.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDataset {
    pub features: SharedMatrix,
    pub labels: RssShareVec<Z64>,
}

impl AssembledDataset {
    pub fn samples(&self) -> usize {
        self.features.rows()
    }

    pub fn covariates(&self) -> usize {
        self.features.cols()
    }
}

fn share_block(
    party: &mut MainParty,
    sender: usize,
    side: Side,
    block: &Block,
) -> Result<Vec<RssShareVec<Z64>>, SessionError> {
    let values = block.flatten();
    let contribution = if block.real {
        Contribution::Real(&values)
    } else {
        Contribution::Placeholder(&values)
    };
    let shared = input_from(party, sender, contribution).map_err(|err| match err {
        MpcError::UnauthorizedInput { party, .. } => SessionError::RoleViolation { party, side },
        err => err.into(),
    })?;
    let len = block.len();
    Ok(if len == 0 {
        vec![Vec::new(); block.width()]
    } else {
        shared.chunks_exact(len).map(|c| c.to_vec()).collect()
    })
}

/// Shares every block from its designated sender.
///
/// All parties make the same calls in the same order: the feature senders in the order of the
/// role assignment, then the label sender.
pub fn exchange(
    party: &mut MainParty,
    roles: &RoleAssignment,
    input: &SynthesizedInput,
) -> Result<AssembledDataset, SessionError> {
    debug_assert_eq!(input.feature_blocks.len(), roles.feature_senders().len());
    // no share leaves the party if any of its blocks is unauthorized
    let blocks = roles
        .feature_senders()
        .iter()
        .zip(&input.feature_blocks)
        .map(|(sender, block)| (*sender, Side::Features, block))
        .chain([(roles.label_sender(), Side::Labels, &input.labels)]);
    for (sender, side, block) in blocks {
        if block.real && sender != party.i {
            return Err(SessionError::RoleViolation {
                party: party.i,
                side,
            });
        }
    }
    let rows = input.feature_blocks.first().map(|b| b.len()).unwrap_or(0);
    let mut columns = Vec::new();
    for (&sender, block) in roles.feature_senders().iter().zip(&input.feature_blocks) {
        columns.extend(share_block(party, sender, Side::Features, block)?);
    }
    let mut labels = share_block(party, roles.label_sender(), Side::Labels, &input.labels)?;
    let labels = labels.pop().unwrap_or_default();
    let features = SharedMatrix::from_columns(rows, &columns);
    log::info!(
        "P{}: assembled {}x{} features and {} labels",
        party.i,
        features.rows(),
        features.cols(),
        labels.len()
    );
    Ok(AssembledDataset { features, labels })
}

#[cfg(test)]
mod test {
    use crate::assembly::placeholder::{Block, SynthesizedInput};
    use crate::assembly::roles::RoleAssignment;
    use crate::party::test_export::localhost_setup;
    use crate::party::MainParty;
    use crate::protocols::open;
    use crate::share::z64::Z64;
    use crate::share::RssShare;

    use super::{exchange, SharedMatrix};

    fn column(values: &[u64]) -> Vec<Z64> {
        values.iter().map(|v| Z64(*v)).collect()
    }

    fn input_of(party: usize) -> SynthesizedInput {
        // P0 holds two columns, P2 one column, P1 the labels
        let p0 = Block {
            columns: vec![column(&[1, 2, 3]), column(&[4, 5, 6])],
            real: true,
        };
        let p2 = Block {
            columns: vec![column(&[7, 8, 9])],
            real: true,
        };
        let labels = Block {
            columns: vec![column(&[10, 11, 12])],
            real: true,
        };
        SynthesizedInput {
            feature_blocks: vec![
                if party == 0 { p0 } else { Block::placeholder(3, 2) },
                if party == 2 { p2 } else { Block::placeholder(3, 1) },
            ],
            labels: if party == 1 { labels } else { Block::placeholder(3, 1) },
        }
    }

    #[test]
    fn opened_dataset_is_sender_data_in_order() {
        let run = |p: &mut MainParty| {
            let roles = RoleAssignment::default();
            let input = input_of(p.i);
            let assembled = exchange(p, &roles, &input).unwrap();
            let x = open(p, assembled.features.data()).unwrap();
            let y = open(p, &assembled.labels).unwrap();
            (assembled.samples(), assembled.covariates(), x, y)
        };
        let (r1, r2, r3) = localhost_setup(run, run, run, None);
        let expected_x = column(&[1, 4, 7, 2, 5, 8, 3, 6, 9]);
        let expected_y = column(&[10, 11, 12]);
        for (rows, cols, x, y) in [r1, r2, r3] {
            assert_eq!((rows, cols), (3, 3));
            assert_eq!(x, expected_x);
            assert_eq!(y, expected_y);
        }
    }

    #[test]
    fn matrix_accessors() {
        let share = |values: &[u64]| -> Vec<RssShare<Z64>> {
            column(values).into_iter().map(|v| RssShare::from(v, v)).collect()
        };
        let (c0, c1) = (share(&[1, 2]), share(&[3, 4]));
        let m = SharedMatrix::from_columns(2, &[c0.clone(), c1.clone()]);
        assert_eq!((m.rows(), m.cols()), (2, 2));
        assert_eq!(m.row(1), &[c0[1], c1[1]]);
        assert_eq!(m.column(1).copied().collect::<Vec<_>>(), c1);
        assert_eq!(m.get(0, 1), &c1[0]);
        let empty = SharedMatrix::from_columns(0, &[Vec::new(), Vec::new()]);
        assert_eq!((empty.rows(), empty.cols()), (0, 2));
        assert_eq!(empty.column(0).count(), 0);
    }
}
