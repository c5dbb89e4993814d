//! Uniformly shaped submissions for the share exchange.
//!
//! Parties without data for a sender's block submit placeholders of the agreed shape. The
//! placeholder value is the additive identity, it is never transmitted by the input protocol.
use crate::error::{SessionError, Side};
use crate::share::z64::Z64;
use crate::share::HasZero;

use super::adapter::EncodedInput;
use super::agreement::AgreedLengths;
use super::roles::RoleAssignment;

/// A column-wise block of values that a party submits for one sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub columns: Vec<Vec<Z64>>,
    /// True if the values are the party's own data.
    pub real: bool,
}

impl Block {
    /// `width` columns of `len` neutral values.
    pub fn placeholder(len: usize, width: usize) -> Self {
        Self {
            columns: vec![vec![Z64::ZERO; len]; width],
            real: false,
        }
    }

    /// The party's own columns, which must have exactly the agreed length.
    pub fn pass_through(
        party: usize,
        side: Side,
        agreed_len: usize,
        columns: Vec<Vec<Z64>>,
    ) -> Result<Self, SessionError> {
        if let Some(column) = columns.iter().find(|c| c.len() != agreed_len) {
            return Err(SessionError::LengthMismatch {
                party: Some(party),
                side,
                expected: agreed_len,
                actual: column.len(),
            });
        }
        Ok(Self {
            columns,
            real: true,
        })
    }

    pub fn len(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// The values in column-major order.
    pub fn flatten(&self) -> Vec<Z64> {
        self.columns.concat()
    }
}

/// Everything a party submits: one block per feature sender and the labels as one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedInput {
    pub feature_blocks: Vec<Block>,
    pub labels: Block,
}

/// Builds the submissions of `party` for the agreed shape.
///
/// `widths` are the announced covariate counts of the feature senders. Data for a side that
/// `party` may not send is a [SessionError::RoleViolation].
pub fn synthesize(
    party: usize,
    roles: &RoleAssignment,
    lengths: &AgreedLengths,
    widths: &[usize],
    encoded: EncodedInput,
) -> Result<SynthesizedInput, SessionError> {
    debug_assert_eq!(widths.len(), roles.feature_senders().len());
    roles.check_side(party, encoded.side())?;
    let (mut own_columns, own_labels) = match encoded {
        EncodedInput::Features { columns, .. } => (Some(columns), None),
        EncodedInput::Labels(labels) => (None, Some(labels)),
        EncodedInput::Nothing => (None, None),
    };

    let mut feature_blocks = Vec::with_capacity(widths.len());
    for (&sender, &width) in roles.feature_senders().iter().zip(widths) {
        let block = if sender == party {
            // a feature sender without data contributes an empty block
            let columns = own_columns.take().unwrap_or_default();
            Block::pass_through(party, Side::Features, lengths.features, columns)?
        } else {
            Block::placeholder(lengths.features, width)
        };
        feature_blocks.push(block);
    }

    let labels = if roles.label_sender() == party {
        Block::pass_through(
            party,
            Side::Labels,
            lengths.labels,
            vec![own_labels.unwrap_or_default()],
        )?
    } else {
        Block::placeholder(lengths.labels, 1)
    };

    Ok(SynthesizedInput {
        feature_blocks,
        labels,
    })
}

#[cfg(test)]
mod test {
    use crate::assembly::adapter::EncodedInput;
    use crate::assembly::agreement::AgreedLengths;
    use crate::assembly::roles::RoleAssignment;
    use crate::error::{SessionError, Side};
    use crate::share::z64::Z64;
    use crate::share::HasZero;

    use super::{synthesize, Block};

    fn column(values: &[u64]) -> Vec<Z64> {
        values.iter().map(|v| Z64(*v)).collect()
    }

    #[test]
    fn every_submission_has_the_agreed_shape() {
        let roles = RoleAssignment::default();
        let lengths = AgreedLengths {
            features: 4,
            labels: 4,
        };
        let widths = [2, 0];
        let inputs = [
            EncodedInput::Features {
                rows: 4,
                columns: vec![column(&[1, 2, 3, 4]), column(&[5, 6, 7, 8])],
            },
            EncodedInput::Labels(column(&[1, 2, 3, 4])),
            EncodedInput::Nothing,
        ];
        for (party, input) in inputs.into_iter().enumerate() {
            let s = synthesize(party, &roles, &lengths, &widths, input).unwrap();
            assert_eq!(s.feature_blocks.len(), 2);
            assert_eq!(s.feature_blocks[0].width(), 2);
            assert_eq!(s.feature_blocks[0].len(), 4);
            assert_eq!(s.feature_blocks[0].real, party == 0);
            assert_eq!(s.feature_blocks[1].width(), 0);
            assert_eq!(s.feature_blocks[1].real, party == 2);
            assert_eq!(s.labels.width(), 1);
            assert_eq!(s.labels.len(), 4);
            assert_eq!(s.labels.real, party == 1);
        }
    }

    #[test]
    fn placeholders_are_neutral() {
        let block = Block::placeholder(3, 2);
        assert_eq!(block.flatten(), vec![Z64::ZERO; 6]);
        assert!(!block.real);
    }

    #[test]
    fn short_local_data_is_a_mismatch() {
        let roles = RoleAssignment::default();
        let lengths = AgreedLengths {
            features: 5,
            labels: 5,
        };
        let res = synthesize(
            1,
            &roles,
            &lengths,
            &[1, 1],
            EncodedInput::Labels(column(&[1, 2, 3])),
        );
        assert!(matches!(
            res,
            Err(SessionError::LengthMismatch {
                party: Some(1),
                side: Side::Labels,
                expected: 5,
                actual: 3
            })
        ));
    }

    #[test]
    fn data_of_another_role_is_a_violation() {
        let roles = RoleAssignment::default();
        let lengths = AgreedLengths {
            features: 2,
            labels: 2,
        };
        let labels = || EncodedInput::Labels(column(&[1, 2]));
        for party in [0, 2] {
            assert!(matches!(
                synthesize(party, &roles, &lengths, &[0, 0], labels()),
                Err(SessionError::RoleViolation { party: p, side: Side::Labels }) if p == party
            ));
        }
        let features = EncodedInput::Features {
            rows: 2,
            columns: vec![column(&[1, 2])],
        };
        assert!(matches!(
            synthesize(1, &roles, &lengths, &[0, 0], features),
            Err(SessionError::RoleViolation {
                party: 1,
                side: Side::Features
            })
        ));
    }

    #[test]
    fn label_sender_without_labels_only_matches_empty_side() {
        let roles = RoleAssignment::default();
        let lengths = AgreedLengths {
            features: 0,
            labels: 0,
        };
        let s = synthesize(1, &roles, &lengths, &[0, 0], EncodedInput::Nothing).unwrap();
        assert!(s.labels.real);
        assert!(s.labels.is_empty());
    }
}
