//! Assembly of the vertically partitioned dataset into secret shares.
//!
//! Every party runs the same sequence of steps, whether it holds features, labels or nothing:
//! 0. each party checks that its data belongs to a side it may send and announces the result,
//! 1. the sample counts of both sides and the covariate counts are agreed on,
//! 2. each party shapes its submission to the agreed dimensions, padding with placeholders,
//! 3. all blocks are shared from their designated senders.
pub mod adapter;
pub mod agreement;
pub mod exchange;
pub mod placeholder;
pub mod roles;

pub use exchange::{AssembledDataset, SharedMatrix};

use crate::error::{SessionError, Side};
use crate::party::MainParty;
use crate::protocols::confirm;

use adapter::EncodedInput;
use agreement::{agree_lengths, agree_widths};
use placeholder::synthesize;
use roles::RoleAssignment;

/// Assembles the shared dataset from the encoded local data of `party`.
///
/// A party holding data for a side it is not authorized for stops all parties before its
/// sample count is shared.
pub fn assemble(
    party: &mut MainParty,
    roles: &RoleAssignment,
    encoded: EncodedInput,
) -> Result<AssembledDataset, SessionError> {
    confirm(party, roles.check_side(party.i, encoded.side()))?;
    let (local_features, local_labels) = match &encoded {
        EncodedInput::Features { rows, .. } => (*rows, 0),
        EncodedInput::Labels(labels) => (0, labels.len()),
        EncodedInput::Nothing => (0, 0),
    };
    let lengths = agree_lengths(party, local_features, local_labels)?;
    let widths = agree_widths(party, roles, encoded.width())?;

    let synthesized = synthesize(party.i, roles, &lengths, &widths, encoded);
    let synthesized = confirm(party, synthesized)?;

    if lengths.features != lengths.labels {
        return Err(SessionError::LengthMismatch {
            party: None,
            side: Side::Labels,
            expected: lengths.features,
            actual: lengths.labels,
        });
    }
    exchange::exchange(party, roles, &synthesized)
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use crate::error::{SessionError, Side};
    use crate::party::test_export::localhost_setup;
    use crate::party::MainParty;
    use crate::protocols::open;
    use crate::share::fixed::decode;
    use crate::share::z64::Z64;

    use super::adapter::{adapt, EncodedInput};
    use super::assemble;
    use super::roles::{FeatureBlock, LocalDataset, RoleAssignment};

    type Opened = (usize, usize, Vec<f64>, Vec<f64>);

    fn assemble_and_open(p: &mut MainParty, data: LocalDataset) -> Result<Opened, SessionError> {
        assemble_with_roles(p, &RoleAssignment::default(), data)
    }

    fn assemble_with_roles(
        p: &mut MainParty,
        roles: &RoleAssignment,
        data: LocalDataset,
    ) -> Result<Opened, SessionError> {
        let encoded = adapt(p.i, &data)?;
        let assembled = assemble(p, roles, encoded)?;
        let x = open(p, assembled.features.data())?;
        let y = open(p, &assembled.labels)?;
        Ok((
            assembled.samples(),
            assembled.covariates(),
            x.into_iter().map(decode).collect(),
            y.into_iter().map(decode).collect(),
        ))
    }

    fn features() -> FeatureBlock {
        FeatureBlock::from_rows(vec![
            vec![1.0, 2.0],
            vec![3.0, 4.0],
            vec![5.0, 6.0],
            vec![7.0, 8.0],
        ])
        .unwrap()
    }

    #[test]
    fn two_senders_and_an_idle_party() {
        let (r1, r2, r3) = localhost_setup(
            |p| assemble_and_open(p, LocalDataset::Features(features())),
            |p| assemble_and_open(p, LocalDataset::Labels(vec![0.0, 1.0, 1.0, 0.0])),
            |p| assemble_and_open(p, LocalDataset::Nothing),
            None,
        );
        let expected = (
            4,
            2,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            vec![-1.0, 1.0, 1.0, -1.0],
        );
        assert_eq!(r1.unwrap(), expected);
        assert_eq!(r2.unwrap(), expected);
        assert_eq!(r3.unwrap(), expected);
    }

    #[test]
    fn feature_blocks_of_both_senders_are_concatenated() {
        let right = FeatureBlock::from_rows(vec![vec![-1.0], vec![-2.0], vec![-3.0], vec![-4.0]]).unwrap();
        let (r1, _, _) = localhost_setup(
            |p| assemble_and_open(p, LocalDataset::Features(features())),
            |p| assemble_and_open(p, LocalDataset::Labels(vec![1.0, 1.0, -1.0, -1.0])),
            move |p| assemble_and_open(p, LocalDataset::Features(right)),
            None,
        );
        let (rows, cols, x, _) = r1.unwrap();
        assert_eq!((rows, cols), (4, 3));
        assert_eq!(
            x,
            vec![1.0, 2.0, -1.0, 3.0, 4.0, -2.0, 5.0, 6.0, -3.0, 7.0, 8.0, -4.0]
        );
    }

    #[test]
    fn all_empty_assembles_to_empty_structures() {
        let run = |p: &mut MainParty| assemble_and_open(p, LocalDataset::Nothing);
        let (r1, r2, r3) = localhost_setup(run, run, run, None);
        for r in [r1, r2, r3] {
            assert_eq!(r.unwrap(), (0, 0, vec![], vec![]));
        }
    }

    #[test]
    fn side_length_disagreement_fails_everywhere() {
        let (r1, r2, r3) = localhost_setup(
            |p| assemble_and_open(p, LocalDataset::Features(features())),
            |p| assemble_and_open(p, LocalDataset::Labels(vec![1.0, -1.0, 1.0])),
            |p| assemble_and_open(p, LocalDataset::Nothing),
            None,
        );
        for r in [r1, r2, r3] {
            assert!(matches!(
                r,
                Err(SessionError::LengthMismatch {
                    party: None,
                    side: Side::Labels,
                    expected: 4,
                    actual: 3
                })
            ));
        }
    }

    #[test]
    fn inconsistent_local_data_aborts_the_peers() {
        let roles = RoleAssignment::default();
        let (r1, r2, r3) = localhost_setup(
            |p| assemble_and_open(p, LocalDataset::Features(features())),
            |p| assemble_and_open(p, LocalDataset::Labels(vec![1.0, -1.0, 1.0, 1.0])),
            move |p| {
                // two rows announced, but the columns are shorter
                let encoded = EncodedInput::Features {
                    rows: 2,
                    columns: vec![vec![Z64(1)]],
                };
                assemble(p, &roles, encoded).map(|_| ())
            },
            None,
        );
        assert!(matches!(
            r3,
            Err(SessionError::LengthMismatch {
                party: Some(2),
                side: Side::Features,
                expected: 4,
                actual: 1
            })
        ));
        assert!(matches!(r1, Err(SessionError::SessionAborted { party: Some(2) })));
        assert!(matches!(r2, Err(SessionError::SessionAborted { party: Some(2) })));
    }

    #[rstest]
    #[case(4)]
    #[case(6)]
    fn party_without_role_cannot_contribute(#[case] rows: usize) {
        let roles = RoleAssignment::new([0], 1).unwrap();
        let column = |n: usize| (0..n).map(|v| vec![v as f64]).collect::<Vec<_>>();
        let (r1, r2, r3) = localhost_setup(
            |p| {
                let data = LocalDataset::Features(FeatureBlock::from_rows(column(4)).unwrap());
                assemble_with_roles(p, &roles, data)
            },
            |p| assemble_with_roles(p, &roles, LocalDataset::Labels(vec![0.0, 1.0, 1.0, 0.0])),
            |p| {
                let data = LocalDataset::Features(FeatureBlock::from_rows(column(rows)).unwrap());
                assemble_with_roles(p, &roles, data)
            },
            None,
        );
        assert!(matches!(
            r3,
            Err(SessionError::RoleViolation {
                party: 2,
                side: Side::Features
            })
        ));
        assert!(matches!(r1, Err(SessionError::SessionAborted { party: Some(2) })));
        assert!(matches!(r2, Err(SessionError::SessionAborted { party: Some(2) })));
    }
}
