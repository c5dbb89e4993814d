//! Comparison and maximum of unsigned 64-bit integers in boolean sharing.
use crate::party::error::MpcResult;
use crate::party::MainParty;
use crate::share::bits64::Bits64;
use crate::share::{RssShare, RssShareVec};

use super::mul::mul;

fn add_constant(party: &MainParty, x: &[RssShare<Bits64>], c: Bits64) -> RssShareVec<Bits64> {
    let c = party.constant(c);
    x.iter().map(|x| *x + c).collect()
}

fn shr(x: &[RssShare<Bits64>], bits: u32) -> RssShareVec<Bits64> {
    x.iter()
        .map(|x| RssShare::from(x.si.shr(bits), x.sii.shr(bits)))
        .collect()
}

/// Computes `[a < b]` replicated into all 64 bits, i.e. a selection mask.
pub fn lt_mask(
    party: &mut MainParty,
    a: &[RssShare<Bits64>],
    b: &[RssShare<Bits64>],
) -> MpcResult<RssShareVec<Bits64>> {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    // bits where a and b are equal
    let a_xor_b: RssShareVec<Bits64> = a.iter().zip(b).map(|(a, b)| *a + *b).collect();
    let mut equal = add_constant(party, &a_xor_b, Bits64::ONES);
    let not_a = add_constant(party, a, Bits64::ONES);

    // the first step of the suffix-AND is batched with the computation of !a & b
    let high = Bits64(!(u64::MAX >> 1));
    let mut lhs = equal.clone();
    lhs.extend_from_slice(&not_a);
    let mut rhs = add_constant(party, &shr(&equal, 1), high);
    rhs.extend_from_slice(b);
    let mut prod = mul(party, &lhs, &rhs)?;
    let greater_b = prod.split_off(n);
    equal = prod;

    // equal[k] = AND of all bits k..64 of a XNOR b
    let mut step = 2;
    while step < 64 {
        let high = Bits64(!(u64::MAX >> step));
        let shifted = add_constant(party, &shr(&equal, step), high);
        equal = mul(party, &equal, &shifted)?;
        step *= 2;
    }

    // all bits above k equal
    let above_equal = add_constant(party, &shr(&equal, 1), Bits64(1 << 63));
    let first_difference = mul(party, &greater_b, &above_equal)?;

    // at most one bit is set, so the parity is the OR
    Ok(first_difference
        .into_iter()
        .map(|x| RssShare::from(x.si.parity().replicate_lsb(), x.sii.parity().replicate_lsb()))
        .collect())
}

/// Element-wise maximum of two shared vectors of unsigned integers.
pub fn max(
    party: &mut MainParty,
    a: &[RssShare<Bits64>],
    b: &[RssShare<Bits64>],
) -> MpcResult<RssShareVec<Bits64>> {
    let mask = lt_mask(party, a, b)?;
    let a_xor_b: RssShareVec<Bits64> = a.iter().zip(b).map(|(a, b)| *a + *b).collect();
    let select = mul(party, &mask, &a_xor_b)?;
    Ok(a.iter().zip(select).map(|(a, s)| *a + s).collect())
}

#[cfg(test)]
mod test {
    use rand::{thread_rng, Rng};

    use crate::party::test_export::localhost_setup;
    use crate::share::bits64::Bits64;
    use crate::share::test::{assert_eq_vector, consistent_vector, secret_share_vector};

    use super::{lt_mask, max};

    fn test_values() -> (Vec<Bits64>, Vec<Bits64>) {
        let mut rng = thread_rng();
        let mut a = vec![
            0,
            0,
            1,
            5,
            u64::MAX,
            u64::MAX - 1,
            1 << 63,
            (1 << 63) - 1,
            1000,
            1000,
        ];
        let mut b = vec![
            0,
            1,
            0,
            5,
            u64::MAX - 1,
            u64::MAX,
            (1 << 63) - 1,
            1 << 63,
            999,
            1001,
        ];
        for _ in 0..20 {
            a.push(rng.gen_range(0..10_000));
            b.push(rng.gen_range(0..10_000));
        }
        (
            a.into_iter().map(Bits64).collect(),
            b.into_iter().map(Bits64).collect(),
        )
    }

    #[test]
    fn less_than() {
        let (a, b) = test_values();
        let mut rng = thread_rng();
        let (a1, a2, a3) = secret_share_vector(&mut rng, &a);
        let (b1, b2, b3) = secret_share_vector(&mut rng, &b);
        let (m1, m2, m3) = localhost_setup(
            move |p| lt_mask(p, &a1, &b1).unwrap(),
            move |p| lt_mask(p, &a2, &b2).unwrap(),
            move |p| lt_mask(p, &a3, &b3).unwrap(),
            None,
        );
        consistent_vector(&m1, &m2, &m3);
        let expected = a
            .iter()
            .zip(&b)
            .map(|(a, b)| if a.0 < b.0 { Bits64::ONES } else { Bits64(0) });
        assert_eq_vector(m1, m2, m3, expected);
    }

    #[test]
    fn maximum() {
        let (a, b) = test_values();
        let mut rng = thread_rng();
        let (a1, a2, a3) = secret_share_vector(&mut rng, &a);
        let (b1, b2, b3) = secret_share_vector(&mut rng, &b);
        let (m1, m2, m3) = localhost_setup(
            move |p| max(p, &a1, &b1).unwrap(),
            move |p| max(p, &a2, &b2).unwrap(),
            move |p| max(p, &a3, &b3).unwrap(),
            None,
        );
        consistent_vector(&m1, &m2, &m3);
        let expected = a.iter().zip(&b).map(|(a, b)| Bits64(a.0.max(b.0)));
        assert_eq_vector(m1, m2, m3, expected);
    }
}
