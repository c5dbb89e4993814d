//! Multiplication of shares and fixed-point truncation.
use itertools::izip;

use crate::network::task::Direction;
use crate::party::error::MpcResult;
use crate::party::MainParty;
use crate::share::z64::Z64;
use crate::share::{Ring, RssShare, RssShareVec};

/// The local share `a_i b_i + a_i b_ii + a_ii b_i` of a 3-out-of-3 sum sharing of `ab`.
#[inline]
pub fn local_product<R: Ring>(a: &RssShare<R>, b: &RssShare<R>) -> R {
    a.si * b.si + a.si * b.sii + a.sii * b.si
}

/// Element-wise product of two shared vectors (AND for boolean shares).
pub fn mul<R: Ring>(
    party: &mut MainParty,
    a: &[RssShare<R>],
    b: &[RssShare<R>],
) -> MpcResult<RssShareVec<R>> {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let alphas = party.generate_alpha::<R>(n);
    let ci: Vec<R> = izip!(a, b, alphas)
        .map(|(a, b, alpha)| local_product(a, b) + alpha)
        .collect();
    let rcv = party.receive_field::<R>(Direction::Next, n);
    party.send_field::<R>(Direction::Previous, &ci, n);
    let cii = rcv.rcv()?;
    party.wait_for_completion()?;
    Ok(ci
        .into_iter()
        .zip(cii)
        .map(|(si, sii)| RssShare::from(si, sii))
        .collect())
}

/// Turns a 3-out-of-3 sum sharing `z` into a replicated sharing of `z / 2^bits`.
///
/// P1 and P2 merge their summands, P0 and P1 truncate their halves locally and P1 re-randomises
/// its result with randomness shared with P2. The result may be off by one in the last place,
/// and is wrong with probability about `|z| / 2^64`.
pub fn truncate_additive(
    party: &mut MainParty,
    z: Vec<Z64>,
    bits: u32,
) -> MpcResult<RssShareVec<Z64>> {
    let n = z.len();
    // re-randomise the summands
    let z: Vec<Z64> = z
        .into_iter()
        .zip(party.generate_alpha::<Z64>(n))
        .map(|(z, alpha)| z + alpha)
        .collect();
    let shares = match party.i {
        0 => {
            let t0: Vec<Z64> = z.into_iter().map(|z0| -((-z0).shr(bits))).collect();
            party.send_field::<Z64>(Direction::Previous, &t0, n);
            let t1 = party.receive_field::<Z64>(Direction::Next, n).rcv()?;
            t0.into_iter()
                .zip(t1)
                .map(|(t0, t1)| RssShare::from(t0, t1))
                .collect()
        }
        1 => {
            let z2 = party.receive_field::<Z64>(Direction::Next, n).rcv()?;
            let r: Vec<Z64> = party.random_next(n);
            let t1: Vec<Z64> = izip!(z, z2, &r)
                .map(|(z1, z2, r)| (z1 + z2).shr(bits) - *r)
                .collect();
            party.send_field::<Z64>(Direction::Previous, &t1, n);
            t1.into_iter()
                .zip(r)
                .map(|(t1, t2)| RssShare::from(t1, t2))
                .collect()
        }
        _ => {
            party.send_field::<Z64>(Direction::Previous, &z, n);
            let t2: Vec<Z64> = party.random_prev(n);
            let t0 = party.receive_field::<Z64>(Direction::Next, n).rcv()?;
            t2.into_iter()
                .zip(t0)
                .map(|(t2, t0)| RssShare::from(t2, t0))
                .collect()
        }
    };
    party.wait_for_completion()?;
    Ok(shares)
}

/// Divides the shared fixed-point values by `2^bits`.
pub fn truncate(
    party: &mut MainParty,
    x: &[RssShare<Z64>],
    bits: u32,
) -> MpcResult<RssShareVec<Z64>> {
    truncate_additive(party, x.iter().map(|x| x.si).collect(), bits)
}

/// Element-wise product followed by a truncation by `bits`, in two rounds.
pub fn mul_trunc(
    party: &mut MainParty,
    a: &[RssShare<Z64>],
    b: &[RssShare<Z64>],
    bits: u32,
) -> MpcResult<RssShareVec<Z64>> {
    debug_assert_eq!(a.len(), b.len());
    let z = a.iter().zip(b).map(|(a, b)| local_product(a, b)).collect();
    truncate_additive(party, z, bits)
}

#[cfg(test)]
mod test {
    use itertools::izip;
    use rand::thread_rng;

    use crate::party::test_export::localhost_setup;
    use crate::party::RngExt;
    use crate::protocols::output::open;
    use crate::share::bits64::Bits64;
    use crate::share::fixed::{decode, encode, FRACTIONAL_BITS};
    use crate::share::test::{assert_eq_vector, consistent_vector, secret_share_vector};
    use crate::share::z64::Z64;

    use super::{mul, mul_trunc, truncate};

    #[test]
    fn mul_z64() {
        const N: usize = 100;
        let mut rng = thread_rng();
        let a: Vec<Z64> = Z64::generate(&mut rng, N);
        let b: Vec<Z64> = Z64::generate(&mut rng, N);
        let (a1, a2, a3) = secret_share_vector(&mut rng, &a);
        let (b1, b2, b3) = secret_share_vector(&mut rng, &b);

        let (c1, c2, c3) = localhost_setup(
            move |p| mul(p, &a1, &b1).unwrap(),
            move |p| mul(p, &a2, &b2).unwrap(),
            move |p| mul(p, &a3, &b3).unwrap(),
            None,
        );
        consistent_vector(&c1, &c2, &c3);
        assert_eq_vector(c1, c2, c3, a.iter().zip(&b).map(|(a, b)| *a * *b));
    }

    #[test]
    fn and_bits64() {
        const N: usize = 100;
        let mut rng = thread_rng();
        let a: Vec<Bits64> = Bits64::generate(&mut rng, N);
        let b: Vec<Bits64> = Bits64::generate(&mut rng, N);
        let (a1, a2, a3) = secret_share_vector(&mut rng, &a);
        let (b1, b2, b3) = secret_share_vector(&mut rng, &b);

        let (c1, c2, c3) = localhost_setup(
            move |p| mul(p, &a1, &b1).unwrap(),
            move |p| mul(p, &a2, &b2).unwrap(),
            move |p| mul(p, &a3, &b3).unwrap(),
            None,
        );
        consistent_vector(&c1, &c2, &c3);
        assert_eq_vector(c1, c2, c3, a.iter().zip(&b).map(|(a, b)| *a & *b));
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        // one unit in the last place
        let ulp = 1.0 / (1u64 << FRACTIONAL_BITS) as f64;
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() <= 2.0 * ulp, "expected {}, got {}", e, a);
        }
    }

    #[test]
    fn truncation_is_off_by_at_most_one() {
        let x = [0.0, 1.5, -1.5, 1000.25, -0.0078125, 123.456, -98765.4321];
        let scaled: Vec<Z64> = x
            .iter()
            .map(|x| encode(*x).unwrap() * Z64(1 << FRACTIONAL_BITS))
            .collect();
        let mut rng = thread_rng();
        let (s1, s2, s3) = secret_share_vector(&mut rng, &scaled);
        let program = |s: Vec<_>| {
            move |p: &mut crate::party::MainParty| {
                let t = truncate(p, &s, FRACTIONAL_BITS).unwrap();
                (t.clone(), open(p, &t).unwrap())
            }
        };
        let ((t1, o1), (t2, o2), (t3, _)) =
            localhost_setup(program(s1), program(s2), program(s3), None);
        consistent_vector(&t1, &t2, &t3);
        assert_eq!(o1, o2);
        let decoded: Vec<f64> = o1.into_iter().map(decode).collect();
        assert_close(&decoded, &x);
    }

    #[test]
    fn fixed_point_products() {
        let a = [0.5, -2.0, 3.25, -7.5, 0.0];
        let b = [4.0, 1.5, -0.25, -2.0, 11.0];
        let mut rng = thread_rng();
        let ea: Vec<Z64> = a.iter().map(|x| encode(*x).unwrap()).collect();
        let eb: Vec<Z64> = b.iter().map(|x| encode(*x).unwrap()).collect();
        let (a1, a2, a3) = secret_share_vector(&mut rng, &ea);
        let (b1, b2, b3) = secret_share_vector(&mut rng, &eb);
        let (o1, o2, o3) = localhost_setup(
            move |p| {
                let c = mul_trunc(p, &a1, &b1, FRACTIONAL_BITS).unwrap();
                open(p, &c).unwrap()
            },
            move |p| {
                let c = mul_trunc(p, &a2, &b2, FRACTIONAL_BITS).unwrap();
                open(p, &c).unwrap()
            },
            move |p| {
                let c = mul_trunc(p, &a3, &b3, FRACTIONAL_BITS).unwrap();
                open(p, &c).unwrap()
            },
            None,
        );
        assert_eq!(o1, o2);
        assert_eq!(o2, o3);
        let expected: Vec<f64> = izip!(a, b).map(|(a, b)| a * b).collect();
        let decoded: Vec<f64> = o1.into_iter().map(decode).collect();
        assert_close(&decoded, &expected);
    }
}
