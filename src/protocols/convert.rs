//! Conversions between arithmetic shares in [Z64] and boolean shares in [Bits64].
use itertools::izip;

use crate::party::error::MpcResult;
use crate::party::MainParty;
use crate::share::bits64::Bits64;
use crate::share::z64::Z64;
use crate::share::{HasZero, RssShare, RssShareVec};

use super::mul::mul;

/// Places the local shares `(s_i, s_i+1)` of `x = s_0 + s_1 + s_2` as three sharings `[s_0]`,
/// `[s_1]`, `[s_2]` without communication.
fn split_components<T: HasZero + Copy>(i: usize, si: T, sii: T) -> [RssShare<T>; 3] {
    let own = RssShare::from(si, T::ZERO);
    let next = RssShare::from(T::ZERO, sii);
    let none = RssShare::from(T::ZERO, T::ZERO);
    match i {
        0 => [own, next, none],
        1 => [none, own, next],
        _ => [next, none, own],
    }
}

fn shl(x: &[RssShare<Bits64>], bits: u32) -> RssShareVec<Bits64> {
    x.iter()
        .map(|x| RssShare::from(x.si.shl(bits), x.sii.shl(bits)))
        .collect()
}

/// Boolean sharing of `a + b` with a parallel prefix adder in 7 rounds.
fn add(
    party: &mut MainParty,
    a: &[RssShare<Bits64>],
    b: &[RssShare<Bits64>],
) -> MpcResult<RssShareVec<Bits64>> {
    let n = a.len();
    let propagate_bits: RssShareVec<Bits64> = a.iter().zip(b).map(|(a, b)| *a + *b).collect();
    let mut generate = mul(party, a, b)?;
    let mut propagate = propagate_bits.clone();
    let mut step = 1;
    while step < 64 {
        // g <- g ^ (p & g << step), p <- p & p << step
        let mut lhs = propagate.clone();
        lhs.extend_from_slice(&propagate);
        let mut rhs = shl(&generate, step);
        rhs.extend(shl(&propagate, step));
        let mut prod = mul(party, &lhs, &rhs)?;
        propagate = prod.split_off(n);
        for (g, carry) in generate.iter_mut().zip(prod) {
            *g += carry;
        }
        step *= 2;
    }
    let carries = shl(&generate, 1);
    Ok(propagate_bits
        .into_iter()
        .zip(carries)
        .map(|(p, c)| p + c)
        .collect())
}

/// Converts arithmetic shares into boolean shares of the same 64-bit values.
pub fn to_boolean(party: &mut MainParty, x: &[RssShare<Z64>]) -> MpcResult<RssShareVec<Bits64>> {
    let n = x.len();
    let (mut s0, mut s1, mut s2) = (
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
    );
    for x in x {
        let [c0, c1, c2] = split_components(party.i, Bits64(x.si.0), Bits64(x.sii.0));
        s0.push(c0);
        s1.push(c1);
        s2.push(c2);
    }
    // carry-save step: s0 + s1 + s2 = partial + carry
    let partial: RssShareVec<Bits64> = izip!(&s0, &s1, &s2).map(|(a, b, c)| *a + *b + *c).collect();
    let a_xor_c: RssShareVec<Bits64> = s0.iter().zip(&s2).map(|(a, c)| *a + *c).collect();
    let b_xor_c: RssShareVec<Bits64> = s1.iter().zip(&s2).map(|(b, c)| *b + *c).collect();
    let majority: RssShareVec<Bits64> = mul(party, &a_xor_c, &b_xor_c)?
        .into_iter()
        .zip(&s2)
        .map(|(m, c)| m + *c)
        .collect();
    add(party, &partial, &shl(&majority, 1))
}

/// Converts boolean shares of single bits, in the least significant position, into arithmetic
/// shares of 0 or 1.
pub fn bit_to_arithmetic(
    party: &mut MainParty,
    bits: &[RssShare<Bits64>],
) -> MpcResult<RssShareVec<Z64>> {
    let n = bits.len();
    let (mut b0, mut b1, mut b2) = (
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
    );
    for b in bits {
        let [c0, c1, c2] = split_components(party.i, Z64(b.si.0 & 1), Z64(b.sii.0 & 1));
        b0.push(c0);
        b1.push(c1);
        b2.push(c2);
    }
    // a ^ b = a + b - 2ab
    let two = Z64(2);
    let b0b1 = mul(party, &b0, &b1)?;
    let b01: RssShareVec<Z64> = izip!(b0, b1, b0b1)
        .map(|(a, b, ab)| a + b - ab * two)
        .collect();
    let prod = mul(party, &b01, &b2)?;
    Ok(izip!(b01, b2, prod)
        .map(|(a, b, ab)| a + b - ab * two)
        .collect())
}

/// Computes `[x < 0]` for two's complement values as arithmetic shares of 0 or 1.
pub fn is_negative(party: &mut MainParty, x: &[RssShare<Z64>]) -> MpcResult<RssShareVec<Z64>> {
    let sign: RssShareVec<Bits64> = to_boolean(party, x)?
        .into_iter()
        .map(|b| RssShare::from(b.si.shr(63), b.sii.shr(63)))
        .collect();
    bit_to_arithmetic(party, &sign)
}

/// Computes `max(x, 0)` element-wise.
pub fn relu(party: &mut MainParty, x: &[RssShare<Z64>]) -> MpcResult<RssShareVec<Z64>> {
    let negative = is_negative(party, x)?;
    let cut = mul(party, &negative, x)?;
    Ok(x.iter().zip(cut).map(|(x, c)| *x - c).collect())
}
