//! The ring `GF(2)^64` of boolean shares, i.e. 64 independent bits.
use std::borrow::Borrow;
use std::fmt::{Debug, Formatter};
use std::ops::{Add, AddAssign, BitAnd, BitXor, Mul, Neg, Not, Sub, SubAssign};

use rand::{CryptoRng, Rng};

use crate::network::NetSerializable;
use crate::party::RngExt;

use super::{HasZero, Ring};

/// 64 bits where addition is XOR and multiplication is AND.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bits64(pub u64);

impl Bits64 {
    /// All bits set.
    pub const ONES: Self = Self(u64::MAX);

    /// The XOR of all bits, as the least significant bit.
    #[inline]
    pub fn parity(self) -> Self {
        Self((self.0.count_ones() & 1) as u64)
    }

    /// Copies the least significant bit into all 64 positions.
    #[inline]
    pub fn replicate_lsb(self) -> Self {
        Self((self.0 & 1).wrapping_neg())
    }

    #[inline]
    pub fn shr(self, bits: u32) -> Self {
        Self(self.0 >> bits)
    }

    #[inline]
    pub fn shl(self, bits: u32) -> Self {
        Self(self.0 << bits)
    }
}

impl HasZero for Bits64 {
    const ZERO: Self = Self(0);
}

impl Ring for Bits64 {
    const NBYTES: usize = 8;
    const ONE: Self = Self::ONES;

    fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl NetSerializable for Bits64 {
    fn serialized_size(n_elements: usize) -> usize {
        n_elements * Self::NBYTES
    }

    fn as_byte_vec(it: impl IntoIterator<Item = impl Borrow<Self>>, len: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::serialized_size(len));
        it.into_iter()
            .for_each(|el| bytes.extend_from_slice(&el.borrow().0.to_le_bytes()));
        bytes
    }

    fn from_byte_vec(v: Vec<u8>, len: usize) -> Vec<Self> {
        debug_assert_eq!(v.len(), Self::serialized_size(len));
        v.chunks_exact(Self::NBYTES)
            .map(|chunk| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                Self(u64::from_le_bytes(buf))
            })
            .collect()
    }
}

impl RngExt for Bits64 {
    fn fill<R: Rng + CryptoRng>(rng: &mut R, buf: &mut [Self]) {
        buf.iter_mut().for_each(|x| x.0 = rng.next_u64());
    }
}

impl Add for Bits64 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 ^ rhs.0)
    }
}

impl AddAssign for Bits64 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl Sub for Bits64 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 ^ rhs.0)
    }
}

impl SubAssign for Bits64 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl Neg for Bits64 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self::Output {
        self
    }
}

impl Mul for Bits64 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl BitXor for Bits64 {
    type Output = Self;

    #[inline]
    fn bitxor(self, rhs: Self) -> Self::Output {
        Self(self.0 ^ rhs.0)
    }
}

impl BitAnd for Bits64 {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl Not for Bits64 {
    type Output = Self;

    #[inline]
    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl Debug for Bits64 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bits64({:#018x})", self.0)
    }
}
