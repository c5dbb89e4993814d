//! The ring `Z_2^64` of arithmetic shares.
use std::borrow::Borrow;
use std::fmt::{Debug, Formatter};
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use rand::{CryptoRng, Rng};

use crate::network::NetSerializable;
use crate::party::RngExt;

use super::{HasZero, InnerProduct, Ring, RssShare};

/// An element of `Z_2^64`, all operations wrap around.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Z64(pub u64);

impl Z64 {
    /// Interprets the element in two's complement.
    #[inline]
    pub fn as_signed(self) -> i64 {
        self.0 as i64
    }

    /// Logical right shift.
    #[inline]
    pub fn shr(self, bits: u32) -> Self {
        Self(self.0 >> bits)
    }

    /// Arithmetic right shift of the two's complement interpretation.
    #[inline]
    pub fn shr_signed(self, bits: u32) -> Self {
        Self((self.as_signed() >> bits) as u64)
    }
}

impl HasZero for Z64 {
    const ZERO: Self = Self(0);
}

impl Ring for Z64 {
    const NBYTES: usize = 8;
    const ONE: Self = Self(1);

    fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl NetSerializable for Z64 {
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

impl RngExt for Z64 {
    fn fill<R: Rng + CryptoRng>(rng: &mut R, buf: &mut [Self]) {
        buf.iter_mut().for_each(|x| x.0 = rng.next_u64());
    }
}

impl Add for Z64 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Z64 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl Sub for Z64 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.wrapping_sub(rhs.0))
    }
}

impl SubAssign for Z64 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.wrapping_sub(rhs.0);
    }
}

impl Neg for Z64 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self::Output {
        Self(self.0.wrapping_neg())
    }
}

impl Mul for Z64 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0.wrapping_mul(rhs.0))
    }
}

impl MulAssign for Z64 {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        self.0 = self.0.wrapping_mul(rhs.0);
    }
}

impl InnerProduct for Z64 {
    fn inner_product(a: &[Self], b: &[Self]) -> Self {
        debug_assert_eq!(a.len(), b.len());
        Self(
            a.iter()
                .zip(b)
                .fold(0u64, |acc, (x, y)| acc.wrapping_add(x.0.wrapping_mul(y.0))),
        )
    }

    fn weak_inner_product(a: &[RssShare<Self>], b: &[RssShare<Self>]) -> Self {
        debug_assert_eq!(a.len(), b.len());
        Self(a.iter().zip(b).fold(0u64, |acc, (x, y)| {
            // x_i y_i + x_i y_ii + x_ii y_i
            let t = x.si.0.wrapping_mul(y.si.0.wrapping_add(y.sii.0));
            acc.wrapping_add(t)
                .wrapping_add(x.sii.0.wrapping_mul(y.si.0))
        }))
    }
}

impl Debug for Z64 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Z64({})", self.as_signed())
    }
}
