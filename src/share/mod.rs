//! This module provides the rings the protocols compute on and replicated secret sharing.
//!
//! The provided ring operations are **not constant-time**.
pub mod bits64;
pub mod fixed;
pub mod z64;

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::network::NetSerializable;
use crate::party::RngExt;

/// A party's RSS-share of a (2,3)-shared ring element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RssShare<T> {
    /// The first share of the party.
    pub si: T,
    /// The second share of the party.
    pub sii: T,
}

/// A vector of [RssShare]s.
pub type RssShareVec<F> = Vec<RssShare<F>>;

// Provides the neutral element of addition
pub trait HasZero {
    /// Zero the neutral element of addition
    const ZERO: Self;
}

impl<T> RssShare<T> {
    /// Computes an RSS-share given two shares.
    pub fn from(si: T, sii: T) -> Self {
        Self { si, sii }
    }
}

impl<T: Add> Add<Self> for RssShare<T> {
    type Output = RssShare<<T as Add>::Output>;

    fn add(self, rhs: Self) -> Self::Output {
        RssShare {
            si: self.si + rhs.si,
            sii: self.sii + rhs.sii,
        }
    }
}

impl<T: Sub> Sub<Self> for RssShare<T> {
    type Output = RssShare<<T as Sub>::Output>;

    fn sub(self, rhs: Self) -> Self::Output {
        RssShare {
            si: self.si - rhs.si,
            sii: self.sii - rhs.sii,
        }
    }
}

impl<T: Neg> Neg for RssShare<T> {
    type Output = RssShare<<T as Neg>::Output>;

    fn neg(self) -> Self::Output {
        RssShare {
            si: -self.si,
            sii: -self.sii,
        }
    }
}

/// Multiplies the RSS-share with a public scalar.
impl<T: Mul + Copy> Mul<T> for RssShare<T> {
    type Output = RssShare<<T as Mul>::Output>;

    fn mul(self, rhs: T) -> Self::Output {
        RssShare {
            si: self.si * rhs,
            sii: self.sii * rhs,
        }
    }
}

impl<T: AddAssign> AddAssign for RssShare<T> {
    fn add_assign(&mut self, rhs: Self) {
        self.si += rhs.si;
        self.sii += rhs.sii;
    }
}

impl<T: SubAssign> SubAssign for RssShare<T> {
    fn sub_assign(&mut self, rhs: Self) {
        self.si -= rhs.si;
        self.sii -= rhs.sii;
    }
}

impl<T: Copy> Copy for RssShare<T> {}

impl<T: HasZero> HasZero for RssShare<T> {
    const ZERO: Self = Self {
        si: T::ZERO,
        sii: T::ZERO,
    };
}

/// A finite commutative ring.
pub trait Ring:
    Default
    + HasZero
    + NetSerializable
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
    + Clone
    + Copy
    + PartialEq
    + AddAssign
    + SubAssign
    + RngExt
    + Debug
    + Send
    + Sync
{
    /// The ring element size in byte
    const NBYTES: usize;

    /// The ring element size in bits
    const NBITS: usize = 8 * Self::NBYTES;

    /// One the neutral element of multiplication
    const ONE: Self;

    /// Returns if the value is zero
    fn is_zero(&self) -> bool;
}

/// Ring that provides methods to compute inner products.
pub trait InnerProduct: Ring {
    /// Computes the dot product of vectors `x` and `y`.
    ///
    /// This function assumes that both vectors are of equal length.
    fn inner_product(a: &[Self], b: &[Self]) -> Self;

    /// Computes the (weak) dot product of replicated sharing vectors `[[x]]` and `[[y]]`.
    ///
    /// The result is a sum sharing of the inner product.
    /// This function assumes that both vectors are of equal length.
    fn weak_inner_product(a: &[RssShare<Self>], b: &[RssShare<Self>]) -> Self;
}
