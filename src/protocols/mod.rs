//! Semi-honest three-party protocols on replicated shares.
//!
//! All functions must be called by the three parties in the same order with inputs of the same
//! length. They return once the local party's communication for the step is completed.
pub mod checkpoint;
pub mod compare;
pub mod convert;
pub mod input;
pub mod mul;
pub mod output;

pub use checkpoint::confirm;
pub use compare::max;
pub use convert::relu;
pub use input::{input_from, Contribution};
pub use mul::{mul, mul_trunc, truncate, truncate_additive};
pub use output::{open, open_one};
