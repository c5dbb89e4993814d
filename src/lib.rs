//! Secure assembly of a vertically partitioned dataset and secure logistic regression among three
//! parties, based on replicated secret sharing.
//!
//! Each party holds the covariates of some columns, the labels, or nothing. The parties agree on
//! the shape of the joint dataset, share it from the authorized senders and train a model whose
//! weights are the only data-dependent values that are opened.
pub mod assembly;
pub mod config;
pub mod data;
pub mod error;
pub mod network;
pub mod party;
pub mod protocols;
pub mod session;
pub mod share;
pub mod training;
