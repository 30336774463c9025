//! API handlers for the Loanbook backend

pub mod access;
pub mod loans;

pub use access::*;
pub use loans::*;
