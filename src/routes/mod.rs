//! Route definitions for the Loanbook API

mod access;
mod loans;

pub use access::access_routes;
pub use loans::loan_routes;
