//! Business logic services for Loanbook

mod access;
mod bans;
mod loans;

pub use access::{sha256_hex, verify_password, AccessError, AccessService};
pub use bans::{BanError, BanService};
pub use loans::{LoanError, LoanService};
