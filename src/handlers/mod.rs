//! API handlers for the voucher marketplace backend

pub mod fraud;
pub mod health;
pub mod sweep;
pub mod voucher;
pub mod wallet;

pub use fraud::*;
pub use health::*;
pub use sweep::*;
pub use voucher::*;
pub use wallet::*;
