//! Wallet domain module

pub mod model;
pub mod service;

pub use model::{
    AddTransactionRequest, LedgerEntryKind, TransactionHistoryQuery, Wallet, WalletSummary,
    WalletTransaction,
};
pub use service::WalletService;
