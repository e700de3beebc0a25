//! Voucher marketplace backend library
//!
//! Core modules for the peer-to-peer voucher resale marketplace server:
//! voucher lifecycle and purchase gate, fraud scoring, wallet ledger, and
//! the background sweeps.

pub mod app_state;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod fraud;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod sinks;
pub mod voucher;
pub mod wallet;
