//! Ledger network client facade
//!
//! The permissioned ledger is treated as an opaque service exposing named
//! submit/query operations, scoped per organizational role. It may be
//! unavailable; callers decide whether that is fatal (it almost never is).

pub mod client;
pub mod gateway;

pub use client::{GatewayLedgerClient, LedgerClient, LedgerOp};
pub use gateway::LedgerGateway;
