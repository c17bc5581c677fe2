//! HTTP handlers for the TraceSafe backend

pub mod batch;
pub mod farmer;
pub mod health;
pub mod ledger;
pub mod telemetry;
pub mod verify;

pub use batch::*;
pub use farmer::*;
pub use health::*;
pub use ledger::*;
pub use telemetry::*;
pub use verify::*;
