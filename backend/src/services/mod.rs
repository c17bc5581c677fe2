//! Business logic services for the TraceSafe backend

pub mod batch;
pub mod score;
pub mod sync;
pub mod telemetry;
pub mod verify;

pub use batch::BatchService;
pub use score::ScoreService;
pub use sync::LedgerSync;
pub use telemetry::TelemetryService;
pub use verify::IntegrityService;
