//! Database models for the TraceSafe backend

pub mod batch;
pub mod farmer;
pub mod telemetry;

pub use batch::{
    ActorRole, Batch, BatchAction, BatchStatus, CropProfile, JourneyEvent, OwnerType, Transfer,
    TransitionGuard,
};
pub use farmer::Farmer;
pub use telemetry::{Device, SensorReading};
