//! Batch lifecycle model: status graph, transition table, custody types
//!
//! The transition table is the single authority on which action is legal
//! from which status and which guard must hold before mutation. Handlers
//! and services never compare status strings directly.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Batch lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Created,
    InTransit,
    Delivered,
    Received,
    Sold,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Created => "created",
            BatchStatus::InTransit => "in_transit",
            BatchStatus::Delivered => "delivered",
            BatchStatus::Received => "received",
            BatchStatus::Sold => "sold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(BatchStatus::Created),
            "in_transit" => Some(BatchStatus::InTransit),
            "delivered" => Some(BatchStatus::Delivered),
            "received" => Some(BatchStatus::Received),
            "sold" => Some(BatchStatus::Sold),
            _ => None,
        }
    }
}

/// Lifecycle action requested by an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    Pickup,
    TransitUpdate,
    Deliver,
    Receive,
    Sell,
}

impl BatchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchAction::Pickup => "pickup",
            BatchAction::TransitUpdate => "transit_update",
            BatchAction::Deliver => "deliver",
            BatchAction::Receive => "receive",
            BatchAction::Sell => "sell",
        }
    }

    /// Journey event type recorded when this action is accepted
    pub fn event_type(&self) -> &'static str {
        match self {
            BatchAction::Pickup => "pickup",
            BatchAction::TransitUpdate => "transit_update",
            BatchAction::Deliver => "delivery",
            BatchAction::Receive => "received",
            BatchAction::Sell => "sold",
        }
    }
}

/// Ownership guard that must hold before the action mutates anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionGuard {
    /// No prior-owner check (farmer hands off at pickup)
    None,
    /// Only the driver currently owning the batch
    OwningDriver,
    /// Only the retailer designated at delivery, if one was designated
    DesignatedRetailer,
    /// Only the retailer currently owning the batch
    OwningRetailer,
}

/// Resolved transition: where the action leads and what must hold first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: BatchStatus,
    pub guard: TransitionGuard,
}

/// The canonical state graph: `(current status, action) -> transition`.
///
/// `transit_update` keeps the batch `in_transit`; `receive` is allowed from
/// `delivered` only, which enforces the driver-confirms-first rule. Any pair
/// not listed here is a guard violation.
pub fn transition(current: BatchStatus, action: BatchAction) -> Option<Transition> {
    match (current, action) {
        (BatchStatus::Created, BatchAction::Pickup) => Some(Transition {
            next: BatchStatus::InTransit,
            guard: TransitionGuard::None,
        }),
        (BatchStatus::InTransit, BatchAction::TransitUpdate) => Some(Transition {
            next: BatchStatus::InTransit,
            guard: TransitionGuard::OwningDriver,
        }),
        (BatchStatus::InTransit, BatchAction::Deliver) => Some(Transition {
            next: BatchStatus::Delivered,
            guard: TransitionGuard::OwningDriver,
        }),
        (BatchStatus::Delivered, BatchAction::Receive) => Some(Transition {
            next: BatchStatus::Received,
            guard: TransitionGuard::DesignatedRetailer,
        }),
        (BatchStatus::Received, BatchAction::Sell) => Some(Transition {
            next: BatchStatus::Sold,
            guard: TransitionGuard::OwningRetailer,
        }),
        _ => None,
    }
}

/// Party type holding custody of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    Farmer,
    Driver,
    Retailer,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::Farmer => "farmer",
            OwnerType::Driver => "driver",
            OwnerType::Retailer => "retailer",
        }
    }

    /// Ledger organization a party of this type submits through; the
    /// ledger batch record carries it as `currentOrg`.
    pub fn ledger_org(&self) -> &'static str {
        match self {
            OwnerType::Farmer => "FarmerOrgMSP",
            OwnerType::Driver => "DriverOrgMSP",
            OwnerType::Retailer => "RetailerOrgMSP",
        }
    }
}

/// Authenticated actor role, supplied by the auth middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Farmer,
    Driver,
    Retailer,
    Admin,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Farmer => "farmer",
            ActorRole::Driver => "driver",
            ActorRole::Retailer => "retailer",
            ActorRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "farmer" => Some(ActorRole::Farmer),
            "driver" => Some(ActorRole::Driver),
            "retailer" => Some(ActorRole::Retailer),
            "admin" => Some(ActorRole::Admin),
            _ => None,
        }
    }

    /// Organization identity used on the ledger network for this role.
    /// Admin submits through the regulator organization.
    pub fn ledger_org(&self) -> &'static str {
        match self {
            ActorRole::Farmer => "FarmerOrgMSP",
            ActorRole::Driver => "DriverOrgMSP",
            ActorRole::Retailer => "RetailerOrgMSP",
            ActorRole::Admin => "RegulatorOrgMSP",
        }
    }
}

/// Tracked produce batch
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Batch {
    pub id: Uuid,
    pub batch_id: String,
    pub crop: String,
    pub variety: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub harvest_date: NaiveDate,
    pub farmer_id: Uuid,
    pub status: String,
    pub current_owner_type: OwnerType,
    pub current_owner_id: Uuid,
    pub pending_retailer_id: Option<Uuid>,
    pub ledger_tx_id: Option<String>,
    pub origin_latitude: Option<f64>,
    pub origin_longitude: Option<f64>,
    pub origin_address: Option<String>,
    pub crate_temp: f64,
    pub reefer_temp: f64,
    pub humidity: f64,
    pub location_temp: f64,
    pub crop_type_code: i32,
    pub transit_start_time: Option<DateTime<Utc>>,
    pub transit_end_time: Option<DateTime<Utc>>,
    pub transit_duration: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    pub fn status_enum(&self) -> Option<BatchStatus> {
        BatchStatus::from_str(&self.status)
    }
}

/// Append-only record of one accepted lifecycle action
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JourneyEvent {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub event_type: String,
    pub actor_type: String,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub notes: Option<String>,
    pub evidence_urls: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// Custody-change record between two parties
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Transfer {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub from_type: String,
    pub from_id: Uuid,
    pub to_type: String,
    pub to_id: Uuid,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: Option<String>,
    pub transfer_date: DateTime<Utc>,
}

/// Optimal storage conditions for a crop, used to seed batch defaults
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropProfile {
    pub code: i32,
    pub crate_temp: f64,
    pub reefer_temp: f64,
    pub humidity: f64,
}

/// Ambient temperature fallback when no weather sample is available
pub const DEFAULT_LOCATION_TEMP: f64 = 22.0;

/// Look up the storage profile for a crop. Unknown crops get code -1 and
/// the generic profile.
pub fn crop_profile(crop: &str) -> CropProfile {
    let profile = |code, crate_temp, reefer_temp, humidity| CropProfile {
        code,
        crate_temp,
        reefer_temp,
        humidity,
    };

    match crop.trim().to_lowercase().as_str() {
        "lettuce" => profile(0, 4.0, 2.0, 95.0),
        "tomato" => profile(1, 13.0, 10.0, 90.0),
        "mango" => profile(2, 15.0, 12.0, 85.0),
        "spinach" => profile(3, 2.0, 0.0, 95.0),
        "wheat" => profile(4, 15.0, 12.0, 60.0),
        "rice" => profile(5, 15.0, 12.0, 65.0),
        "potato" => profile(6, 7.0, 4.0, 90.0),
        "onion" => profile(7, 5.0, 2.0, 70.0),
        "carrot" => profile(8, 2.0, 0.0, 95.0),
        "cabbage" => profile(9, 2.0, 0.0, 95.0),
        _ => profile(-1, 10.0, 8.0, 80.0),
    }
}

/// Generate a human-readable batch id: `{CROP3}-{YEAR}-{NNNN}`.
///
/// The suffix is drawn from fresh UUID entropy; uniqueness is ultimately
/// enforced by the UNIQUE constraint on `batches.batch_id`.
pub fn generate_batch_id(crop: &str) -> String {
    let prefix: String = crop
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let prefix = if prefix.is_empty() {
        "BAT".to_string()
    } else {
        prefix
    };

    let bytes = *Uuid::new_v4().as_bytes();
    let suffix = 1000 + u16::from_be_bytes([bytes[0], bytes[1]]) % 9000;

    format!("{}-{}-{:04}", prefix, Utc::now().year(), suffix)
}
