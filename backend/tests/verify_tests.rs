//! Tests for ledger/relational integrity comparison
//! Verifies the field-by-field diff between a batch row and the ledger
//! record, including tolerance for absent optional fields.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use tracesafe_backend::models::batch::{Batch, OwnerType};
use tracesafe_backend::services::verify::compare_records;

fn sample_batch() -> Batch {
    let farmer_id = Uuid::new_v4();
    Batch {
        id: Uuid::new_v4(),
        batch_id: "TOM-2026-4821".to_string(),
        crop: "tomato".to_string(),
        variety: Some("roma".to_string()),
        quantity: Decimal::new(15000, 2), // 150.00
        unit: "kg".to_string(),
        harvest_date: Utc::now().date_naive(),
        farmer_id,
        status: "in_transit".to_string(),
        current_owner_type: OwnerType::Driver,
        current_owner_id: Uuid::new_v4(),
        pending_retailer_id: None,
        ledger_tx_id: Some("tx-abc123".to_string()),
        origin_latitude: Some(18.52),
        origin_longitude: Some(73.85),
        origin_address: None,
        crate_temp: 13.0,
        reefer_temp: 10.0,
        humidity: 90.0,
        location_temp: 22.0,
        crop_type_code: 1,
        transit_start_time: None,
        transit_end_time: None,
        transit_duration: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn matching_records_produce_no_discrepancies() {
    let batch = sample_batch();
    let record = json!({
        "batchId": "TOM-2026-4821",
        "status": "in_transit",
        "crop": "tomato",
        "variety": "roma",
        "quantity": 150.0,
        "unit": "kg",
        "farmerName": "Asha Pawar",
        "currentOwner": "x509::CN=driver-7",
        "currentOrg": "DriverOrgMSP",
    });

    let discrepancies = compare_records(&batch, Some("Asha Pawar"), &record);
    assert!(discrepancies.is_empty(), "{:?}", discrepancies);
}

#[test]
fn status_disagreement_is_flagged() {
    let batch = sample_batch();
    let record = json!({ "status": "delivered", "crop": "tomato" });

    let discrepancies = compare_records(&batch, None, &record);
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].field, "status");
    assert_eq!(discrepancies[0].relational, "in_transit");
    assert_eq!(discrepancies[0].ledger, "delivered");
}

#[test]
fn missing_status_on_ledger_is_flagged() {
    let batch = sample_batch();
    let record = json!({ "crop": "tomato" });

    let discrepancies = compare_records(&batch, None, &record);
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].field, "status");
    assert_eq!(discrepancies[0].ledger, "(missing)");
}

#[test]
fn quantity_comparison_handles_json_numbers() {
    let batch = sample_batch();

    // The chaincode writes quantity as a JSON number
    let record = json!({ "status": "in_transit", "quantity": 150.0 });
    assert!(compare_records(&batch, None, &record).is_empty());

    // A numeric disagreement must be flagged, not silently passed over
    let record = json!({ "status": "in_transit", "quantity": 149.5 });
    let discrepancies = compare_records(&batch, None, &record);
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].field, "quantity");
    assert_eq!(discrepancies[0].relational, "150.00");
    assert_eq!(discrepancies[0].ledger, "149.5");
}

#[test]
fn quantity_comparison_is_numeric_not_textual() {
    let batch = sample_batch();
    // "150" and "150.00" are the same quantity
    let record = json!({ "status": "in_transit", "quantity": "150" });

    assert!(compare_records(&batch, None, &record).is_empty());

    let record = json!({ "status": "in_transit", "quantity": "149.5" });
    let discrepancies = compare_records(&batch, None, &record);
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].field, "quantity");
}

#[test]
fn crop_and_variety_comparison_ignores_case() {
    let batch = sample_batch();
    let record = json!({ "status": "in_transit", "crop": "Tomato", "variety": "Roma" });

    assert!(compare_records(&batch, None, &record).is_empty());
}

#[test]
fn variety_disagreement_is_flagged() {
    let batch = sample_batch();
    let record = json!({ "status": "in_transit", "variety": "cherry" });

    let discrepancies = compare_records(&batch, None, &record);
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].field, "variety");
    assert_eq!(discrepancies[0].relational, "roma");
}

#[test]
fn unit_disagreement_is_flagged() {
    let batch = sample_batch();
    let record = json!({ "status": "in_transit", "unit": "quintal" });

    let discrepancies = compare_records(&batch, None, &record);
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].field, "unit");
}

#[test]
fn farmer_name_only_compared_when_both_sides_have_one() {
    let batch = sample_batch();
    let record = json!({ "status": "in_transit", "farmerName": "Asha Pawar" });

    // Relational farmer row missing: no flag
    assert!(compare_records(&batch, None, &record).is_empty());

    // Both present and different: flagged
    let discrepancies = compare_records(&batch, Some("Ravi Kumar"), &record);
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].field, "farmer_name");
}

#[test]
fn owning_org_disagreement_is_flagged() {
    let batch = sample_batch();
    // Driver holds the batch relationally, ledger still shows the farmer org
    let record = json!({ "status": "in_transit", "currentOrg": "FarmerOrgMSP" });

    let discrepancies = compare_records(&batch, None, &record);
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].field, "current_org");
    assert_eq!(discrepancies[0].relational, "DriverOrgMSP");
    assert_eq!(discrepancies[0].ledger, "FarmerOrgMSP");
}

#[test]
fn multiple_disagreements_are_all_reported() {
    let batch = sample_batch();
    let record = json!({
        "status": "sold",
        "crop": "onion",
        "quantity": 10,
        "unit": "quintal",
        "currentOrg": "RetailerOrgMSP",
    });

    let discrepancies = compare_records(&batch, None, &record);
    let fields: Vec<&str> = discrepancies.iter().map(|d| d.field.as_str()).collect();
    assert_eq!(
        fields,
        vec!["status", "crop", "quantity", "unit", "current_org"]
    );
}
