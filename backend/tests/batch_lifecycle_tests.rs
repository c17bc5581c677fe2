//! Tests for the batch lifecycle transition table
//! Verifies that the state graph admits exactly the five legal
//! transitions and nothing else, and that crop defaults resolve correctly.

use proptest::prelude::*;

use tracesafe_backend::models::batch::{
    crop_profile, generate_batch_id, transition, ActorRole, BatchAction, BatchStatus,
    TransitionGuard,
};

const ALL_STATUSES: [BatchStatus; 5] = [
    BatchStatus::Created,
    BatchStatus::InTransit,
    BatchStatus::Delivered,
    BatchStatus::Received,
    BatchStatus::Sold,
];

const ALL_ACTIONS: [BatchAction; 5] = [
    BatchAction::Pickup,
    BatchAction::TransitUpdate,
    BatchAction::Deliver,
    BatchAction::Receive,
    BatchAction::Sell,
];

mod transition_table {
    use super::*;

    #[test]
    fn pickup_moves_created_to_in_transit() {
        let t = transition(BatchStatus::Created, BatchAction::Pickup).unwrap();
        assert_eq!(t.next, BatchStatus::InTransit);
        assert_eq!(t.guard, TransitionGuard::None);
    }

    #[test]
    fn transit_update_keeps_batch_in_transit() {
        let t = transition(BatchStatus::InTransit, BatchAction::TransitUpdate).unwrap();
        assert_eq!(t.next, BatchStatus::InTransit);
        assert_eq!(t.guard, TransitionGuard::OwningDriver);
    }

    #[test]
    fn deliver_moves_in_transit_to_delivered() {
        let t = transition(BatchStatus::InTransit, BatchAction::Deliver).unwrap();
        assert_eq!(t.next, BatchStatus::Delivered);
        assert_eq!(t.guard, TransitionGuard::OwningDriver);
    }

    #[test]
    fn receive_requires_delivered_status() {
        let t = transition(BatchStatus::Delivered, BatchAction::Receive).unwrap();
        assert_eq!(t.next, BatchStatus::Received);
        assert_eq!(t.guard, TransitionGuard::DesignatedRetailer);

        // The driver must confirm delivery first; receiving straight from
        // transit is not a legal move.
        assert!(transition(BatchStatus::InTransit, BatchAction::Receive).is_none());
    }

    #[test]
    fn sell_moves_received_to_sold() {
        let t = transition(BatchStatus::Received, BatchAction::Sell).unwrap();
        assert_eq!(t.next, BatchStatus::Sold);
        assert_eq!(t.guard, TransitionGuard::OwningRetailer);
    }

    #[test]
    fn sold_is_terminal() {
        for action in ALL_ACTIONS {
            assert!(transition(BatchStatus::Sold, action).is_none());
        }
    }

    #[test]
    fn pickup_is_not_repeatable() {
        assert!(transition(BatchStatus::InTransit, BatchAction::Pickup).is_none());
        assert!(transition(BatchStatus::Delivered, BatchAction::Pickup).is_none());
    }

    #[test]
    fn exactly_five_pairs_are_legal() {
        let mut legal = 0;
        for status in ALL_STATUSES {
            for action in ALL_ACTIONS {
                if transition(status, action).is_some() {
                    legal += 1;
                }
            }
        }
        assert_eq!(legal, 5);
    }

    #[test]
    fn event_types_match_recorded_history() {
        assert_eq!(BatchAction::Pickup.event_type(), "pickup");
        assert_eq!(BatchAction::TransitUpdate.event_type(), "transit_update");
        assert_eq!(BatchAction::Deliver.event_type(), "delivery");
        assert_eq!(BatchAction::Receive.event_type(), "received");
        assert_eq!(BatchAction::Sell.event_type(), "sold");
    }
}

mod lost_race_rejections {
    use tracesafe_backend::error::AppError;
    use tracesafe_backend::models::batch::BatchAction;
    use tracesafe_backend::services::batch::stale_transition_error;

    #[test]
    fn overtaken_receive_reports_the_committed_status() {
        // Two retailers race to receive; the second one's conditional write
        // matches nothing and is rejected against what actually committed.
        let err = stale_transition_error(BatchAction::Receive, "received".to_string());
        match err {
            AppError::GuardViolation {
                message,
                current_status,
            } => {
                assert_eq!(current_status, "received");
                assert_eq!(message, "Batch must be delivered before it can be received");
            }
            other => panic!("expected a guard violation, got {:?}", other),
        }
    }

    #[test]
    fn overtaken_sell_reports_terminal_status() {
        let err = stale_transition_error(BatchAction::Sell, "sold".to_string());
        match err {
            AppError::GuardViolation { current_status, .. } => {
                assert_eq!(current_status, "sold");
            }
            other => panic!("expected a guard violation, got {:?}", other),
        }
    }
}

mod status_codec {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in ALL_STATUSES {
            assert_eq!(BatchStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn unknown_status_string_is_rejected() {
        assert_eq!(BatchStatus::from_str("shipped"), None);
        assert_eq!(BatchStatus::from_str(""), None);
    }

    #[test]
    fn roles_map_to_ledger_organizations() {
        assert_eq!(ActorRole::Farmer.ledger_org(), "FarmerOrgMSP");
        assert_eq!(ActorRole::Driver.ledger_org(), "DriverOrgMSP");
        assert_eq!(ActorRole::Retailer.ledger_org(), "RetailerOrgMSP");
        assert_eq!(ActorRole::Admin.ledger_org(), "RegulatorOrgMSP");
    }
}

mod crop_profiles {
    use super::*;

    #[test]
    fn known_crops_get_their_storage_profile() {
        let lettuce = crop_profile("lettuce");
        assert_eq!(lettuce.code, 0);
        assert_eq!(lettuce.crate_temp, 4.0);
        assert_eq!(lettuce.reefer_temp, 2.0);
        assert_eq!(lettuce.humidity, 95.0);

        let tomato = crop_profile("tomato");
        assert_eq!(tomato.code, 1);
        assert_eq!(tomato.crate_temp, 13.0);

        let wheat = crop_profile("wheat");
        assert_eq!(wheat.code, 4);
        assert_eq!(wheat.humidity, 60.0);
    }

    #[test]
    fn crop_lookup_ignores_case_and_whitespace() {
        assert_eq!(crop_profile("  Mango  ").code, 2);
        assert_eq!(crop_profile("POTATO").code, 6);
    }

    #[test]
    fn unknown_crop_gets_generic_profile() {
        let profile = crop_profile("durian");
        assert_eq!(profile.code, -1);
        assert_eq!(profile.crate_temp, 10.0);
        assert_eq!(profile.reefer_temp, 8.0);
        assert_eq!(profile.humidity, 80.0);
    }
}

mod batch_ids {
    use super::*;

    #[test]
    fn batch_id_has_crop_year_suffix_shape() {
        let id = generate_batch_id("tomato");
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TOM");
        assert_eq!(parts[1].len(), 4);
        let suffix: u32 = parts[2].parse().unwrap();
        assert!((1000..=9999).contains(&suffix));
    }

    #[test]
    fn empty_crop_falls_back_to_generic_prefix() {
        let id = generate_batch_id("   ");
        assert!(id.starts_with("BAT-"));
    }

    #[test]
    fn non_alphanumeric_characters_are_dropped() {
        let id = generate_batch_id("b-ok choy");
        assert!(id.starts_with("BOK-"));
    }
}

mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any resolved transition lands on a status that is further along
        /// the lifecycle, never backwards.
        #[test]
        fn transitions_never_move_backwards(
            status_idx in 0usize..5,
            action_idx in 0usize..5,
        ) {
            let status = ALL_STATUSES[status_idx];
            let action = ALL_ACTIONS[action_idx];

            if let Some(t) = transition(status, action) {
                let order = |s: BatchStatus| ALL_STATUSES.iter().position(|x| *x == s).unwrap();
                prop_assert!(order(t.next) >= order(status));
            }
        }

        /// Generated batch ids always parse back into the three-part shape
        /// with an in-range numeric suffix.
        #[test]
        fn batch_ids_are_well_formed(crop in "[a-zA-Z]{1,12}") {
            let id = generate_batch_id(&crop);
            let parts: Vec<&str> = id.split('-').collect();
            prop_assert_eq!(parts.len(), 3);
            prop_assert!(!parts[0].is_empty() && parts[0].len() <= 3);
            prop_assert!(parts[0].chars().all(|c| c.is_ascii_uppercase()));
            let suffix: u32 = parts[2].parse().unwrap();
            prop_assert!((1000..=9999).contains(&suffix));
        }

        /// Crop profile lookup is total: every input yields a usable profile.
        #[test]
        fn crop_profile_is_total(crop in ".*") {
            let profile = crop_profile(&crop);
            prop_assert!(profile.code >= -1);
            prop_assert!(profile.humidity > 0.0);
        }
    }
}
