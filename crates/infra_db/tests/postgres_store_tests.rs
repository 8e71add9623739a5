//! Integration tests for the PostgreSQL adapters
//!
//! These tests start a PostgreSQL container and are ignored by default;
//! run them with `cargo test -p infra_db -- --ignored`.

use std::sync::Arc;

use rust_decimal_macros::dec;

use core_kernel::{BookingId, PortError, TenantId};
use domain_folio::*;
use infra_db::PostgresLedgerStore;
use test_utils::{
    assert_error_kind, assert_folio_closed, get_shared_test_database, InvoiceFixtures,
    LedgerHarness,
};

async fn harness() -> (LedgerHarness, Arc<PostgresLedgerStore>) {
    let store = get_shared_test_database().await.ledger_store();
    let harness = LedgerHarness::builder().with_store(store.clone()).build();
    (harness, store)
}

mod store_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_reference_stay_round_trips_through_postgres() {
        let (harness, store) = harness().await;
        let booking = harness.new_booking().await;
        let guest = harness.open_folio(booking, FolioType::Guest).await.unwrap();
        let company = harness.open_folio(booking, FolioType::Company).await.unwrap();

        let room = harness.post_room_charge(guest.id).await.unwrap();
        harness.pay(guest.id, dec!(100)).await.unwrap();
        assert_eq!(harness.balance(guest.id).await.unwrap(), dec!(77.00));

        harness.transfer(guest.id, company.id, vec![room.id]).await.unwrap();
        assert_eq!(harness.balance(guest.id).await.unwrap(), dec!(-100.00));
        assert_eq!(harness.balance(company.id).await.unwrap(), dec!(177.00));

        let transfers = store.transfers_for_folio(harness.tenant_id, company.id).await.unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].charge_ids, vec![room.id]);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_versions_are_bumped_by_store() {
        let (harness, store) = harness().await;
        let booking = harness.new_booking().await;
        let guest = harness.open_folio(booking, FolioType::Guest).await.unwrap();
        assert_eq!(guest.version, 0);

        let charge = harness.post_room_charge(guest.id).await.unwrap();
        harness.pay(guest.id, dec!(10)).await.unwrap();

        let stored = store.get_folio(harness.tenant_id, guest.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);

        harness
            .service
            .void_charge(
                &harness.clerk(),
                &VoidCharge {
                    charge_id: charge.id,
                    reason: "posted twice".to_string(),
                },
            )
            .await
            .unwrap();
        let voided = store.get_charge(harness.tenant_id, charge.id).await.unwrap().unwrap();
        assert!(voided.voided);
        assert_eq!(voided.version, 1);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_stale_folio_version_is_conflict() {
        let (harness, store) = harness().await;
        let booking = harness.new_booking().await;
        let guest = harness.open_folio(booking, FolioType::Guest).await.unwrap();
        harness.post_room_charge(guest.id).await.unwrap();

        let mut closed = guest.clone();
        closed.close("night-audit", None).unwrap();
        let changes = ChangeSet::new(harness.tenant_id)
            .require(Precondition::FolioVersion {
                folio_id: guest.id,
                version: 0,
            })
            .write(LedgerWrite::UpdateFolio(closed));

        let result = store.commit(changes).await;
        assert!(matches!(result, Err(PortError::Conflict { .. })));
        let stored = store.get_folio(harness.tenant_id, guest.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FolioStatus::Open);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_second_open_folio_rejected_by_index() {
        let (harness, store) = harness().await;
        let booking = harness.new_booking().await;
        harness.open_folio(booking, FolioType::Guest).await.unwrap();

        let duplicate = Folio::open(
            harness.tenant_id,
            booking,
            FolioType::Guest,
            core_kernel::PartyId::new(),
            format_folio_number(2099, 1),
            core_kernel::Currency::EUR,
        );
        let result = store
            .commit(ChangeSet::new(harness.tenant_id).write(LedgerWrite::InsertFolio(duplicate)))
            .await;

        match result {
            Err(PortError::AlreadyExists { entity_type, .. }) => assert_eq!(entity_type, "OpenFolio"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_failed_write_rolls_back_whole_change_set() {
        let (harness, store) = harness().await;
        let booking = harness.new_booking().await;
        let guest = harness.open_folio(booking, FolioType::Guest).await.unwrap();
        let before = store.audit_entries(harness.tenant_id, &AuditQuery::default()).await.unwrap().len();

        let ctx = harness.clerk();
        let missing = Folio::open(
            harness.tenant_id,
            booking,
            FolioType::Company,
            core_kernel::PartyId::new(),
            format_folio_number(2099, 2),
            core_kernel::Currency::EUR,
        );
        let changes = ChangeSet::new(harness.tenant_id)
            .require(Precondition::FolioOpen(guest.id))
            .audit(AuditEntry::new(&ctx, AuditAction::FolioClosed, EntityType::Folio, guest.id))
            .write(LedgerWrite::UpdateFolio(missing));

        assert!(store.commit(changes).await.is_err());
        let after = store.audit_entries(harness.tenant_id, &AuditQuery::default()).await.unwrap().len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_cross_tenant_reads_are_empty() {
        let (harness, store) = harness().await;
        let booking = harness.new_booking().await;
        let guest = harness.open_folio(booking, FolioType::Guest).await.unwrap();

        assert!(store.get_folio(TenantId::new(), guest.id).await.unwrap().is_none());
        assert!(store
            .folios_for_booking(TenantId::new(), booking)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_sequences_increase_per_tenant_and_year() {
        let (_, store) = harness().await;
        let tenant_id = TenantId::new();

        let first = store.next_sequence(tenant_id, SequenceKind::Folio, 2026).await.unwrap();
        let second = store.next_sequence(tenant_id, SequenceKind::Folio, 2026).await.unwrap();
        let other_year = store.next_sequence(tenant_id, SequenceKind::Folio, 2027).await.unwrap();
        let invoice = store.next_sequence(tenant_id, SequenceKind::Invoice, 2026).await.unwrap();

        assert_eq!((first, second, other_year, invoice), (1, 2, 1, 1));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_invoice_snapshot_persisted() {
        let (harness, store) = harness().await;
        let invoice = harness
            .service
            .compile_invoice(
                &harness.clerk(),
                &CompileInvoice {
                    source: InvoiceSource::LineItems(InvoiceFixtures::corporate_lines()),
                    customer_info: InvoiceFixtures::customer(),
                    currency: None,
                },
            )
            .await
            .unwrap();

        let stored = store.get_invoice(harness.tenant_id, invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.total.amount(), dec!(657.00));
        assert_eq!(stored.vat_withholding.amount(), dec!(18.90));
        assert_eq!(stored.lines.len(), 2);
        assert_eq!(stored.customer, InvoiceFixtures::customer());

        let issued = harness.service.issue_invoice(&harness.clerk(), invoice.id).await.unwrap();
        assert_eq!(issued.status, InvoiceStatus::Issued);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_stale_invoice_status_is_conflict() {
        let (harness, store) = harness().await;
        let invoice = harness
            .service
            .compile_invoice(
                &harness.clerk(),
                &CompileInvoice {
                    source: InvoiceSource::LineItems(InvoiceFixtures::corporate_lines()),
                    customer_info: InvoiceFixtures::customer(),
                    currency: None,
                },
            )
            .await
            .unwrap();
        let mut stale = invoice.clone();
        stale.issue().unwrap();
        harness.service.issue_invoice(&harness.clerk(), invoice.id).await.unwrap();
        harness.service.mark_invoice_paid(&harness.clerk(), invoice.id).await.unwrap();

        let changes = ChangeSet::new(harness.tenant_id)
            .require(Precondition::InvoiceState { invoice_id: invoice.id, status: InvoiceStatus::Draft })
            .write(LedgerWrite::UpdateInvoice(stale));
        let result = store.commit(changes).await;
        assert!(matches!(result, Err(PortError::Conflict { .. })));
        let stored = store.get_invoice(harness.tenant_id, invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_stale_open_folio_count_is_conflict() {
        let (harness, store) = harness().await;
        let booking = harness.new_booking().await;
        let guest = harness.open_folio(booking, FolioType::Guest).await.unwrap();
        harness.open_folio(booking, FolioType::Company).await.unwrap();

        let mut closed = guest.clone();
        closed.close("night-audit", None).unwrap();
        let changes = ChangeSet::new(harness.tenant_id)
            .require(Precondition::OpenFolioCount { booking_id: booking, count: 1 })
            .require(Precondition::FolioVersion { folio_id: guest.id, version: guest.version })
            .write(LedgerWrite::UpdateFolio(closed));

        let result = store.commit(changes).await;
        assert!(matches!(result, Err(PortError::Conflict { .. })));
        let stored = store.get_folio(harness.tenant_id, guest.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FolioStatus::Open);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_settlement_over_postgres() {
        let (harness, _) = harness().await;
        let booking = harness.new_booking().await;
        let guest = harness.open_folio(booking, FolioType::Guest).await.unwrap();
        harness.post_room_charge(guest.id).await.unwrap();

        let refused = harness
            .service
            .settle_and_close(
                &harness.clerk(),
                &SettleAndClose {
                    booking_id: booking,
                    force: false,
                    reason: None,
                },
            )
            .await;
        assert_error_kind(&refused, ErrorKind::OutstandingBalance);

        harness.pay(guest.id, dec!(177)).await.unwrap();
        let outcome = harness
            .service
            .settle_and_close(
                &harness.clerk(),
                &SettleAndClose {
                    booking_id: booking,
                    force: false,
                    reason: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.folios_closed, vec![guest.id]);

        let statement = harness.service.get_folio(&harness.clerk(), guest.id).await.unwrap();
        assert_folio_closed(&statement.folio);
    }
}

mod stay_adapter_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_booking_checkout_and_housekeeping() {
        let stays = get_shared_test_database().await.stay_adapter();
        let tenant_id = TenantId::new();
        let booking_id = BookingId::new();

        assert!(!stays.booking_exists(tenant_id, booking_id).await.unwrap());
        stays
            .repository()
            .register_booking(tenant_id, booking_id, Some("101"))
            .await
            .unwrap();
        assert!(stays.booking_exists(tenant_id, booking_id).await.unwrap());
        assert!(!stays.booking_exists(TenantId::new(), booking_id).await.unwrap());

        stays.mark_checked_out(tenant_id, booking_id).await.unwrap();
        assert!(stays.repository().is_checked_out(tenant_id, booking_id).await.unwrap());

        stays.mark_room_dirty(tenant_id, booking_id).await.unwrap();
        assert_eq!(stays.repository().dirty_tasks(tenant_id, booking_id).await.unwrap(), 1);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_unknown_booking_checkout_is_not_found() {
        let stays = get_shared_test_database().await.stay_adapter();

        let result = stays.mark_checked_out(TenantId::new(), BookingId::new()).await;
        assert!(matches!(result, Err(PortError::NotFound { .. })));
    }
}
