use chrono::NaiveDate;
use duefirst::domain::installment::{CreditPlan, Installment};
use duefirst::domain::payment::AuditEntry;
use duefirst::domain::ports::{BookkeepingStoreBox, InstallmentStoreBox};
use duefirst::infrastructure::in_memory::{InMemoryBookkeepingStore, InMemoryInstallmentStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let installment_store: InstallmentStoreBox = Box::new(InMemoryInstallmentStore::new());
    let bookkeeping_store: BookkeepingStoreBox = Box::new(InMemoryBookkeepingStore::new());
    let due = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();

    // Verify Send + Sync by spawning tasks
    let is_handle = tokio::spawn(async move {
        installment_store
            .register_plan(CreditPlan {
                id: "p1".to_string(),
                client_id: "c1".to_string(),
            })
            .await
            .unwrap();
        installment_store
            .store(Installment::new("i1", "p1", 1, dec!(100), due))
            .await
            .unwrap();
        installment_store.unpaid_for_client("c1").await.unwrap()
    });

    let bk_handle = tokio::spawn(async move {
        bookkeeping_store
            .append_audit(AuditEntry {
                entity_id: "pay-1".to_string(),
                client_id: "c1".to_string(),
                amount: dec!(10),
                payment_date: due,
                applied_installments: vec!["i1".to_string()],
                total_applied: dec!(10),
                remaining_amount: Decimal::ZERO,
                recorded_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        bookkeeping_store.audit_entries().await.unwrap()
    });

    let unpaid = is_handle.await.unwrap();
    assert_eq!(unpaid.len(), 1);
    assert_eq!(unpaid[0].id, "i1");

    let audit = bk_handle.await.unwrap();
    assert_eq!(audit[0].entity_id, "pay-1");
}
