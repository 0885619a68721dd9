//! Catalogue, sales and purchases.

mod common;

use std::sync::Arc;

use common::*;
use shopdesk_core::{CoreError, Money, PaymentMethod, Permission, Product, PurchaseItem, ValidationError};
use shopdesk_store::{resources, StoreError};
use shopdesk_data::{
    DataError, NewProduct, NewPurchase, NewSale, NewSaleItem, NotifyEvent, ProductFilter,
    ProductUpdate,
};

fn screen(stock: i64) -> NewProduct {
    NewProduct {
        sku: " scr-iph11 ".into(),
        name: "iPhone 11 screen".into(),
        category: Some("Screens".into()),
        price_cents: 4_990,
        cost_cents: Some(2_500),
        stock,
    }
}

fn sale_of(product: &Product, quantity: i64, method: PaymentMethod, installments: u32) -> NewSale {
    NewSale {
        customer_name: Some(" Ana ".into()),
        items: vec![NewSaleItem {
            product_id: product.id.clone(),
            quantity,
        }],
        payment_method: method,
        installments,
    }
}

#[tokio::test]
async fn test_create_product_normalizes_sku() {
    let h = harness();
    let product = h.layer.products().create(&admin(), screen(3)).await.unwrap();

    assert_eq!(product.sku, "SCR-IPH11");
    assert!(product.active);
    assert_eq!(h.layer.products().get(&product.id).await.unwrap(), product);
}

#[tokio::test]
async fn test_duplicate_sku_is_rejected() {
    let h = harness();
    h.layer.products().create(&admin(), screen(3)).await.unwrap();

    let err = h.layer.products().create(&admin(), screen(1)).await.unwrap_err();
    match err {
        DataError::Core(CoreError::Validation(ValidationError::Duplicate { field, value })) => {
            assert_eq!(field, "sku");
            assert_eq!(value, "SCR-IPH11");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_catalogue_changes_need_inventory_permission() {
    let h = harness();
    let err = h.layer.products().create(&cashier("u1"), screen(3)).await.unwrap_err();
    assert!(matches!(err, DataError::Core(CoreError::MissingPermission { .. })));

    let stockist = with_permissions("u9", &[Permission::ManageInventory]);
    h.layer.products().create(&stockist, screen(3)).await.unwrap();
}

#[tokio::test]
async fn test_deactivated_products_drop_out_of_active_listing() {
    let h = harness();
    let products = h.layer.products();
    let product = products.create(&admin(), screen(3)).await.unwrap();

    assert_eq!(products.list(&ProductFilter::active()).await.unwrap().len(), 1);
    products.deactivate(&admin(), &product.id).await.unwrap();
    assert!(products.list(&ProductFilter::active()).await.unwrap().is_empty());
    assert_eq!(products.list(&ProductFilter::default()).await.unwrap().len(), 1);

    let updated = products
        .update(
            &admin(),
            &product.id,
            ProductUpdate {
                price_cents: Some(5_490),
                ..ProductUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.price_cents, 5_490);
}

#[tokio::test]
async fn test_search_matches_name_or_sku() {
    let h = harness();
    h.layer.products().create(&admin(), screen(3)).await.unwrap();

    let filter = ProductFilter {
        search: Some("iphone".into()),
        ..ProductFilter::default()
    };
    assert_eq!(h.layer.products().list(&filter).await.unwrap().len(), 1);

    let filter = ProductFilter {
        search: Some("battery".into()),
        ..ProductFilter::default()
    };
    assert!(h.layer.products().list(&filter).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_adjust_stock_never_goes_negative() {
    let h = harness();
    let product = h.layer.products().create(&admin(), screen(2)).await.unwrap();

    let product = h
        .layer
        .products()
        .adjust_stock(&admin(), &product.id, 5, "recount")
        .await
        .unwrap();
    assert_eq!(product.stock, 7);

    let err = h
        .layer
        .products()
        .adjust_stock(&admin(), &product.id, -8, "broken")
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Core(CoreError::InsufficientStock { .. })));
}

#[tokio::test]
async fn test_adjust_stock_rejects_overflow() {
    let h = harness();
    let product = h.layer.products().create(&admin(), screen(2)).await.unwrap();

    let err = h
        .layer
        .products()
        .adjust_stock(&admin(), &product.id, i64::MAX, "scanner glitch")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
    ));

    let err = h
        .layer
        .products()
        .adjust_stock(&admin(), &product.id, i64::MIN, "scanner glitch")
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Core(CoreError::InsufficientStock { .. })));
    assert_eq!(h.layer.products().get(&product.id).await.unwrap().stock, 2);
}

#[tokio::test]
async fn test_cash_sale_deposits_into_open_register() {
    let h = harness();
    let product = h.layer.products().create(&admin(), screen(3)).await.unwrap();
    let seller = cashier("u1");
    let session = h
        .layer
        .cash_sessions()
        .open_register(&seller, "u1", Money::from_cents(10_000))
        .await
        .unwrap();

    let sale = h
        .layer
        .sales()
        .record(&seller, sale_of(&product, 2, PaymentMethod::Cash, 1))
        .await
        .unwrap();

    assert_eq!(sale.total_cents, 9_980);
    assert_eq!(sale.customer_name.as_deref(), Some("Ana"));
    assert_eq!(sale.cash_session_id.as_deref(), Some(session.id.as_str()));

    let session = h.layer.cash_sessions().get_session(&session.id).await.unwrap();
    assert_eq!(session.cash_in_register, Money::from_cents(19_980));
    assert_eq!(session.deposits, Money::from_cents(9_980));
    assert_eq!(session.movements.len(), 1);

    assert_eq!(h.layer.products().get(&product.id).await.unwrap().stock, 1);
    assert_eq!(h.layer.sales().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cash_sale_without_register_is_still_recorded() {
    let h = harness();
    let product = h.layer.products().create(&admin(), screen(3)).await.unwrap();

    let sale = h
        .layer
        .sales()
        .record(&cashier("u1"), sale_of(&product, 1, PaymentMethod::Cash, 1))
        .await
        .unwrap();
    assert!(sale.cash_session_id.is_none());
    assert_eq!(h.layer.products().get(&product.id).await.unwrap().stock, 2);
}

#[tokio::test]
async fn test_sale_rejects_insufficient_stock() {
    let h = harness();
    let product = h.layer.products().create(&admin(), screen(1)).await.unwrap();

    let err = h
        .layer
        .sales()
        .record(&cashier("u1"), sale_of(&product, 2, PaymentMethod::Pix, 1))
        .await
        .unwrap_err();
    match err {
        DataError::Core(CoreError::InsufficientStock {
            sku,
            available,
            requested,
        }) => {
            assert_eq!(sku, "SCR-IPH11");
            assert_eq!(available, 1);
            assert_eq!(requested, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.layer.sales().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_only_credit_sales_can_be_split() {
    let h = harness();
    let product = h.layer.products().create(&admin(), screen(3)).await.unwrap();

    let err = h
        .layer
        .sales()
        .record(&cashier("u1"), sale_of(&product, 1, PaymentMethod::Debit, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Core(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_credit_installments_carry_surcharge() {
    let mut config = config();
    config.sales.credit_surcharge_bps = 299;
    let h = HarnessBuilder::new().config(config).build();
    let product = h.layer.products().create(&admin(), screen(3)).await.unwrap();

    let split = h
        .layer
        .sales()
        .record(&cashier("u1"), sale_of(&product, 2, PaymentMethod::Credit, 3))
        .await
        .unwrap();
    assert_eq!(split.total_cents, 10_278);
    assert_eq!(split.installments, 3);

    let single = h
        .layer
        .sales()
        .record(&cashier("u1"), sale_of(&product, 1, PaymentMethod::Credit, 1))
        .await
        .unwrap();
    assert_eq!(single.total_cents, 4_990);
}

#[tokio::test]
async fn test_sales_and_purchases_notify_in_background() {
    let h = harness();
    let product = h.layer.products().create(&admin(), screen(3)).await.unwrap();

    h.layer
        .sales()
        .record(&cashier("u1"), sale_of(&product, 1, PaymentMethod::Pix, 1))
        .await
        .unwrap();
    h.layer
        .purchases()
        .record(
            &admin(),
            NewPurchase {
                supplier: "Parts Co".into(),
                items: vec![PurchaseItem {
                    product_id: product.id.clone(),
                    quantity: 4,
                    unit_cost_cents: 2_400,
                }],
            },
        )
        .await
        .unwrap();
    h.layer.flush().await;

    let events = h.notifier.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().any(|e| matches!(
        e,
        NotifyEvent::SaleRecorded { seller, total, item_count: 1, .. }
            if seller == "Cashier u1" && *total == Money::from_cents(4_990)
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        NotifyEvent::PurchaseRecorded { supplier, total, item_count: 1, .. }
            if supplier == "Parts Co" && *total == Money::from_cents(9_600)
    )));
}

#[tokio::test]
async fn test_purchase_restocks_and_requires_permission() {
    let h = harness();
    let product = h.layer.products().create(&admin(), screen(1)).await.unwrap();
    let input = NewPurchase {
        supplier: "Parts Co".into(),
        items: vec![PurchaseItem {
            product_id: product.id.clone(),
            quantity: 5,
            unit_cost_cents: 2_400,
        }],
    };

    let err = h
        .layer
        .purchases()
        .record(&cashier("u1"), input.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Core(CoreError::MissingPermission { .. })));

    let purchase = h.layer.purchases().record(&admin(), input).await.unwrap();
    assert_eq!(purchase.total_cents, 12_000);
    assert_eq!(h.layer.products().get(&product.id).await.unwrap().stock, 6);
    assert_eq!(h.layer.purchases().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_product_in_purchase() {
    let h = harness();
    let err = h
        .layer
        .purchases()
        .record(
            &admin(),
            NewPurchase {
                supplier: "Parts Co".into(),
                items: vec![PurchaseItem {
                    product_id: "missing".into(),
                    quantity: 1,
                    unit_cost_cents: 100,
                }],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Core(CoreError::ProductNotFound(_))));
}

// =============================================================================
// Partial failures
// =============================================================================

fn rejecting_harness() -> (Harness, Arc<RejectingStore>) {
    let store = Arc::new(shopdesk_store::MemoryStore::new());
    let rejecting = Arc::new(RejectingStore::new(store.clone()));
    let h = HarnessBuilder::new()
        .store(store)
        .remote(rejecting.clone())
        .build();
    (h, rejecting)
}

#[tokio::test]
async fn test_failed_session_link_does_not_fail_the_sale() {
    let (h, store) = rejecting_harness();
    let product = h.layer.products().create(&admin(), screen(5)).await.unwrap();
    let seller = cashier("u1");
    let session = h
        .layer
        .cash_sessions()
        .open_register(&seller, "u1", Money::from_cents(1_000))
        .await
        .unwrap();
    assert!(h.layer.sales().list().await.unwrap().is_empty());
    store.reject_updates(resources::SALES);

    let sale = h
        .layer
        .sales()
        .record(&seller, sale_of(&product, 1, PaymentMethod::Cash, 1))
        .await
        .unwrap();
    assert!(sale.cash_session_id.is_none());

    // Everything after the link write still happened.
    assert_eq!(h.store.dump(resources::SALES).await.len(), 1);
    assert_eq!(h.layer.sales().list().await.unwrap().len(), 1);
    assert_eq!(h.layer.products().get(&product.id).await.unwrap().stock, 4);
    let session = h.layer.cash_sessions().get_session(&session.id).await.unwrap();
    assert_eq!(session.cash_in_register, Money::from_cents(5_990));
    assert_eq!(session.movements.len(), 1);

    h.layer.flush().await;
    let audit = h.store.dump(resources::AUDIT_LOGS).await;
    assert!(audit.iter().any(|row| row["action"] == "sale"));
    assert_eq!(h.notifier.events().len(), 1);
}

#[tokio::test]
async fn test_failed_stock_write_still_clears_sale_caches() {
    let (h, store) = rejecting_harness();
    let product = h.layer.products().create(&admin(), screen(3)).await.unwrap();
    h.layer.sales().list().await.unwrap();
    h.layer.products().list(&ProductFilter::default()).await.unwrap();
    store.reject_updates(resources::PRODUCTS);

    let sale = h
        .layer
        .sales()
        .record(&cashier("u1"), sale_of(&product, 2, PaymentMethod::Pix, 1))
        .await
        .unwrap();

    assert_eq!(sale.total_cents, 9_980);
    assert!(!h.layer.cache().contains(resources::SALES).await);
    assert!(!h.layer.cache().contains(resources::PRODUCTS).await);
    assert_eq!(h.layer.sales().list().await.unwrap().len(), 1);
    assert_eq!(h.layer.products().get(&product.id).await.unwrap().stock, 3);
}

#[tokio::test]
async fn test_failed_restock_keeps_purchase_and_clears_caches() {
    let (h, store) = rejecting_harness();
    let product = h.layer.products().create(&admin(), screen(1)).await.unwrap();
    h.layer.purchases().list().await.unwrap();
    h.layer.products().list(&ProductFilter::default()).await.unwrap();
    store.reject_updates(resources::PRODUCTS);

    let purchase = h
        .layer
        .purchases()
        .record(
            &admin(),
            NewPurchase {
                supplier: "Parts Co".into(),
                items: vec![PurchaseItem {
                    product_id: product.id.clone(),
                    quantity: 5,
                    unit_cost_cents: 2_400,
                }],
            },
        )
        .await
        .unwrap();

    assert_eq!(purchase.total_cents, 12_000);
    assert_eq!(h.store.dump(resources::PURCHASES).await.len(), 1);
    assert!(!h.layer.cache().contains(resources::PURCHASES).await);
    assert!(!h.layer.cache().contains(resources::PRODUCTS).await);
    assert_eq!(h.layer.purchases().list().await.unwrap().len(), 1);
    assert_eq!(h.layer.products().get(&product.id).await.unwrap().stock, 1);
}

#[tokio::test]
async fn test_failed_register_write_rejects_sale_deposit_only() {
    let (h, store) = rejecting_harness();
    let product = h.layer.products().create(&admin(), screen(2)).await.unwrap();
    let seller = cashier("u1");
    let session = h
        .layer
        .cash_sessions()
        .open_register(&seller, "u1", Money::from_cents(1_000))
        .await
        .unwrap();
    store.reject_updates(resources::CASH_SESSIONS);

    let sale = h
        .layer
        .sales()
        .record(&seller, sale_of(&product, 1, PaymentMethod::Cash, 1))
        .await
        .unwrap();
    assert!(sale.cash_session_id.is_none());

    let stored = h.layer.cash_sessions().get_session(&session.id).await.unwrap();
    assert_eq!(stored.cash_in_register, Money::from_cents(1_000));
    assert!(stored.movements.is_empty());
    assert_eq!(h.layer.products().get(&product.id).await.unwrap().stock, 1);

    let err = h
        .layer
        .cash_sessions()
        .record_movement(&seller, &session.id, shopdesk_core::MovementKind::Deposit, Money::from_cents(500), "float")
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Store(StoreError::Backend(_))));
}
