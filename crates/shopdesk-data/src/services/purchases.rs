//! Stock received from suppliers.

use std::sync::Arc;

use serde::Deserialize;
use shopdesk_core::validation::{validate_name, validate_non_negative_cents, validate_quantity};
use shopdesk_core::{
    Actor, AuditAction, AuditEntity, CoreError, Money, Permission, Purchase, PurchaseItem,
    ValidationError,
};
use shopdesk_store::{resources, Direction, Query};
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::DataContext;
use crate::error::DataResult;
use crate::notify::NotifyEvent;
use crate::services::products::ProductService;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchase {
    pub supplier: String,
    pub items: Vec<PurchaseItem>,
}

#[derive(Clone)]
pub struct PurchaseService {
    ctx: Arc<DataContext>,
    products: ProductService,
}

impl PurchaseService {
    pub(crate) fn new(ctx: Arc<DataContext>, products: ProductService) -> Self {
        Self { ctx, products }
    }

    pub async fn list(&self) -> DataResult<Vec<Purchase>> {
        let remote = self.ctx.remote.clone();
        let query = Query::new(resources::PURCHASES).order_by("created_at", Direction::Desc);
        self.ctx
            .cache
            .fetch_with_cache(resources::PURCHASES, self.ctx.volatile_ttl(), || async move {
                remote.select_as::<Purchase>(&query).await
            })
            .await
    }

    pub async fn record(&self, actor: &Actor, input: NewPurchase) -> DataResult<Purchase> {
        if !actor.has(Permission::ManageInventory) {
            return Err(CoreError::MissingPermission {
                action: "record purchases".into(),
            }
            .into());
        }
        validate_name("supplier", &input.supplier)?;
        if input.items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".into(),
            }
            .into());
        }
        for item in &input.items {
            validate_quantity(item.quantity)?;
            validate_non_negative_cents("unitCostCents", item.unit_cost_cents)?;
            self.products.get(&item.product_id).await?;
        }

        let total: Money = input.items.iter().map(PurchaseItem::line_total).sum();
        let purchase = Purchase {
            id: Uuid::new_v4().to_string(),
            user_id: actor.user_id.clone(),
            supplier: input.supplier.trim().to_string(),
            items: input.items,
            total_cents: total.cents(),
            created_at: self.ctx.now(),
        };
        let purchase: Purchase = self
            .ctx
            .remote
            .insert_model(resources::PURCHASES, &purchase, None)
            .await?;

        for item in &purchase.items {
            if let Err(e) = self.products.apply_stock_delta(&item.product_id, item.quantity).await {
                warn!(purchase_id = %purchase.id, product_id = %item.product_id, error = %e, "Stock not incremented");
            }
        }

        info!(purchase_id = %purchase.id, supplier = %purchase.supplier, "Purchase recorded");
        self.ctx
            .cache
            .clear_cache(&[resources::PURCHASES, resources::PRODUCTS])
            .await;
        self.ctx.audit.record(
            actor,
            AuditAction::Purchase,
            AuditEntity::Purchase,
            &purchase.id,
            format!(
                "{} item(s) from {}, {}",
                purchase.items.len(),
                purchase.supplier,
                self.ctx.config.locale.currency.format(total)
            ),
        );
        self.ctx.notify(NotifyEvent::PurchaseRecorded {
            purchase_id: purchase.id.clone(),
            supplier: purchase.supplier.clone(),
            total,
            item_count: purchase.items.len(),
        });
        Ok(purchase)
    }
}
