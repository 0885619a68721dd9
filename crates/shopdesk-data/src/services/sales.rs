//! Point-of-sale: recording sales and listing them.
//!
//! ```text
//! record(actor, NewSale)
//!   1. validate items, quantities, installments
//!   2. load products, check stock, snapshot name & price
//!   3. total = Σ lines (+ surcharge for split credit)
//!   4. insert sale
//!   5. cash? ──► deposit into the seller's open register
//!   6. decrement stock
//!   7. clear [sales, products], audit, notify
//! ```

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use shopdesk_core::validation::{validate_installments, validate_quantity};
use shopdesk_core::{
    Actor, AuditAction, AuditEntity, CoreError, InstallmentPlan, Money, PaymentMethod, Sale,
    SaleItem, ValidationError,
};
use shopdesk_store::{resources, Direction, Query};
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::DataContext;
use crate::error::DataResult;
use crate::notify::NotifyEvent;
use crate::services::cash_sessions::CashSessionService;
use crate::services::products::ProductService;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSaleItem {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSale {
    #[serde(default)]
    pub customer_name: Option<String>,
    pub items: Vec<NewSaleItem>,
    pub payment_method: PaymentMethod,
    #[serde(default = "one")]
    pub installments: u32,
}

fn one() -> u32 {
    1
}

#[derive(Clone)]
pub struct SaleService {
    ctx: Arc<DataContext>,
    products: ProductService,
    cash_sessions: CashSessionService,
}

impl SaleService {
    pub(crate) fn new(ctx: Arc<DataContext>, products: ProductService, cash_sessions: CashSessionService) -> Self {
        Self {
            ctx,
            products,
            cash_sessions,
        }
    }

    pub async fn list(&self) -> DataResult<Vec<Sale>> {
        let remote = self.ctx.remote.clone();
        let query = Query::new(resources::SALES).order_by("created_at", Direction::Desc);
        self.ctx
            .cache
            .fetch_with_cache(resources::SALES, self.ctx.volatile_ttl(), || async move {
                remote.select_as::<Sale>(&query).await
            })
            .await
    }

    pub async fn record(&self, actor: &Actor, input: NewSale) -> DataResult<Sale> {
        if input.items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".into(),
            }
            .into());
        }
        validate_installments(input.installments)?;
        if input.installments > 1 && input.payment_method != PaymentMethod::Credit {
            return Err(ValidationError::InvalidFormat {
                field: "installments".into(),
                reason: "only credit sales can be split".into(),
            }
            .into());
        }

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            validate_quantity(line.quantity)?;
            let product = self.products.get(&line.product_id).await?;
            if !product.active {
                return Err(CoreError::ProductNotFound(product.id).into());
            }
            if !product.can_sell(line.quantity) {
                return Err(CoreError::InsufficientStock {
                    sku: product.sku,
                    available: product.stock,
                    requested: line.quantity,
                }
                .into());
            }
            items.push(SaleItem {
                product_id: product.id,
                name: product.name,
                quantity: line.quantity,
                unit_price_cents: product.price_cents,
            });
        }

        let subtotal: Money = items.iter().map(SaleItem::line_total).sum();
        let total = if input.payment_method == PaymentMethod::Credit {
            InstallmentPlan::new(subtotal, input.installments, self.ctx.config.sales.credit_surcharge_bps)?
                .financed_total
        } else {
            subtotal
        };

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            user_id: actor.user_id.clone(),
            customer_name: input
                .customer_name
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            items,
            total_cents: total.cents(),
            payment_method: input.payment_method,
            installments: input.installments,
            cash_session_id: None,
            created_at: self.ctx.now(),
        };
        let mut sale: Sale = self
            .ctx
            .remote
            .insert_model(resources::SALES, &sale, None)
            .await?;

        if sale.payment_method == PaymentMethod::Cash && total.is_positive() {
            match self.cash_sessions.deposit_sale(actor, &sale.id, total).await {
                Ok(Some(session_id)) => {
                    match self
                        .ctx
                        .remote
                        .update_as::<Sale, _>(resources::SALES, &sale.id, &json!({ "cashSessionId": session_id }))
                        .await
                    {
                        Ok(linked) => sale = linked,
                        Err(e) => {
                            warn!(sale_id = %sale.id, %session_id, error = %e, "Sale not linked to its cash session")
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(sale_id = %sale.id, error = %e, "Cash sale not deposited"),
            }
        }

        for item in &sale.items {
            if let Err(e) = self.products.apply_stock_delta(&item.product_id, -item.quantity).await {
                warn!(sale_id = %sale.id, product_id = %item.product_id, error = %e, "Stock not decremented");
            }
        }

        info!(sale_id = %sale.id, total = %total, "Sale recorded");
        self.ctx
            .cache
            .clear_cache(&[resources::SALES, resources::PRODUCTS])
            .await;
        self.ctx.audit.record(
            actor,
            AuditAction::Sale,
            AuditEntity::Sale,
            &sale.id,
            format!(
                "{} item(s), {} via {}",
                sale.items.len(),
                self.ctx.config.locale.currency.format(total),
                sale.payment_method.label()
            ),
        );
        self.ctx.notify(NotifyEvent::SaleRecorded {
            sale_id: sale.id.clone(),
            seller: actor.user_name.clone(),
            customer: sale.customer_name.clone(),
            total,
            payment_method: sale.payment_method,
            installments: sale.installments,
            item_count: sale.items.len(),
        });
        Ok(sale)
    }
}
