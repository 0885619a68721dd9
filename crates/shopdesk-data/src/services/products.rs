//! Inventory: product catalogue and stock levels.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use shopdesk_core::validation::{validate_name, validate_non_negative_cents, validate_sku};
use shopdesk_core::{Actor, AuditAction, AuditEntity, CoreError, Permission, Product, ValidationError};
use shopdesk_store::{resources, Direction, Filter, Query, StoreError};
use tracing::info;
use uuid::Uuid;

use crate::context::DataContext;
use crate::error::{DataError, DataResult};

/// Listing filter. Each distinct filter is cached under its own
/// `products_{json}` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Case-insensitive match on name or SKU.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ProductFilter {
    pub fn active() -> Self {
        Self {
            active: Some(true),
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn cache_key(&self) -> DataResult<String> {
        if self.is_empty() {
            return Ok(resources::PRODUCTS.to_string());
        }
        let json = serde_json::to_string(self).map_err(StoreError::from)?;
        Ok(format!("{}_{}", resources::PRODUCTS, json))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub cost_cents: Option<i64>,
    #[serde(default)]
    pub stock: i64,
}

/// Fields left `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_cents: Option<i64>,
}

#[derive(Clone)]
pub struct ProductService {
    ctx: Arc<DataContext>,
}

impl ProductService {
    pub(crate) fn new(ctx: Arc<DataContext>) -> Self {
        Self { ctx }
    }

    pub async fn list(&self, filter: &ProductFilter) -> DataResult<Vec<Product>> {
        let key = filter.cache_key()?;
        let remote = self.ctx.remote.clone();

        let mut query = Query::new(resources::PRODUCTS).order_by("name", Direction::Asc);
        if let Some(active) = filter.active {
            query = query.filter(Filter::eq("active", active));
        }
        if let Some(category) = &filter.category {
            query = query.filter(Filter::eq("category", category.as_str()));
        }
        let search = filter.search.as_ref().map(|s| s.trim().to_lowercase());

        self.ctx
            .cache
            .fetch_with_cache(&key, self.ctx.volatile_ttl(), || async move {
                let mut products = remote.select_as::<Product>(&query).await?;
                if let Some(needle) = search.filter(|s| !s.is_empty()) {
                    products.retain(|p| {
                        p.name.to_lowercase().contains(&needle) || p.sku.to_lowercase().contains(&needle)
                    });
                }
                Ok::<_, DataError>(products)
            })
            .await
    }

    pub async fn get(&self, id: &str) -> DataResult<Product> {
        self.ctx
            .remote
            .get_as::<Product>(resources::PRODUCTS, id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    pub async fn create(&self, actor: &Actor, input: NewProduct) -> DataResult<Product> {
        require_inventory(actor)?;
        let sku = input.sku.trim().to_uppercase();
        validate_sku(&sku)?;
        validate_name("name", &input.name)?;
        validate_non_negative_cents("priceCents", input.price_cents)?;
        if let Some(cost) = input.cost_cents {
            validate_non_negative_cents("costCents", cost)?;
        }
        validate_non_negative_cents("stock", input.stock)?;

        let now = self.ctx.now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.clone(),
            name: input.name.trim().to_string(),
            category: input.category.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            price_cents: input.price_cents,
            cost_cents: input.cost_cents,
            stock: input.stock,
            active: true,
            created_at: now,
            updated_at: now,
        };

        let product = self
            .ctx
            .remote
            .insert_model(resources::PRODUCTS, &product, Some(format!("sku:{sku}")))
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    ValidationError::Duplicate {
                        field: "sku".into(),
                        value: sku.clone(),
                    }
                    .into()
                } else {
                    e
                }
            })?;

        info!(product_id = %product.id, sku = %product.sku, "Product created");
        self.ctx.cache.clear_cache(&[resources::PRODUCTS]).await;
        self.ctx.audit.record(
            actor,
            AuditAction::Create,
            AuditEntity::Product,
            &product.id,
            format!("Created {} ({})", product.name, product.sku),
        );
        Ok(product)
    }

    pub async fn update(&self, actor: &Actor, id: &str, changes: ProductUpdate) -> DataResult<Product> {
        require_inventory(actor)?;
        if let Some(name) = &changes.name {
            validate_name("name", name)?;
        }
        if let Some(price) = changes.price_cents {
            validate_non_negative_cents("priceCents", price)?;
        }
        if let Some(cost) = changes.cost_cents {
            validate_non_negative_cents("costCents", cost)?;
        }
        self.get(id).await?;

        let mut patch = serde_json::to_value(&changes).map_err(StoreError::from)?;
        patch["updatedAt"] = json!(self.ctx.now());
        let product: Product = self
            .ctx
            .remote
            .update_as(resources::PRODUCTS, id, &patch)
            .await?;

        self.ctx.cache.clear_cache(&[resources::PRODUCTS]).await;
        self.ctx.audit.record(
            actor,
            AuditAction::Update,
            AuditEntity::Product,
            id,
            serde_json::to_string(&changes).unwrap_or_default(),
        );
        Ok(product)
    }

    /// Soft delete.
    pub async fn deactivate(&self, actor: &Actor, id: &str) -> DataResult<Product> {
        self.set_active(actor, id, false).await
    }

    pub async fn reactivate(&self, actor: &Actor, id: &str) -> DataResult<Product> {
        self.set_active(actor, id, true).await
    }

    /// Manual stock correction.
    pub async fn adjust_stock(&self, actor: &Actor, id: &str, delta: i64, reason: &str) -> DataResult<Product> {
        require_inventory(actor)?;
        shopdesk_core::validation::validate_reason(reason)?;
        let product = self.apply_stock_delta(id, delta).await?;

        self.ctx.cache.clear_cache(&[resources::PRODUCTS]).await;
        self.ctx.audit.record(
            actor,
            AuditAction::Update,
            AuditEntity::Product,
            id,
            format!("Stock {delta:+} ({}): {}", product.stock, reason.trim()),
        );
        Ok(product)
    }

    /// Read-modify-write of the stock level. Callers clear the cache.
    pub(crate) async fn apply_stock_delta(&self, id: &str, delta: i64) -> DataResult<Product> {
        let product = self.get(id).await?;
        let Some(stock) = product.stock.checked_add(delta) else {
            return Err(ValidationError::OutOfRange {
                field: "stock".into(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        };
        if stock < 0 {
            return Err(CoreError::InsufficientStock {
                sku: product.sku,
                available: product.stock,
                requested: delta.saturating_neg(),
            }
            .into());
        }
        self.ctx
            .remote
            .update_as(
                resources::PRODUCTS,
                id,
                &json!({ "stock": stock, "updatedAt": self.ctx.now() }),
            )
            .await
    }

    async fn set_active(&self, actor: &Actor, id: &str, active: bool) -> DataResult<Product> {
        require_inventory(actor)?;
        self.get(id).await?;
        let product: Product = self
            .ctx
            .remote
            .update_as(
                resources::PRODUCTS,
                id,
                &json!({ "active": active, "updatedAt": self.ctx.now() }),
            )
            .await?;

        self.ctx.cache.clear_cache(&[resources::PRODUCTS]).await;
        let action = if active {
            AuditAction::Reactivate
        } else {
            AuditAction::Deactivate
        };
        self.ctx
            .audit
            .record(actor, action, AuditEntity::Product, id, product.name.clone());
        Ok(product)
    }
}

fn require_inventory(actor: &Actor) -> DataResult<()> {
    if actor.has(Permission::ManageInventory) {
        Ok(())
    } else {
        Err(CoreError::MissingPermission {
            action: "manage inventory".into(),
        }
        .into())
    }
}
