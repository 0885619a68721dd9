//! # Outbound Notifications
//!
//! ```text
//! SaleService::record ──► queue.submit ──► Notifier::notify
//!                                            │
//!                                            ▼
//!                       POST {api_base}/bot{token}/sendMessage
//!                            {"chat_id": "...", "text": "..."}
//! ```
//!
//! Delivery is best effort: failures surface as `DataError::Notification`
//! inside the background task and are logged there.

use async_trait::async_trait;
use serde::Serialize;
use shopdesk_core::{CurrencyFormat, Money, PaymentMethod};
use tracing::debug;
use url::Url;

use crate::config::NotificationSettings;
use crate::error::{DataError, DataResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyEvent {
    SaleRecorded {
        sale_id: String,
        seller: String,
        customer: Option<String>,
        total: Money,
        payment_method: PaymentMethod,
        installments: u32,
        item_count: usize,
    },
    PurchaseRecorded {
        purchase_id: String,
        supplier: String,
        total: Money,
        item_count: usize,
    },
}

impl NotifyEvent {
    /// Human-readable message body.
    pub fn render(&self, currency: &CurrencyFormat) -> String {
        match self {
            NotifyEvent::SaleRecorded {
                sale_id,
                seller,
                customer,
                total,
                payment_method,
                installments,
                item_count,
            } => {
                let mut text = format!(
                    "New sale {sale_id}\nSeller: {seller}\nItems: {item_count}\nTotal: {} ({}",
                    currency.format(*total),
                    payment_method.label()
                );
                if *installments > 1 {
                    text.push_str(&format!(", {installments}x"));
                }
                text.push(')');
                if let Some(customer) = customer {
                    text.push_str(&format!("\nCustomer: {customer}"));
                }
                text
            }
            NotifyEvent::PurchaseRecorded {
                purchase_id,
                supplier,
                total,
                item_count,
            } => format!(
                "New purchase {purchase_id}\nSupplier: {supplier}\nItems: {item_count}\nTotal: {}",
                currency.format(*total)
            ),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotifyEvent) -> DataResult<()>;
}

/// Used when notifications are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: &NotifyEvent) -> DataResult<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Bot-style chat webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: Url,
    chat_id: String,
    currency: CurrencyFormat,
}

impl WebhookNotifier {
    pub fn new(settings: &NotificationSettings, currency: CurrencyFormat) -> DataResult<Self> {
        if settings.bot_token.is_empty() || settings.chat_id.is_empty() {
            return Err(DataError::InvalidConfig(
                "notifications require bot_token and chat_id".into(),
            ));
        }
        let endpoint = Url::parse(&format!(
            "{}/bot{}/sendMessage",
            settings.api_base.trim_end_matches('/'),
            settings.bot_token
        ))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            chat_id: settings.chat_id.clone(),
            currency,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &NotifyEvent) -> DataResult<()> {
        let text = event.render(&self.currency);
        self.client
            .post(self.endpoint.clone())
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: &text,
            })
            .send()
            .await?
            .error_for_status()?;
        debug!(chat_id = %self.chat_id, "Notification delivered");
        Ok(())
    }
}
