//! Domain services. Each one is a thin handle over the shared
//! [`DataContext`](crate::context::DataContext).
//!
//! Reads go through the cache; writes go straight to the remote store and
//! clear the keys they may have invalidated.

pub mod auth;
pub mod cash_sessions;
pub mod permission_profiles;
pub mod products;
pub mod purchases;
pub mod sales;
pub mod users;

pub use auth::AuthService;
pub use cash_sessions::{CashSessionService, SessionFilter};
pub use permission_profiles::{NewPermissionProfile, PermissionProfileService, PermissionProfileUpdate};
pub use products::{NewProduct, ProductFilter, ProductService, ProductUpdate};
pub use purchases::{NewPurchase, PurchaseService};
pub use sales::{NewSale, NewSaleItem, SaleService};
pub use users::{NewUser, UserService, UserUpdate};
