//! Bibliotek Library Management Client Core
//!
//! The borrow/return reconciliation pipeline behind Bibliotek's student and
//! admin dashboards: a subscribable per-scope loan store, a reconciler
//! merging optimistic mutations with fetch results and pushed change events,
//! pure derived-status computation, and the HTTP/push adapters the views
//! share. The embedding front end owns rendering, navigation and auth
//! acquisition; this crate owns keeping every borrow-related view on one
//! consistent truth.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use config::ClientConfig;
pub use error::{CoreError, CoreResult};
pub use services::reconcile::Reconciler;
pub use services::session::{LoanSession, ViewBinding};
pub use store::{LoanStore, StoreScope};
