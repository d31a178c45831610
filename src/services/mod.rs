//! Reconciliation pipeline services

pub mod push;
pub mod reconcile;
pub mod session;
pub mod status;

pub use push::{InMemoryPushChannel, PushChannel, PushEventBridge};
pub use reconcile::Reconciler;
pub use session::{LoanSession, ViewBinding};
