//! Data models for the client core

pub mod catalog;
pub mod enums;
pub mod event;
pub mod loan;
pub mod notice;
pub mod query;
pub mod request;

pub use catalog::{CatalogItem, CatalogItemInput, CatalogItemUpdate};
pub use enums::{Audience, DerivedStatus, LifecycleState, LoanSortKey, MutationKind, RequestState};
pub use event::{ChangeEvent, ChangeKind, LoanPatch};
pub use loan::{LoanRecord, LoanSummary};
pub use notice::{Notice, NoticeReceipt, NoticeRecord};
pub use query::LoanQuery;
pub use request::ChangeRequest;
