pub mod service;

pub use service::{LedgerService, ServiceError};
