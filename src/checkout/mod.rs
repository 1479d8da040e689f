//! Purchase orchestration
//!
//! Ties the catalog, the payment store and the processor gateway
//! together: initiating purchases, reconciling return callbacks and
//! answering status queries.

pub mod coordinator;
pub mod types;

pub use self::coordinator::CheckoutService;
