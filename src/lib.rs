//! Payment-gateway integration and reconciliation for course purchases
//!
//! Generates signed redirect URLs for a hosted payment page,
//! authenticates the processor's asynchronous return callbacks and
//! transactionally converts successful payments into course
//! enrollments, tolerating duplicate callback delivery and partial
//! failure. Catalog, enrollment and user management belong to the
//! surrounding application; this crate consumes them through narrow
//! repository interfaces.

pub mod api;
pub mod checkout;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
