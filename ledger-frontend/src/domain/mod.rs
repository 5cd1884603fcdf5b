//! Pure aggregation and formatting logic. Nothing in here performs I/O.

pub mod authz;
pub mod balances;
pub mod chart;
pub mod csv_export;
pub mod format;
pub mod monthly;
pub mod payment_method;
pub mod pricing;
pub mod rankings;
pub mod settlement;
