pub mod backend_client;
pub mod dashboard;
pub mod metrics;
pub mod repository;
pub mod session;

pub use backend_client::{BackendClient, Query};
pub use metrics::{get_metrics, init_metrics};
pub use repository::{LedgerFilter, LedgerRepository};
pub use session::SessionContext;
