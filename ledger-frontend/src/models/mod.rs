pub mod auth;
pub mod customer;
pub mod payment;
pub mod profile;
pub mod sale;
pub mod user;

pub use customer::Customer;
pub use payment::Payment;
pub use sale::{Sale, SaleItem};
pub use user::AuthUser;
