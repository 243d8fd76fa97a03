pub mod assignments;
pub mod auth;
pub mod health;
pub mod submissions;

pub use health::{healthz, metrics, readyz, root};
