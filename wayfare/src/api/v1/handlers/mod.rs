pub(crate) mod health;
pub mod suggestions;

pub use health::health_check;
