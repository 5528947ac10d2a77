//! Service configuration and shared application state.

mod config;
mod state;

pub use config::{DeliveryMode, ServiceConfig};
pub use state::{DeliveryPolicy, ServiceState};
