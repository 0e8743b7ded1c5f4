//! Built-in capabilities for the host functions Tether links.
//!
//! - [`NetworkCapability`]: outbound HTTP
//! - [`EnvCapability`]: environment variable reads

mod env;
mod network;

pub use env::{ENV_READ, EnvAction, EnvCapability};
pub use network::{HTTP_REQUEST, HostPattern, NetworkAction, NetworkCapability};
