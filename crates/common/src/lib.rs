pub mod config;

#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "rpc")]
pub mod rpc;
