//! # wirecall-server
//!
//! TCP server for wirecall.
//!
//! This crate provides:
//! - TCP connection handling with async I/O
//! - Frame decoding and per-connection dispatch loops
//! - A service registry with closure-based method dispatch
//! - Layered configuration (defaults, YAML file, environment)

pub mod config;
pub mod error;
pub mod registry;
pub mod server;

pub use config::{Config, ConfigError, NetworkConfig};
pub use error::ServerError;
pub use registry::{arg, MethodError, Service, ServiceRegistry};
pub use server::{Server, ServerConfig, ServerStats};
