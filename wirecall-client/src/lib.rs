//! # wirecall-client
//!
//! Client library for wirecall.
//!
//! This crate provides:
//! - Async TCP connections with dial timeouts
//! - Request/response correlation by request id
//! - A retrying connect-per-call proxy, the primary calling surface

pub mod client;
pub mod error;
pub mod proxy;

pub use client::{Client, ClientConfig};
pub use error::ClientError;
pub use proxy::RpcProxy;
