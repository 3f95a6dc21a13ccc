//! Service registry and method dispatch.
//!
//! A service is an explicit map from method name to an invocation closure
//! built at registration time, so unknown services and unknown methods are
//! ordinary lookup failures answered with an error response rather than
//! connection-level faults. The registry is populated before the server
//! starts serving and read-only afterward.

use crate::error::ServerError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use wirecall_protocol::{CompressKind, RpcRequest, RpcResponse, SerializeKind};

/// Error returned by a service method; carried back to the caller as a
/// status-500 response with this message.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct MethodError(String);

impl MethodError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Boxed method closure: positional arguments in, optional result out.
pub type Method = Box<dyn Fn(Vec<Value>) -> Result<Option<Value>, MethodError> + Send + Sync>;

/// Deserializes the positional argument at `index` into a concrete type.
pub fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> Result<T, MethodError> {
    let value = args
        .get(index)
        .ok_or_else(|| MethodError::new(format!("missing argument {index}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| MethodError::new(format!("invalid argument {index}: {e}")))
}

/// A named collection of invocable methods.
#[derive(Default)]
pub struct Service {
    methods: HashMap<String, Method>,
}

impl Service {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a method under `name`, replacing any previous closure with the
    /// same name within this service.
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Option<Value>, MethodError> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Box::new(f));
        self
    }

    fn get(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }
}

/// Server-side mapping from service name to handler.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Service>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `service` under `name`. Duplicate names are rejected rather
    /// than overwritten.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        service: Service,
    ) -> Result<(), ServerError> {
        let name = name.into();
        if self.services.contains_key(&name) {
            return Err(ServerError::DuplicateService(name));
        }
        self.services.insert(name, service);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Resolves and invokes the method a request names.
    ///
    /// Every failure mode maps to a status-500 response echoing the request
    /// id and the body strategies of the inbound frame; exactly one
    /// response is produced per request.
    pub fn dispatch(
        &self,
        request: &RpcRequest,
        compress: CompressKind,
        serialize: SerializeKind,
    ) -> RpcResponse {
        let service = match self.services.get(&request.service) {
            Some(service) => service,
            None => {
                return RpcResponse::error(request.request_id, compress, serialize, "no service found")
            }
        };

        let method = match service.get(&request.method) {
            Some(method) => method,
            None => {
                return RpcResponse::error(request.request_id, compress, serialize, "no method found")
            }
        };

        match method(request.args.clone()) {
            Ok(data) => RpcResponse::ok(request.request_id, compress, serialize, data),
            Err(e) => RpcResponse::error(request.request_id, compress, serialize, e.to_string()),
        }
    }
}
