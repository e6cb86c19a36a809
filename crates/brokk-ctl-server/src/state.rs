// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Shared server state

use crate::exec::ExecutionManager;
use brokk_ctl_keys::KeyManager;
use brokk_instances::InstanceRecord;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

/// Read-mostly state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub instance: Arc<InstanceRecord>,
    pub keys: Arc<KeyManager>,
    pub exec: Option<Arc<dyn ExecutionManager>>,
    /// Set once the listener is bound
    pub bound_addr: Arc<OnceLock<SocketAddr>>,
}

impl AppState {
    pub fn new(instance: InstanceRecord, keys: Arc<KeyManager>) -> Self {
        Self {
            instance: Arc::new(instance),
            keys,
            exec: None,
            bound_addr: Arc::new(OnceLock::new()),
        }
    }

    /// Actual bound address once started, otherwise the record's address
    pub fn listen_addr(&self) -> String {
        self.bound_addr
            .get()
            .map(ToString::to_string)
            .unwrap_or_else(|| self.instance.listen_addr.clone())
    }
}
