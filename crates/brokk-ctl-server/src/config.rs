// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind; must be loopback, port 0 picks an ephemeral port
    pub bind_addr: SocketAddr,

    /// How long `stop` waits for in-flight requests by default
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    /// Loopback on the given port
    pub fn loopback(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            ..Default::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}
