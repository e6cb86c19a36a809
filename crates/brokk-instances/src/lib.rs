// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Instance discovery.
//!
//! A running host writes an [`InstanceRecord`] to `<base>/instances/` and
//! refreshes it periodically; `brokkctl` lists the directory to find where
//! instances listen. An entry that has not been refreshed within the TTL is
//! stale and should be treated as dead until the control endpoint answers.

pub mod error;
pub mod list;
pub mod record;
pub mod registry;

pub use error::{RegistryError, Result};
pub use list::{
    list_instances, list_instances_at, InstanceView, ListEnvelope, ListOptions, ListSummary,
    SkippedFiles, AUTO_REQUEST_ID, DEFAULT_TTL_MS,
};
pub use record::{now_ms, InstanceRecord, BROKKCTL_VERSION};
pub use registry::{Heartbeat, InstanceRegistry, RegistryScan};
