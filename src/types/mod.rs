// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Data passed between the service and its collaborators.

pub mod endpoint;
pub mod snapshot;

pub use endpoint::{Endpoint, Role};
pub use snapshot::Snapshot;
