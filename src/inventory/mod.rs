// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Collaborators the sync engine reads from and writes to: the device registry
//! and the configuration snapshot store.

pub mod registry;
pub mod store;

pub use registry::{EndpointRegistry, FileRegistry};
pub use store::{ConfigStore, FileConfigStore};
