// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! TLS material management and the hot-swappable HTTPS listener.

pub mod bundle;
pub mod listener;
pub mod manager;

pub use bundle::{Bundle, BundlePaths};
pub use listener::{ConnectionHandler, TlsListener};
pub use manager::{TlsManager, TlsStatus};
