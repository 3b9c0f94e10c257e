// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod audit;
pub mod config;
pub mod constants;
pub mod error;
pub mod files;
pub mod inventory;
pub mod server;
pub mod sync;
pub mod tls;
pub mod transport;
pub mod types;
pub mod vault;

#[cfg(test)]
pub mod test_utils;
