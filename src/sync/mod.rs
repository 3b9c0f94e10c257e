// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Configuration pull and push across the device fleet.

pub mod engine;

pub use engine::{PullOutcome, PushReport, SyncEngine, SyncSettings};
