// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WS-Addressing `MessageID` minting.
//!
//! No process-wide registry is kept here — only a monotonic counter used to
//! make IDs minted within the same process unique even if two are minted
//! within the same timestamp tick. Matching a reply's `RelatesTo` back to a
//! request is the transport's job, not this module's.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Mints a fresh `urn:uuid:`-shaped opaque message identifier.
///
/// This is not a conformant RFC 4122 UUID (no version/variant bits are
/// set) — WS-Addressing only requires the `MessageID` be an absolute URI
/// that is unique within the sender, which a timestamp + counter satisfies.
pub fn new_message_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut bytes = [0u8; 16];
    bytes[0..8].copy_from_slice(&nanos.to_be_bytes());
    bytes[8..16].copy_from_slice(&seq.to_be_bytes());
    format!("urn:uuid:{}", hex_encode(&bytes))
}
