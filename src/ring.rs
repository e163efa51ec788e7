// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Fixed-capacity input arena shared by the encoder and its codec
//!
//! Bytes are appended at `cursor` and stay physically resident until a
//! window reset, so every block is encoded against a contiguous slice that
//! already holds its history. Offsets satisfy
//! `window_start <= encoded <= cursor <= capacity` at all times.
//!
//! The encoder sizes the arena as its block capacity plus a history reserve,
//! so a carried prefix never takes room from the next block.

use crate::constants::WINDOW_SIZE;
use crate::error::{Error, Result};

/// Contiguous byte arena with a write cursor and window-start offset
pub(crate) struct RingBuffer {
    buf: Vec<u8>,
    /// Next write position
    cursor: usize,
    /// End of the last encoded block; `encoded..cursor` is pending
    encoded: usize,
    /// First byte still usable as back-reference history
    window_start: usize,
}

impl RingBuffer {
    /// Allocate a zeroed arena of exactly `capacity` bytes
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| Error::AllocationFailure {
                requested: capacity,
            })?;
        buf.resize(capacity, 0);

        Ok(RingBuffer {
            buf,
            cursor: 0,
            encoded: 0,
            window_start: 0,
        })
    }

    /// Free space after the cursor
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    /// Offset where the pending block starts
    pub(crate) fn pending_start(&self) -> usize {
        self.encoded
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.cursor - self.encoded
    }

    /// Copy `data` in at the cursor
    ///
    /// The caller checks `remaining()` first; a write never truncates.
    pub(crate) fn write(&mut self, data: &[u8]) {
        debug_assert!(
            data.len() <= self.remaining(),
            "ring write overflow: need {}, have {}",
            data.len(),
            self.remaining()
        );

        self.buf[self.cursor..self.cursor + data.len()].copy_from_slice(data);
        self.cursor += data.len();
    }

    /// Everything written since the last reset, history and pending bytes
    pub(crate) fn contents(&self) -> &[u8] {
        &self.buf[..self.cursor]
    }

    /// Bytes currently eligible as history for the next block, plus any
    /// pending bytes
    pub(crate) fn window_slice(&self) -> &[u8] {
        &self.buf[self.window_start..self.cursor]
    }

    /// Committed bytes still usable as history
    pub(crate) fn retained(&self) -> usize {
        self.encoded - self.window_start
    }

    /// Bytes written but not yet handed to a codec
    pub(crate) fn pending(&self) -> &[u8] {
        &self.buf[self.encoded..self.cursor]
    }

    /// Mark the pending bytes as encoded
    pub(crate) fn commit(&mut self) {
        self.encoded = self.cursor;
        self.window_start = self
            .window_start
            .max(self.cursor.saturating_sub(WINDOW_SIZE));
    }

    /// Move the last `carry` bytes to offset 0 and continue writing after them
    ///
    /// This is the only operation that rewinds the cursor. Pending bytes must
    /// have been committed.
    pub(crate) fn reset(&mut self, carry: usize) {
        debug_assert_eq!(self.encoded, self.cursor, "reset with pending bytes");
        debug_assert!(
            carry <= self.cursor - self.window_start,
            "carry {} exceeds window of {} bytes",
            carry,
            self.cursor - self.window_start
        );

        self.buf.copy_within(self.cursor - carry..self.cursor, 0);
        self.cursor = carry;
        self.encoded = carry;
        self.window_start = 0;
    }
}
