// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

/// One encoded block, handed to the frame writer in push order
///
/// A stored record carries the source block verbatim; it is emitted when the
/// codec could not shrink the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedRecord {
    pub is_compressed: bool,
    /// Payload length in bytes
    pub length: u32,
    pub payload: Vec<u8>,
}

impl CompressedRecord {
    pub(crate) fn compressed(payload: &[u8]) -> Self {
        CompressedRecord {
            is_compressed: true,
            length: payload.len() as u32,
            payload: payload.to_vec(),
        }
    }

    pub(crate) fn stored(source: &[u8]) -> Self {
        CompressedRecord {
            is_compressed: false,
            length: source.len() as u32,
            payload: source.to_vec(),
        }
    }

    /// Number of payload bytes
    pub fn encoded_len(&self) -> usize {
        self.payload.len()
    }
}
