// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

/// Result type for streaming encoder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the streaming encoder
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Block size, extra blocks or dictionary are out of range
    #[error("lz4window: invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The ring buffer or codec tables could not be allocated
    #[error("lz4window: failed to allocate {requested} bytes")]
    AllocationFailure { requested: usize },

    /// The block codec reported its failure sentinel
    #[error("lz4window: block of {block_len} bytes did not fit in {capacity} bytes of output")]
    EncodeFailure { block_len: usize, capacity: usize },

    /// The encoder was used after `dispose`
    #[error("lz4window: encoder used after dispose")]
    UseAfterDispose,

    /// Push was called after the stream was flushed
    #[error("lz4window: stream already flushed")]
    StreamComplete,
}
