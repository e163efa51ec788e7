// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! # Streaming LZ4 block compression
//!
//! This library compresses an arbitrarily long stream as a sequence of
//! fixed-size LZ4 blocks while keeping cross-block redundancy, using a
//! bounded working buffer.
//!
//! It provides:
//! - A fixed-capacity ring buffer that keeps recent blocks resident as history
//! - Window resets that carry recent history (at most one block and 64KB)
//!   forward as a primed prefix, with or without extra blocks
//! - Fast (greedy) and high-ratio (hash chain) block codecs behind one trait
//! - Store fallback for blocks that do not shrink
//!
//! Framing, decompression and I/O are left to the caller. Each
//! [`CompressedRecord`] is either a raw LZ4 block, decodable with the
//! preceding 64KB of the stream as external dictionary, or the source block
//! stored verbatim.
//!
//! ## Example
//!
//! ```rust
//! use lz4window::{encode_all, EncoderOptions};
//!
//! let data = b"Hello, World! Hello, World! Hello, World! Hello, World!".repeat(100);
//! let options = EncoderOptions::new().block_size(1024).extra_blocks(2);
//! let records = encode_all(&data, &options).expect("encoding failed");
//!
//! assert_eq!(records.len(), (data.len() + 1023) / 1024);
//! assert!(records.iter().all(|r| r.is_compressed));
//! ```

mod codec;
mod constants;
mod error;
mod fast;
mod high;
mod options;
mod record;
mod ring;
mod stream;

pub use codec::{compress_bound, BlockCodec, Codec};
pub use constants::{DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, MAX_DISTANCE, WINDOW_SIZE};
pub use error::{Error, Result};
pub use fast::FastCodec;
pub use high::HighCodec;
pub use options::{BlockMode, EncoderOptions};
pub use record::CompressedRecord;
pub use stream::{encode_all, State, StreamingEncoder};
