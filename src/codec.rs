// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Block codec capability and the LZ4 block sequence writer shared by the
//! fast and high-ratio strategies

use crate::constants::*;
use crate::error::{Error, Result};
use crate::fast::FastCodec;
use crate::high::HighCodec;

/// A single-block compression strategy with history priming
///
/// The encoder hands the codec one contiguous input slice per call:
/// `input[..block_start]` is history, `input[block_start..]` is the block to
/// encode. Successive calls see the same buffer positions extended further,
/// until `setup_prefix` replaces the history. After `setup_prefix(prefix)`
/// the next call's input starts with exactly those prefix bytes.
pub trait BlockCodec {
    /// Encode `input[block_start..]` into `target`
    ///
    /// Returns the number of bytes written, or `None` when `target` is too
    /// small to hold the encoded block. Never reads past `input` or writes
    /// past `target`.
    fn encode_block(&mut self, input: &[u8], block_start: usize, target: &mut [u8])
        -> Option<usize>;

    /// Replace all history with `prefix`
    ///
    /// Only the last 64KB of a longer prefix are used.
    fn setup_prefix(&mut self, prefix: &[u8]);
}

impl<C: BlockCodec + ?Sized> BlockCodec for Box<C> {
    fn encode_block(
        &mut self,
        input: &[u8],
        block_start: usize,
        target: &mut [u8],
    ) -> Option<usize> {
        (**self).encode_block(input, block_start, target)
    }

    fn setup_prefix(&mut self, prefix: &[u8]) {
        (**self).setup_prefix(prefix)
    }
}

/// Built-in strategies, selected at construction
pub enum Codec {
    /// Greedy bounded search
    Fast(FastCodec),
    /// Hash-chain search with lazy matching
    High(HighCodec),
}

impl Codec {
    /// Pick a strategy from a compression level
    ///
    /// Levels below 3 select the fast codec with the given acceleration;
    /// higher levels select the high-ratio codec.
    pub fn for_level(level: u32, acceleration: u32) -> Result<Self> {
        if level < MIN_HIGH_LEVEL {
            Ok(Codec::Fast(FastCodec::new(acceleration)?))
        } else {
            Ok(Codec::High(HighCodec::new(level)?))
        }
    }

    pub fn is_fast(&self) -> bool {
        matches!(self, Codec::Fast(_))
    }
}

impl BlockCodec for Codec {
    fn encode_block(
        &mut self,
        input: &[u8],
        block_start: usize,
        target: &mut [u8],
    ) -> Option<usize> {
        match self {
            Codec::Fast(c) => c.encode_block(input, block_start, target),
            Codec::High(c) => c.encode_block(input, block_start, target),
        }
    }

    fn setup_prefix(&mut self, prefix: &[u8]) {
        match self {
            Codec::Fast(c) => c.setup_prefix(prefix),
            Codec::High(c) => c.setup_prefix(prefix),
        }
    }
}

/// Worst-case encoded size of a block of `src_len` bytes
pub fn compress_bound(src_len: usize) -> usize {
    src_len + src_len / 255 + 16
}

/// Allocate a codec table without aborting on exhaustion
pub(crate) fn alloc_table<T: Copy>(len: usize, fill: T) -> Result<Box<[T]>> {
    let mut table = Vec::new();
    table
        .try_reserve_exact(len)
        .map_err(|_| Error::AllocationFailure {
            requested: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    table.resize(len, fill);
    Ok(table.into_boxed_slice())
}

/// Load a u32 from the slice at the given offset
#[inline]
pub(crate) fn load32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[inline]
fn load64(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
        data[offset + 4],
        data[offset + 5],
        data[offset + 6],
        data[offset + 7],
    ])
}

/// Count equal bytes at `s` and `candidate`, stopping before `limit`
///
/// `candidate` must be below `s`; overlapping ranges are fine.
#[inline]
pub(crate) fn count_match(data: &[u8], mut s: usize, mut candidate: usize, limit: usize) -> usize {
    let start = s;

    while s + 8 <= limit {
        let diff = load64(data, s) ^ load64(data, candidate);
        if diff != 0 {
            return s - start + (diff.trailing_zeros() / 8) as usize;
        }
        s += 8;
        candidate += 8;
    }

    while s < limit && data[s] == data[candidate] {
        s += 1;
        candidate += 1;
    }

    s - start
}

/// Write a length extension: runs of 255 followed by the remainder
fn write_length(dst: &mut [u8], mut d: usize, mut n: usize) -> Option<usize> {
    while n >= 255 {
        *dst.get_mut(d)? = 255;
        d += 1;
        n -= 255;
    }
    *dst.get_mut(d)? = n as u8;
    Some(d + 1)
}

/// Emit one literals + match sequence at `d`, returning the new output offset
pub(crate) fn emit_sequence(
    dst: &mut [u8],
    d: usize,
    literals: &[u8],
    offset: usize,
    match_len: usize,
) -> Option<usize> {
    debug_assert!(offset > 0 && offset <= MAX_DISTANCE);
    debug_assert!(match_len >= MIN_MATCH);

    let token_pos = d;
    if token_pos >= dst.len() {
        return None;
    }
    let mut d = d + 1;

    let lit_len = literals.len();
    let lit_nibble = if lit_len >= RUN_MASK {
        d = write_length(dst, d, lit_len - RUN_MASK)?;
        RUN_MASK
    } else {
        lit_len
    };

    dst.get_mut(d..d + lit_len)?.copy_from_slice(literals);
    d += lit_len;

    dst.get_mut(d..d + 2)?
        .copy_from_slice(&(offset as u16).to_le_bytes());
    d += 2;

    let ml = match_len - MIN_MATCH;
    let match_nibble = if ml >= RUN_MASK {
        d = write_length(dst, d, ml - RUN_MASK)?;
        RUN_MASK
    } else {
        ml
    };

    dst[token_pos] = ((lit_nibble << 4) | match_nibble) as u8;
    Some(d)
}

/// Emit the closing literal run of a block
pub(crate) fn emit_last_literals(dst: &mut [u8], d: usize, literals: &[u8]) -> Option<usize> {
    let token_pos = d;
    if token_pos >= dst.len() {
        return None;
    }
    let mut d = d + 1;

    let lit_len = literals.len();
    let lit_nibble = if lit_len >= RUN_MASK {
        d = write_length(dst, d, lit_len - RUN_MASK)?;
        RUN_MASK
    } else {
        lit_len
    };

    dst.get_mut(d..d + lit_len)?.copy_from_slice(literals);
    dst[token_pos] = (lit_nibble << 4) as u8;
    Some(d + lit_len)
}
