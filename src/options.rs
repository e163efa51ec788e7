// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Encoder configuration

use crate::constants::*;
use crate::error::{Error, Result};

/// How blocks relate to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockMode {
    /// Each block may reference up to 64KB of preceding stream
    #[default]
    Linked,
    /// Each block references only the initial dictionary, if any
    Independent,
}

/// Options for [`StreamingEncoder`](crate::StreamingEncoder)
///
/// # Example
///
/// ```
/// use lz4window::{BlockMode, EncoderOptions};
///
/// let options = EncoderOptions::new()
///     .block_size(16 << 10)
///     .extra_blocks(3)
///     .level(9)
///     .block_mode(BlockMode::Linked);
/// assert_eq!(options.capacity().unwrap(), 64 << 10);
/// ```
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    pub block_size: usize,
    /// Additional block-sized capacity that delays window resets
    pub extra_blocks: usize,
    /// 0..=2 selects the fast codec, 3..=12 the high-ratio codec
    pub level: u32,
    /// Fast codec search acceleration, 1 is the default effort
    pub acceleration: u32,
    pub block_mode: BlockMode,
    /// Initial history; only the last `min(64KB, capacity)` bytes are used
    pub dictionary: Option<Vec<u8>>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        EncoderOptions {
            block_size: DEFAULT_BLOCK_SIZE,
            extra_blocks: 0,
            level: 0,
            acceleration: 1,
            block_mode: BlockMode::Linked,
            dictionary: None,
        }
    }
}

impl EncoderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn extra_blocks(mut self, extra_blocks: usize) -> Self {
        self.extra_blocks = extra_blocks;
        self
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn acceleration(mut self, acceleration: u32) -> Self {
        self.acceleration = acceleration;
        self
    }

    pub fn block_mode(mut self, block_mode: BlockMode) -> Self {
        self.block_mode = block_mode;
        self
    }

    pub fn dictionary(mut self, dictionary: impl Into<Vec<u8>>) -> Self {
        self.dictionary = Some(dictionary.into());
        self
    }

    /// Validate the options and return the block capacity,
    /// `block_size * (1 + extra_blocks)`
    pub fn capacity(&self) -> Result<usize> {
        if self.block_size == 0 {
            return Err(Error::InvalidConfiguration(
                "block size must be positive".into(),
            ));
        }
        if self.block_size > MAX_BLOCK_SIZE {
            return Err(Error::InvalidConfiguration(format!(
                "block size {} exceeds {}",
                self.block_size, MAX_BLOCK_SIZE
            )));
        }

        let capacity = self
            .extra_blocks
            .checked_add(1)
            .and_then(|blocks| blocks.checked_mul(self.block_size))
            .filter(|&capacity| capacity <= MAX_RING_CAPACITY)
            .ok_or_else(|| {
                Error::InvalidConfiguration(format!(
                    "{} extra blocks of {} bytes exceed the {} byte buffer limit",
                    self.extra_blocks, self.block_size, MAX_RING_CAPACITY
                ))
            })?;

        if let Some(dictionary) = &self.dictionary {
            if u32::try_from(dictionary.len()).is_err() {
                return Err(Error::InvalidConfiguration(format!(
                    "dictionary of {} bytes is out of range",
                    dictionary.len()
                )));
            }
        }

        Ok(capacity)
    }
}
