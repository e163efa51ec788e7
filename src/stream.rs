// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Streaming block encoder over a bounded window

use tracing::{debug, trace, warn};

use crate::codec::{compress_bound, BlockCodec, Codec};
use crate::constants::WINDOW_SIZE;
use crate::error::{Error, Result};
use crate::options::{BlockMode, EncoderOptions};
use crate::record::CompressedRecord;
use crate::ring::RingBuffer;

/// Lifecycle of a [`StreamingEncoder`]
///
/// `Ready -> Streaming -> Draining -> Disposed`; any state may move straight
/// to `Disposed`, nothing leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed, nothing pushed yet
    Ready,
    /// Accepting pushes
    Streaming,
    /// Flushed; only further flushes and dispose are allowed
    Draining,
    /// Resources released
    Disposed,
}

/// Splits a stream into fixed-size blocks and encodes each one against the
/// history still resident in its ring buffer
///
/// Memory stays at `block_size * (1 + extra_blocks)` bytes of input, a
/// history reserve of at most 64KB, and the codec tables, however long the
/// stream. History visible to any block never exceeds that capacity. When the
/// next block would overflow it, the trailing history (at most one block and
/// at most 64KB) is moved to the front of the buffer and primed into the
/// codec, so matches keep crossing block boundaries even without extra blocks.
///
/// # Example
///
/// ```
/// use lz4window::{EncoderOptions, StreamingEncoder};
///
/// let mut encoder = StreamingEncoder::with_options(
///     &EncoderOptions::new().block_size(4096).extra_blocks(1),
/// )
/// .unwrap();
///
/// let data = b"All work and no play makes Jack a dull boy. ".repeat(200);
/// let mut records = encoder.push(&data).unwrap();
/// records.extend(encoder.flush().unwrap());
/// encoder.dispose();
///
/// let total: usize = records.iter().map(|r| r.encoded_len()).sum();
/// assert!(total < data.len());
/// ```
pub struct StreamingEncoder<C: BlockCodec = Codec> {
    // Released before `ring`, which the codec's tables index into
    codec: Option<C>,
    ring: Option<RingBuffer>,
    scratch: Vec<u8>,
    block_size: usize,
    capacity: usize,
    mode: BlockMode,
    /// Re-primed before every block in independent mode
    dictionary: Vec<u8>,
    state: State,
}

impl StreamingEncoder<Codec> {
    /// Create a fast encoder with `block_size * (1 + extra_blocks)` bytes of
    /// window, optionally primed with `dictionary`
    pub fn new(block_size: usize, extra_blocks: usize, dictionary: Option<&[u8]>) -> Result<Self> {
        let mut options = EncoderOptions::new()
            .block_size(block_size)
            .extra_blocks(extra_blocks);
        options.dictionary = dictionary.map(<[u8]>::to_vec);
        Self::with_options(&options)
    }

    /// Create an encoder whose codec is chosen by `options.level`
    pub fn with_options(options: &EncoderOptions) -> Result<Self> {
        options.capacity()?;
        let codec = Codec::for_level(options.level, options.acceleration)?;
        Self::with_codec(codec, options)
    }
}

impl<C: BlockCodec> StreamingEncoder<C> {
    /// Create an encoder around a caller-supplied codec
    pub fn with_codec(codec: C, options: &EncoderOptions) -> Result<Self> {
        let capacity = options.capacity()?;
        let block_size = options.block_size;

        // Room to carry history across a reset without shrinking the block area
        let reserve = capacity.min(WINDOW_SIZE);
        let ring = RingBuffer::with_capacity(capacity + reserve)?;

        let bound = compress_bound(block_size);
        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(bound)
            .map_err(|_| Error::AllocationFailure { requested: bound })?;
        scratch.resize(bound, 0);

        let dictionary = match &options.dictionary {
            Some(dictionary) => {
                if dictionary.len() > reserve {
                    debug!(
                        supplied = dictionary.len(),
                        kept = reserve,
                        "truncating dictionary to its most recent bytes"
                    );
                }
                dictionary[dictionary.len().saturating_sub(reserve)..].to_vec()
            }
            None => Vec::new(),
        };

        let mut encoder = StreamingEncoder {
            codec: Some(codec),
            ring: Some(ring),
            scratch,
            block_size,
            capacity,
            mode: options.block_mode,
            dictionary,
            state: State::Ready,
        };
        encoder.prime();

        debug!(
            block_size,
            capacity,
            mode = ?encoder.mode,
            dictionary = encoder.dictionary.len(),
            "streaming encoder created"
        );

        Ok(encoder)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Block capacity in bytes, `block_size * (1 + extra_blocks)`
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes pushed but not yet part of an emitted record
    pub fn pending_len(&self) -> usize {
        self.ring.as_ref().map_or(0, RingBuffer::pending_len)
    }

    /// Bytes currently eligible as back-reference history for the next block
    pub fn retained_window(&self) -> usize {
        self.ring.as_ref().map_or(0, RingBuffer::retained)
    }

    /// Append `data`, returning one record per block boundary crossed
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<CompressedRecord>> {
        match self.state {
            State::Disposed => return Err(Error::UseAfterDispose),
            State::Draining => return Err(Error::StreamComplete),
            State::Ready | State::Streaming => self.state = State::Streaming,
        }

        let mut records = Vec::new();
        let mut input = data;

        while !input.is_empty() {
            let ring = self.ring.as_mut().ok_or(Error::UseAfterDispose)?;
            let room = self.block_size - ring.pending_len();
            let (head, tail) = input.split_at(room.min(input.len()));
            ring.write(head);
            input = tail;

            if ring.pending_len() == self.block_size {
                records.push(self.encode_pending()?);
            }
        }

        Ok(records)
    }

    /// Encode any partial block and mark the stream complete
    ///
    /// Calling it again without new data yields no records.
    pub fn flush(&mut self) -> Result<Vec<CompressedRecord>> {
        if self.state == State::Disposed {
            return Err(Error::UseAfterDispose);
        }

        let mut records = Vec::new();
        if self.pending_len() > 0 {
            records.push(self.encode_pending()?);
        }

        if self.state != State::Draining {
            debug!("stream flushed");
        }
        self.state = State::Draining;

        Ok(records)
    }

    /// Release the codec and then the ring buffer; later calls are no-ops
    pub fn dispose(&mut self) {
        if self.state == State::Disposed {
            return;
        }

        drop(self.codec.take());
        drop(self.ring.take());
        self.scratch = Vec::new();
        self.dictionary = Vec::new();
        self.state = State::Disposed;

        debug!("streaming encoder disposed");
    }

    /// Load the initial dictionary as history
    fn prime(&mut self) {
        let (Some(ring), Some(codec)) = (self.ring.as_mut(), self.codec.as_mut()) else {
            return;
        };

        if !self.dictionary.is_empty() {
            ring.write(&self.dictionary);
            ring.commit();
            codec.setup_prefix(ring.contents());
        }
    }

    /// Encode the pending bytes as one block
    ///
    /// A codec failure disposes the encoder; the stream cannot continue.
    fn encode_pending(&mut self) -> Result<CompressedRecord> {
        let (Some(ring), Some(codec)) = (self.ring.as_mut(), self.codec.as_mut()) else {
            return Err(Error::UseAfterDispose);
        };

        let block_start = ring.pending_start();
        let block_len = ring.pending_len();

        let Some(written) = codec.encode_block(ring.contents(), block_start, &mut self.scratch)
        else {
            let capacity = self.scratch.len();
            warn!(block_start, block_len, capacity, "block codec failed");
            self.dispose();
            return Err(Error::EncodeFailure {
                block_len,
                capacity,
            });
        };

        let record = if written >= block_len {
            CompressedRecord::stored(ring.pending())
        } else {
            CompressedRecord::compressed(&self.scratch[..written])
        };

        trace!(
            offset = block_start,
            history = ring.window_slice().len() - block_len,
            block_len,
            encoded = record.length,
            stored = !record.is_compressed,
            "block encoded"
        );

        ring.commit();
        if self.mode == BlockMode::Independent
            || ring.retained() > self.capacity
            || ring.remaining() < self.block_size
        {
            self.reset_window()?;
        }

        Ok(record)
    }

    /// Rewind the ring, carrying history to its front, and re-prime the codec
    fn reset_window(&mut self) -> Result<()> {
        let (Some(ring), Some(codec)) = (self.ring.as_mut(), self.codec.as_mut()) else {
            return Err(Error::UseAfterDispose);
        };

        match self.mode {
            BlockMode::Linked => {
                // One block of carry leaves room for every extra block after it
                let carry = ring.retained().min(WINDOW_SIZE).min(self.block_size);
                ring.reset(carry);
            }
            BlockMode::Independent => {
                ring.reset(0);
                ring.write(&self.dictionary);
                ring.commit();
            }
        }

        codec.setup_prefix(ring.contents());
        debug!(carried = ring.contents().len(), "window reset");

        Ok(())
    }
}

impl<C: BlockCodec> Drop for StreamingEncoder<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Encode `data` in one call, returning every record in order
pub fn encode_all(data: &[u8], options: &EncoderOptions) -> Result<Vec<CompressedRecord>> {
    let mut encoder = StreamingEncoder::with_options(options)?;
    let mut records = encoder.push(data)?;
    records.extend(encoder.flush()?);
    encoder.dispose();
    Ok(records)
}
