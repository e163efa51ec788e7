// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::codec::{
    alloc_table, count_match, emit_last_literals, emit_sequence, load32, BlockCodec,
};
use crate::constants::*;
use crate::error::Result;

/// Greedy single-probe strategy, favors throughput over ratio
///
/// Holds one hash table of `position + 1` entries (0 is empty). The search
/// step grows after every 64 misses, scaled by the acceleration factor.
pub struct FastCodec {
    table: Box<[u32]>,
    /// Lowest position still usable as history
    low: usize,
    acceleration: u32,
}

impl FastCodec {
    /// Create a fast codec; an acceleration of 0 is treated as 1
    pub fn new(acceleration: u32) -> Result<Self> {
        Ok(FastCodec {
            table: alloc_table(1 << FAST_HASH_LOG, 0u32)?,
            low: 0,
            acceleration: acceleration.max(1),
        })
    }

    pub fn acceleration(&self) -> u32 {
        self.acceleration
    }

    #[inline]
    fn hash(sequence: u32) -> usize {
        (sequence.wrapping_mul(2654435761) >> (32 - FAST_HASH_LOG)) as usize
    }

    #[inline]
    fn is_match(&self, input: &[u8], candidate: usize, s: usize) -> bool {
        candidate >= self.low
            && candidate < s
            && s - candidate <= MAX_DISTANCE
            && load32(input, candidate) == load32(input, s)
    }

    #[inline]
    fn put(&mut self, input: &[u8], pos: usize) -> Option<usize> {
        let h = Self::hash(load32(input, pos));
        let previous = self.table[h];
        self.table[h] = (pos + 1) as u32;
        (previous as usize).checked_sub(1)
    }
}

impl BlockCodec for FastCodec {
    fn encode_block(
        &mut self,
        input: &[u8],
        block_start: usize,
        target: &mut [u8],
    ) -> Option<usize> {
        let end = input.len();
        if end - block_start < MF_LIMIT + 1 {
            return emit_last_literals(target, 0, &input[block_start..]);
        }

        let mf_limit = end - MF_LIMIT;
        let match_limit = end - LAST_LITERALS;
        let step_base = (self.acceleration as usize) << SKIP_TRIGGER;

        let mut anchor = block_start;
        let mut s = block_start;
        let mut d = 0;

        'outer: loop {
            let mut search = step_base;

            let mut candidate = loop {
                if s > mf_limit {
                    break 'outer;
                }

                if let Some(c) = self.put(input, s) {
                    if self.is_match(input, c, s) {
                        break c;
                    }
                }

                s += search >> SKIP_TRIGGER;
                search += 1;
            };

            // Extend backwards
            while s > anchor && candidate > self.low && input[s - 1] == input[candidate - 1] {
                s -= 1;
                candidate -= 1;
            }

            let len = MIN_MATCH
                + count_match(input, s + MIN_MATCH, candidate + MIN_MATCH, match_limit);
            d = emit_sequence(target, d, &input[anchor..s], s - candidate, len)?;

            s += len;
            anchor = s;

            if s > mf_limit {
                break;
            }

            self.put(input, s - 2);
        }

        emit_last_literals(target, d, &input[anchor..])
    }

    fn setup_prefix(&mut self, prefix: &[u8]) {
        self.table.fill(0);
        self.low = prefix.len().saturating_sub(WINDOW_SIZE);

        // Every third position, as a cheap approximation of full indexing
        let mut p = self.low;
        while p + MIN_MATCH <= prefix.len() {
            self.put(prefix, p);
            p += 3;
        }
    }
}
