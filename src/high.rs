// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::codec::{
    alloc_table, count_match, emit_last_literals, emit_sequence, load32, BlockCodec,
};
use crate::constants::*;
use crate::error::Result;

/// Chain slots, one per position inside the 64KB window
const CHAIN_SIZE: usize = 1 << 16;
const CHAIN_MASK: usize = CHAIN_SIZE - 1;

/// Hash chains over every position of the current history
///
/// `head` holds the latest `position + 1` per hash (0 is empty), `chain`
/// holds the distance back to the previous position with the same hash,
/// clamped to `MAX_DISTANCE`.
struct ChainTable {
    head: Box<[u32]>,
    chain: Box<[u16]>,
    /// First position not yet inserted
    next_to_update: usize,
    /// Lowest position still usable as history
    low: usize,
    max_attempts: usize,
    /// Jump across runs of a repeated 1, 2 or 4 byte pattern
    pattern_analysis: bool,
}

impl ChainTable {
    fn new(max_attempts: usize) -> Result<Self> {
        Ok(ChainTable {
            head: alloc_table(1 << HIGH_HASH_LOG, 0u32)?,
            chain: alloc_table(CHAIN_SIZE, u16::MAX)?,
            next_to_update: 0,
            low: 0,
            max_attempts,
            pattern_analysis: max_attempts > 64,
        })
    }

    #[inline]
    fn hash(sequence: u32) -> usize {
        (sequence.wrapping_mul(2654435761) >> (32 - HIGH_HASH_LOG)) as usize
    }

    fn reset(&mut self, prefix: &[u8]) {
        self.head.fill(0);
        self.chain.fill(u16::MAX);
        self.low = prefix.len().saturating_sub(WINDOW_SIZE);
        self.next_to_update = self.low;
        self.insert(prefix, prefix.len().saturating_sub(MIN_MATCH - 1));
    }

    /// Index every position below `target`
    fn insert(&mut self, input: &[u8], target: usize) {
        while self.next_to_update < target {
            let idx = self.next_to_update;
            let h = Self::hash(load32(input, idx));
            let delta = match self.head[h] as usize {
                0 => MAX_DISTANCE,
                prev => (idx - (prev - 1)).min(MAX_DISTANCE),
            };
            self.chain[idx & CHAIN_MASK] = delta as u16;
            self.head[h] = (idx + 1) as u32;
            self.next_to_update += 1;
        }
    }

    /// Longest match for position `s`, as `(candidate, length)`
    fn find_best(&mut self, input: &[u8], s: usize, match_limit: usize) -> Option<(usize, usize)> {
        self.insert(input, s);

        let pattern = load32(input, s);
        let mut candidate = (self.head[Self::hash(pattern)] as usize).checked_sub(1)?;
        let mut best_len = MIN_MATCH - 1;
        let mut best = None;
        let mut attempts = self.max_attempts;
        let mut repeat = Repeat::Untested;

        while attempts > 0 && candidate >= self.low && s - candidate <= MAX_DISTANCE {
            attempts -= 1;

            if input[candidate + best_len] == input[s + best_len]
                && load32(input, candidate) == pattern
            {
                let len = MIN_MATCH
                    + count_match(input, s + MIN_MATCH, candidate + MIN_MATCH, match_limit);
                if len > best_len {
                    best_len = len;
                    best = Some(candidate);
                    if s + len >= match_limit {
                        break;
                    }
                }
            }

            let delta = self.chain[candidate & CHAIN_MASK] as usize;
            if delta == 0 || delta > candidate {
                break;
            }
            candidate -= delta;

            if self.pattern_analysis && delta == 1 {
                if repeat == Repeat::Untested {
                    repeat = if is_repetitive(pattern) {
                        let run = count_pattern(input, s + MIN_MATCH, match_limit, pattern);
                        Repeat::Confirmed(MIN_MATCH + run)
                    } else {
                        Repeat::Not
                    };
                }
                if let Repeat::Confirmed(source_len) = repeat {
                    if candidate >= self.low && load32(input, candidate) == pattern {
                        candidate =
                            self.skip_pattern(input, s, candidate, source_len, match_limit);
                    }
                }
            }
        }

        best.map(|c| (c, best_len))
    }

    /// Reposition `candidate` inside a run of the pattern at `s`
    ///
    /// Lands where the run covers the full `source_len` bytes when it is long
    /// enough, otherwise at the far end of the run.
    fn skip_pattern(
        &self,
        input: &[u8],
        s: usize,
        candidate: usize,
        source_len: usize,
        match_limit: usize,
    ) -> usize {
        let pattern = load32(input, candidate);
        let forward = MIN_MATCH + count_pattern(input, candidate + 4, match_limit, pattern);
        let floor = self.low.max(s.saturating_sub(MAX_DISTANCE));
        if candidate < floor {
            return candidate;
        }
        let back = reverse_count_pattern(input, candidate, floor, pattern);

        if back + forward >= source_len && forward <= source_len {
            candidate - (source_len - forward)
        } else {
            candidate - back
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeat {
    Untested,
    Not,
    /// Length of the run starting at the searched position
    Confirmed(usize),
}

/// True when the four bytes repeat with a period of 1, 2 or 4
fn is_repetitive(pattern: u32) -> bool {
    (pattern & 0xFFFF) == (pattern >> 16) && (pattern & 0xFF) == (pattern >> 24)
}

/// Bytes from `start` continuing the little-endian `pattern`
fn count_pattern(input: &[u8], start: usize, limit: usize, pattern: u32) -> usize {
    let bytes = pattern.to_le_bytes();
    input[start..limit]
        .iter()
        .zip(bytes.iter().cycle())
        .take_while(|(a, b)| a == b)
        .count()
}

/// Bytes before `end`, down to `floor`, that end in the pattern
fn reverse_count_pattern(input: &[u8], end: usize, floor: usize, pattern: u32) -> usize {
    let bytes = pattern.to_le_bytes();
    input[floor..end]
        .iter()
        .rev()
        .zip(bytes.iter().rev().cycle())
        .take_while(|(a, b)| a == b)
        .count()
}

/// One position of an optimal parsing segment
#[derive(Debug, Clone, Copy, Default)]
struct Node {
    /// Cheapest known cost in output bytes to reach this position
    price: usize,
    /// Literals pending at this position; 0 when a match ends here
    litlen: usize,
    /// Length of the match ending here
    mlen: usize,
    offset: usize,
}

/// Cost of everything before the literal run of `litlen` bytes ending at `i`
fn base_price(opt: &[Node], i: usize, litlen: usize) -> usize {
    if litlen > i {
        0
    } else {
        opt[i - litlen].price
    }
}

fn literals_price(litlen: usize) -> usize {
    if litlen >= RUN_MASK {
        litlen + 1 + (litlen - RUN_MASK) / 255
    } else {
        litlen
    }
}

fn sequence_price(litlen: usize, mlen: usize) -> usize {
    let ml = mlen - MIN_MATCH;
    let extra = if ml >= RUN_MASK {
        1 + (ml - RUN_MASK) / 255
    } else {
        0
    };
    1 + 2 + literals_price(litlen) + extra
}

/// Hash-chain strategy, favors ratio over throughput
///
/// Levels 3 to 9 search chains with lazy matching. Levels 10 to 12 price
/// every literal and match choice over segments of up to `OPT_NUM` positions
/// and keep the cheapest parse.
pub struct HighCodec {
    table: ChainTable,
    level: u32,
    /// Matches at least this long are taken without pricing alternatives
    sufficient_len: usize,
    opt: Box<[Node]>,
    path: Vec<(usize, usize, usize)>,
}

impl HighCodec {
    /// Create a high-ratio codec
    ///
    /// Level 0 selects the default level 9, other levels are clamped to 3..=12.
    pub fn new(level: u32) -> Result<Self> {
        let level = match level {
            0 => DEFAULT_HIGH_LEVEL,
            l => l.clamp(MIN_HIGH_LEVEL, MAX_LEVEL),
        };

        let opt = if level >= MIN_OPT_LEVEL {
            alloc_table(OPT_NUM + 1, Node::default())?
        } else {
            Box::default()
        };

        Ok(HighCodec {
            table: ChainTable::new(search_depth(level))?,
            level,
            sufficient_len: sufficient_len(level),
            opt,
            path: Vec::new(),
        })
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    fn encode_lazy(&mut self, input: &[u8], block_start: usize, target: &mut [u8]) -> Option<usize> {
        let end = input.len();
        let mf_limit = end - MF_LIMIT;
        let match_limit = end - LAST_LITERALS;
        let table = &mut self.table;

        let mut anchor = block_start;
        let mut s = block_start;
        let mut d = 0;

        while s <= mf_limit {
            let Some((mut candidate, mut len)) = table.find_best(input, s, match_limit) else {
                s += 1;
                continue;
            };

            // Defer while the next position offers a strictly longer match
            let mut start = s;
            while start < mf_limit {
                match table.find_best(input, start + 1, match_limit) {
                    Some((c, l)) if l > len => {
                        start += 1;
                        candidate = c;
                        len = l;
                    }
                    _ => break,
                }
            }

            while start > anchor && candidate > table.low && input[start - 1] == input[candidate - 1]
            {
                start -= 1;
                candidate -= 1;
                len += 1;
            }

            d = emit_sequence(target, d, &input[anchor..start], start - candidate, len)?;
            s = start + len;
            anchor = s;
        }

        emit_last_literals(target, d, &input[anchor..])
    }

    fn encode_optimal(
        &mut self,
        input: &[u8],
        block_start: usize,
        target: &mut [u8],
    ) -> Option<usize> {
        let end = input.len();
        let mf_limit = end - MF_LIMIT;
        let match_limit = end - LAST_LITERALS;

        let mut anchor = block_start;
        let mut s = block_start;
        let mut d = 0;

        while s <= mf_limit {
            let Some((candidate, len)) = self.table.find_best(input, s, match_limit) else {
                s += 1;
                continue;
            };

            if len >= self.sufficient_len {
                d = emit_sequence(target, d, &input[anchor..s], s - candidate, len)?;
                s += len;
                anchor = s;
                continue;
            }

            let (stop, forced) =
                self.price_segment(input, s, anchor, (candidate, len), mf_limit, match_limit);

            self.path.clear();
            let mut i = stop;
            while i > 0 {
                let node = self.opt[i];
                if node.litlen == 0 && node.mlen > 0 {
                    self.path.push((i - node.mlen, node.offset, node.mlen));
                    i -= node.mlen;
                } else {
                    i -= 1;
                }
            }

            for &(pos, offset, mlen) in self.path.iter().rev() {
                d = emit_sequence(target, d, &input[anchor..s + pos], offset, mlen)?;
                anchor = s + pos + mlen;
            }

            match forced {
                Some((candidate, len)) => {
                    let at = s + stop;
                    d = emit_sequence(target, d, &input[anchor..at], at - candidate, len)?;
                    anchor = at + len;
                    s = anchor;
                }
                None => s += stop,
            }
        }

        emit_last_literals(target, d, &input[anchor..])
    }

    /// Price every parse from `s` until no known match reaches further
    ///
    /// Returns the segment length and, when a match of at least
    /// `sufficient_len` cut the segment short, that match.
    fn price_segment(
        &mut self,
        input: &[u8],
        s: usize,
        anchor: usize,
        first: (usize, usize),
        mf_limit: usize,
        match_limit: usize,
    ) -> (usize, Option<(usize, usize)>) {
        let sufficient = self.sufficient_len;
        let opt = &mut self.opt[..];
        let table = &mut self.table;

        let first_lits = s - anchor;
        opt[0] = Node {
            price: literals_price(first_lits),
            litlen: first_lits,
            mlen: 0,
            offset: 0,
        };
        let mut last_pos = 0;
        let mut last_match_pos = 0;

        let mut cur = 0;
        loop {
            let found = if cur == 0 {
                Some(first)
            } else if s + cur <= mf_limit {
                table.find_best(input, s + cur, match_limit)
            } else {
                None
            };

            if let Some((candidate, len)) = found {
                if len >= sufficient {
                    return (cur, Some((candidate, len)));
                }

                let litlen = opt[cur].litlen;
                let from = base_price(opt, cur, litlen);
                let longest = len.min(OPT_NUM - cur);
                for mlen in MIN_MATCH..=longest {
                    let i = cur + mlen;
                    while last_pos < i {
                        last_pos += 1;
                        opt[last_pos].price = usize::MAX;
                    }
                    let price = from + sequence_price(litlen, mlen);
                    if price < opt[i].price {
                        opt[i] = Node {
                            price,
                            litlen: 0,
                            mlen,
                            offset: s + cur - candidate,
                        };
                    }
                }
                if longest >= MIN_MATCH {
                    last_match_pos = last_match_pos.max(cur + longest);
                }
            }

            if cur + 1 > last_match_pos || s + cur + 1 > mf_limit {
                break;
            }

            let litlen = opt[cur].litlen + 1;
            let price = base_price(opt, cur + 1, litlen) + literals_price(litlen);
            if last_pos < cur + 1 {
                last_pos = cur + 1;
                opt[last_pos].price = usize::MAX;
            }
            if price < opt[cur + 1].price {
                opt[cur + 1] = Node {
                    price,
                    litlen,
                    mlen: 0,
                    offset: 0,
                };
            }

            cur += 1;
            if cur >= last_match_pos {
                break;
            }
        }

        (last_match_pos, None)
    }
}

/// Chain candidates examined per position for a given level
fn search_depth(level: u32) -> usize {
    match level {
        0..=9 => 4 << (level.saturating_sub(MIN_HIGH_LEVEL)),
        10 => 96,
        11 => 512,
        _ => 8192,
    }
}

fn sufficient_len(level: u32) -> usize {
    match level {
        0..=10 => 64,
        11 => 128,
        _ => OPT_NUM,
    }
}

impl BlockCodec for HighCodec {
    fn encode_block(
        &mut self,
        input: &[u8],
        block_start: usize,
        target: &mut [u8],
    ) -> Option<usize> {
        if input.len() - block_start < MF_LIMIT + 1 {
            return emit_last_literals(target, 0, &input[block_start..]);
        }

        if self.level >= MIN_OPT_LEVEL {
            self.encode_optimal(input, block_start, target)
        } else {
            self.encode_lazy(input, block_start, target)
        }
    }

    fn setup_prefix(&mut self, prefix: &[u8]) {
        self.table.reset(prefix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::compress_bound;
    use crate::fast::FastCodec;

    fn encode<C: BlockCodec>(codec: &mut C, input: &[u8], start: usize) -> Vec<u8> {
        let mut dst = vec![0u8; compress_bound(input.len() - start)];
        let n = codec.encode_block(input, start, &mut dst).unwrap();
        dst.truncate(n);
        dst
    }

    fn decode(compressed: &[u8], len: usize) -> Vec<u8> {
        lz4_flex::block::decompress(compressed, len).unwrap()
    }

    fn text(len: usize) -> Vec<u8> {
        let words = [
            "stream", "block", "window", "history", "prefix", "codec", "match", "literal",
            "offset", "buffer",
        ];
        let mut out = Vec::with_capacity(len + 16);
        let mut state = 12345u32;
        while out.len() < len {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            out.extend_from_slice(words[(state >> 16) as usize % words.len()].as_bytes());
            out.push(b' ');
        }
        out.truncate(len);
        out
    }

    #[test]
    fn test_high_level_clamped() {
        assert_eq!(HighCodec::new(0).unwrap().level(), DEFAULT_HIGH_LEVEL);
        assert_eq!(HighCodec::new(1).unwrap().level(), MIN_HIGH_LEVEL);
        assert_eq!(HighCodec::new(9).unwrap().level(), 9);
        assert_eq!(HighCodec::new(40).unwrap().level(), MAX_LEVEL);
    }

    #[test]
    fn test_level_zero_matches_default() {
        let data = text(8 * 1024);
        let mut zero = HighCodec::new(0).unwrap();
        let mut nine = HighCodec::new(9).unwrap();
        assert_eq!(encode(&mut zero, &data, 0), encode(&mut nine, &data, 0));
    }

    #[test]
    fn test_search_depth() {
        assert_eq!(search_depth(3), 4);
        assert_eq!(search_depth(9), 256);
        assert_eq!(search_depth(10), 96);
        assert_eq!(search_depth(12), 8192);
        assert_eq!(sufficient_len(12), OPT_NUM);
    }

    #[test]
    fn test_sequence_price() {
        assert_eq!(literals_price(14), 14);
        assert_eq!(literals_price(15), 16);
        assert_eq!(literals_price(15 + 255), 15 + 255 + 2);
        assert_eq!(sequence_price(0, MIN_MATCH), 3);
        assert_eq!(sequence_price(3, MIN_MATCH + 15), 7);
    }

    #[test]
    fn test_pattern_helpers() {
        assert!(is_repetitive(u32::from_le_bytes(*b"aaaa")));
        assert!(is_repetitive(u32::from_le_bytes(*b"abab")));
        assert!(!is_repetitive(u32::from_le_bytes(*b"abcd")));

        let data = b"xyabababab!";
        let pattern = load32(data, 2);
        assert_eq!(count_pattern(data, 6, data.len(), pattern), 4);
        assert_eq!(reverse_count_pattern(data, 10, 0, pattern), 8);
        assert_eq!(reverse_count_pattern(data, 10, 5, pattern), 5);
    }

    #[test]
    fn test_high_tiny_block_is_literals() {
        let mut codec = HighCodec::new(9).unwrap();
        assert_eq!(encode(&mut codec, b"abc", 0), [0x30, b'a', b'b', b'c']);
    }

    #[test]
    fn test_high_not_worse_than_fast() {
        let data = text(32 * 1024);

        let mut fast = FastCodec::new(1).unwrap();
        let mut high = HighCodec::new(9).unwrap();

        let fast_out = encode(&mut fast, &data, 0);
        let high_out = encode(&mut high, &data, 0);
        assert!(high_out.len() <= fast_out.len());
        assert!(high_out.len() < data.len() / 2);
    }

    #[test]
    fn test_optimal_not_worse_than_lazy() {
        let data = text(16 * 1024);

        let lazy = encode(&mut HighCodec::new(9).unwrap(), &data, 0);
        let optimal = encode(&mut HighCodec::new(12).unwrap(), &data, 0);
        assert!(
            optimal.len() <= lazy.len(),
            "level 12 {} > level 9 {}",
            optimal.len(),
            lazy.len()
        );
        assert_eq!(decode(&optimal, data.len()), data);
    }

    #[test]
    fn test_optimal_levels_roundtrip() {
        let mut data = text(6000);
        data.extend(std::iter::repeat(b'z').take(3000));
        data.extend(b"ab".repeat(2000));
        data.extend(text(3000));

        for level in MIN_OPT_LEVEL..=MAX_LEVEL {
            let out = encode(&mut HighCodec::new(level).unwrap(), &data, 0);
            assert!(out.len() < data.len() / 2, "level {}", level);
            assert_eq!(decode(&out, data.len()), data, "level {}", level);
        }
    }

    #[test]
    fn test_pattern_runs_roundtrip() {
        // Long runs exercise the pattern skip in the chain walk
        let mut data = Vec::new();
        for i in 0..40u8 {
            data.extend(std::iter::repeat(i % 3).take(500 + i as usize * 7));
            data.extend(b"abcd".repeat(100 + i as usize));
        }

        for level in [8, 9] {
            let out = encode(&mut HighCodec::new(level).unwrap(), &data, 0);
            assert!(out.len() < data.len() / 10, "level {}", level);
            assert_eq!(decode(&out, data.len()), data, "level {}", level);
        }
    }

    #[test]
    fn test_high_prefix_right_aligned() {
        let dict = text(70_000);
        let tail = &dict[dict.len() - WINDOW_SIZE..];
        let block = text(5_000);

        for level in [6, 11] {
            let mut long = HighCodec::new(level).unwrap();
            long.setup_prefix(&dict);
            let mut long_input = dict.clone();
            long_input.extend_from_slice(&block);

            let mut short = HighCodec::new(level).unwrap();
            short.setup_prefix(tail);
            let mut short_input = tail.to_vec();
            short_input.extend_from_slice(&block);

            assert_eq!(
                encode(&mut long, &long_input, dict.len()),
                encode(&mut short, &short_input, tail.len())
            );
        }
    }

    #[test]
    fn test_high_undersized_target() {
        let data = text(4096);
        for level in [9, 12] {
            let mut codec = HighCodec::new(level).unwrap();
            let mut dst = vec![0u8; 16];
            assert_eq!(codec.encode_block(&data, 0, &mut dst), None);
        }
    }
}
