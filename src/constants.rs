// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

/// Minimum match length of the block format
pub const MIN_MATCH: usize = 4;

/// The last bytes of a block are always emitted as literals
pub const LAST_LITERALS: usize = 5;

/// The last match must start at least this many bytes before the block end
pub const MF_LIMIT: usize = 12;

/// Largest back-reference distance the format can express
pub const MAX_DISTANCE: usize = 65535;

/// Maximum amount of history carried across a window reset (64KB)
pub const WINDOW_SIZE: usize = 64 << 10;

/// Token nibble mask for literal and match lengths
pub const RUN_MASK: usize = 15;

/// Default block size (64KB)
pub const DEFAULT_BLOCK_SIZE: usize = 64 << 10;

/// Maximum block size (4MB)
pub const MAX_BLOCK_SIZE: usize = 4 << 20;

/// Upper bound for the ring buffer capacity (1GB)
pub const MAX_RING_CAPACITY: usize = 1 << 30;

/// Levels below this select the fast codec
pub const MIN_HIGH_LEVEL: u32 = 3;

/// Level used by the high codec when asked for level 0
pub const DEFAULT_HIGH_LEVEL: u32 = 9;

/// First level that parses with a price model instead of lazy matching
pub const MIN_OPT_LEVEL: u32 = 10;

/// Highest supported compression level
pub const MAX_LEVEL: u32 = 12;

/// Fast codec hash table size (bits)
pub const FAST_HASH_LOG: u32 = 12;

/// High codec hash head table size (bits)
pub const HIGH_HASH_LOG: u32 = 15;

/// Positions priced per optimal parsing segment
pub const OPT_NUM: usize = 1 << 12;

/// Search step of the fast codec grows after 2^SKIP_TRIGGER misses
pub const SKIP_TRIGGER: u32 = 6;
