//! The succinct static trie index.
//!
//! [`Strie`] answers exact, range, neighbor and positional lookups over a
//! sorted byte-key list it was built from, without retaining the keys. The
//! whole tree is flattened into a handful of rank-indexed bitmaps; a node
//! is materialized purely from its id by rank arithmetic, never through
//! pointers.
//!
//! By default the index is lossy: path-compressed spans keep only their bit
//! length, so a query that was never inserted can still report a match.
//! Every key that *was* inserted resolves to its correct leaf. Build with
//! [`Opt`] to store full prefix content and make answers exact.

use crate::bitmap::Bitmap;
use crate::build;
use crate::codec::Codec;
use crate::error::Result;

/// Bits occupied by a big (byte-branching) inner node: one terminator plus
/// 256 byte labels.
pub(crate) const BIG_INNER_SIZE: usize = 257;
/// Key bits consumed by one big-node descent step.
pub(crate) const BIG_WORD_SIZE: usize = 8;
/// Bits occupied by a small (nibble-branching) inner node: one terminator
/// plus 16 nibble labels.
pub(crate) const INNER_SIZE: usize = 17;
/// Key bits consumed by one small-node descent step.
pub(crate) const WORD_SIZE: usize = 4;
/// Bits occupied by a short-form small node.
pub(crate) const SHORT_SIZE: usize = 7;

/// Decode table for short nodes: packed value to expanded 17-bit bitmap.
///
/// Child ids are ranks over the raw concatenated stream, so a packed form
/// must contain exactly as many set bits as the bitmap it stands for. The
/// table covers the three shapes that dominate real tries under that
/// constraint: the terminator-only chain node, terminator plus one label,
/// and the two lowest labels (bit-string tries). Each pattern takes the
/// smallest unused packed value of equal popcount.
pub(crate) fn build_short_table(short_size: usize) -> Vec<u32> {
    let slots = 1usize << short_size;
    let mut table = vec![0u32; slots];
    let mut used = vec![false; slots];

    let mut patterns: Vec<u32> = vec![1];
    for k in 1..=16 {
        patterns.push(1 | (1 << k));
    }
    patterns.push((1 << 1) | (1 << 2));

    for bm in patterns {
        let pc = bm.count_ones();
        let slot = (1..slots)
            .find(|&p| !used[p] && (p as u32).count_ones() == pc)
            .expect("short table out of slots");
        table[slot] = bm;
        used[slot] = true;
    }
    table
}

/// Cumulative node counts for all levels up to and including one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Level {
    pub inner: usize,
    pub leaf: usize,
}

/// A prefix store: which nodes have a prefix, and either content records
/// (delimited by select pairs on `positions`) or bare 2-byte bit lengths.
#[derive(Debug)]
pub(crate) struct PrefixStore {
    pub presence: Bitmap,
    pub positions: Option<Bitmap>,
    pub bytes: Vec<u8>,
}

/// The flattened tree: every succinct array plus the level table.
#[derive(Debug)]
pub(crate) struct Tree {
    pub node_types: Bitmap,
    pub inners: Bitmap,
    pub big_inner_cnt: usize,
    pub big_inner_offset: usize,
    pub short_size: usize,
    pub short_mask: u64,
    pub short_bm: Bitmap,
    pub short_table: Vec<u32>,
    pub inner_prefixes: Option<PrefixStore>,
    pub leaf_prefixes: Option<PrefixStore>,
    pub leaves: Vec<u8>,
    pub levels: Vec<Level>,
}

impl Tree {
    /// Tree of an empty key list. Every query on it answers "absent".
    pub fn empty() -> Self {
        Tree {
            node_types: Bitmap::new(Vec::new(), 0),
            inners: Bitmap::wide(Vec::new(), 0),
            big_inner_cnt: 0,
            big_inner_offset: 0,
            short_size: SHORT_SIZE,
            short_mask: (1 << SHORT_SIZE) - 1,
            short_bm: Bitmap::new(Vec::new(), 0),
            short_table: build_short_table(SHORT_SIZE),
            inner_prefixes: None,
            leaf_prefixes: None,
            leaves: Vec::new(),
            levels: vec![Level { inner: 0, leaf: 0 }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node_types.is_empty()
    }

    /// Number of keys, i.e. leaves across all levels.
    pub fn key_count(&self) -> usize {
        self.levels[self.levels.len() - 1].leaf
    }

    /// Leaf ordinal of a leaf node id. Panics if `id` is an inner node:
    /// callers own the invariant that only terminal ids reach here.
    pub fn leaf_ordinal(&self, id: usize) -> usize {
        let (rank, bit) = self.node_types.rank1(id);
        if bit != 0 {
            panic!("node {id} is an inner node, not a leaf");
        }
        id - rank
    }
}

/// Build options.
///
/// Both flags default to `false`: prefixes keep only their bit length and
/// single-key tails are folded into terminator chains, which preserves key
/// lengths structurally but drops their content, so lookups of absent keys
/// may report a plausible neighbor as a match. Enabling both stores every
/// dropped bit and makes all answers exact.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Opt {
    /// Store the content of inner-node prefixes instead of their length.
    pub inner_prefix: bool,
    /// Collapse single-key tails into leaves and store the remaining bytes.
    pub leaf_prefix: bool,
}

/// Shape counters, mostly useful in tests and capacity planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Number of keys.
    pub keys: usize,
    /// Number of inner nodes.
    pub inners: usize,
    /// Inner nodes stored in the 257-bit byte-branching form.
    pub big_inners: usize,
    /// Inner nodes stored in the compressed short form.
    pub short_inners: usize,
    /// Depth of the tree in levels.
    pub levels: usize,
}

/// A succinct, static, ordered-key index.
///
/// Built once from a sorted key/value list; immutable afterwards. All
/// query state lives on the caller's stack, so a shared instance can be
/// queried from any number of threads without coordination.
pub struct Strie<C: Codec> {
    codec: C,
    tree: Tree,
}

impl<C: Codec> Strie<C> {
    /// Build an index with default (lossy) options.
    ///
    /// Keys must be unique and in ascending byte order, and `values` must
    /// have one entry per key.
    pub fn new(codec: C, keys: &[impl AsRef<[u8]>], values: &[C::Value]) -> Result<Self> {
        Self::with_options(codec, keys, values, Opt::default())
    }

    /// Build an index with explicit [`Opt`].
    pub fn with_options(
        codec: C,
        keys: &[impl AsRef<[u8]>],
        values: &[C::Value],
        opt: Opt,
    ) -> Result<Self> {
        let tree = build::build(&codec, keys, values, opt)?;
        Ok(Strie { codec, tree })
    }

    /// Number of keys in the index.
    pub fn len(&self) -> usize {
        self.tree.key_count()
    }

    /// Return true if the index holds no keys.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Shape counters.
    pub fn stats(&self) -> Stats {
        let bottom = &self.tree.levels[self.tree.levels.len() - 1];
        Stats {
            keys: bottom.leaf,
            inners: bottom.inner,
            big_inners: self.tree.big_inner_cnt,
            short_inners: self.tree.short_bm.count_ones(),
            levels: self.tree.levels.len() - 1,
        }
    }

    /// Value associated with `key`, or `None`.
    ///
    /// A `Some` answer can be a false positive unless the index was built
    /// with both [`Opt`] flags; a `None` answer is always correct.
    pub fn get(&self, key: &[u8]) -> Option<C::Value> {
        self.tree.get_id(key).map(|id| self.leaf_value(id))
    }

    /// Terminal node id for `key`, for callers resolving their own tables.
    pub fn get_id(&self, key: &[u8]) -> Option<usize> {
        self.tree.get_id(key)
    }

    /// Value of the range `[start, end]` containing `key`: the equal match
    /// if any, otherwise the value of the greatest key smaller than `key`.
    pub fn range_get(&self, key: &[u8]) -> Option<C::Value> {
        let (l, eq, _) = self.tree.search_ids(key);
        eq.or(l).map(|id| self.leaf_value(id))
    }

    /// Values of the greatest key smaller than, equal to, and smallest key
    /// greater than `key`.
    pub fn neighbors(&self, key: &[u8]) -> (Option<C::Value>, Option<C::Value>, Option<C::Value>) {
        let (l, eq, r) = self.tree.search_ids(key);
        (
            l.map(|id| self.leaf_value(id)),
            eq.map(|id| self.leaf_value(id)),
            r.map(|id| self.leaf_value(id)),
        )
    }

    /// Sorted position of `key`, or `None` when no match is found.
    pub fn position(&self, key: &[u8]) -> Option<usize> {
        self.tree.index_of(key)
    }

    /// Sorted positions `(l, r)` bracketing `key`: equal on a match,
    /// adjacent otherwise, `None` beyond either end of the key list.
    pub fn position_pair(&self, key: &[u8]) -> (Option<usize>, Option<usize>) {
        self.tree.index_pair(key)
    }

    fn leaf_value(&self, id: usize) -> C::Value {
        let ith = self.tree.leaf_ordinal(id);
        let size = self.codec.encoded_size();
        self.codec.decode(&self.tree.leaves[ith * size..(ith + 1) * size])
    }
}

impl<C: Codec> std::fmt::Debug for Strie<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.stats();
        f.debug_struct("Strie")
            .field("keys", &s.keys)
            .field("inners", &s.inners)
            .field("big_inners", &s.big_inners)
            .field("short_inners", &s.short_inners)
            .field("levels", &s.levels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_table_preserves_popcount() {
        let table = build_short_table(SHORT_SIZE);
        assert_eq!(table.len(), 1 << SHORT_SIZE);
        let mut seen = std::collections::HashSet::new();
        let mut nonzero = 0;
        for (packed, &bm) in table.iter().enumerate() {
            if bm == 0 {
                continue;
            }
            nonzero += 1;
            assert!(bm < 1 << INNER_SIZE);
            assert_eq!((packed as u32).count_ones(), bm.count_ones());
            assert!(seen.insert(bm), "pattern assigned twice");
        }
        // Chain, terminator-plus-label x16, lowest-two-labels.
        assert_eq!(nonzero, 18);
        assert!(seen.contains(&1));
        assert!(seen.contains(&(1 | 1 << 16)));
        assert!(seen.contains(&(1 << 1 | 1 << 2)));
    }
}
