//! Builder pipeline: sorted keys and values in, succinct arrays out.
//!
//! The pipeline has four stages. Validation rejects unsorted or duplicate
//! keys. A path-compressed nibble trie is built recursively over the key
//! list. A merge pass turns dense top levels into byte-branching big nodes
//! (they must form a BFS prefix, so merging proceeds level by level from
//! the root and stops at the first level that does not qualify). Emission
//! walks the tree in BFS order, which *is* the node-id order, and appends
//! each node's bits to the shared streams.

use std::collections::HashMap;

use crate::bitmap::Bitmap;
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::trie::{
    build_short_table, Level, Opt, PrefixStore, Tree, BIG_INNER_SIZE, INNER_SIZE, SHORT_SIZE,
};

/// Minimum average label count for a level to merge into big nodes.
const MERGE_MIN_LABELS: usize = 8;

/// Build the flattened tree. `keys` must be validated ascending-unique.
pub(crate) fn build<C: Codec>(
    codec: &C,
    keys: &[impl AsRef<[u8]>],
    values: &[C::Value],
    opt: Opt,
) -> Result<Tree> {
    if keys.len() != values.len() {
        return Err(Error::KeyValueLenMismatch {
            keys: keys.len(),
            values: values.len(),
        });
    }
    let keys: Vec<&[u8]> = keys.iter().map(|k| k.as_ref()).collect();
    for (i, pair) in keys.windows(2).enumerate() {
        match pair[0].cmp(pair[1]) {
            std::cmp::Ordering::Less => {}
            std::cmp::Ordering::Equal => return Err(Error::DuplicateKey(i + 1)),
            std::cmp::Ordering::Greater => return Err(Error::KeyOutOfOrder(i + 1)),
        }
    }
    if keys.is_empty() {
        return Ok(Tree::empty());
    }

    let mut arena = Arena {
        nodes: Vec::new(),
        keys: &keys,
        opt,
    };
    let root = arena.subtree(0, keys.len(), 0);
    let big_inner_cnt = arena.merge_big_levels(root);
    Ok(arena.emit(root, big_inner_cnt, codec, values))
}

/// High-first nibble at `pos` of a key.
fn nibble(key: &[u8], pos: usize) -> u8 {
    let b = key[pos >> 1];
    if pos & 1 == 0 {
        b >> 4
    } else {
        b & 0xf
    }
}

fn nib_len(key: &[u8]) -> usize {
    key.len() * 2
}

enum Raw {
    Inner {
        /// Nibble position where the node's span begins.
        depth: usize,
        /// Shared nibbles before the branch point.
        prefix: usize,
        /// Index of a key passing through the node, for prefix content.
        rep: usize,
        big: bool,
        /// `(label, child)` ascending; label 0 is the terminator,
        /// otherwise `1 +` nibble (or `1 +` byte after merging).
        edges: Vec<(u16, usize)>,
    },
    Leaf {
        key: usize,
        depth: usize,
    },
}

struct Arena<'a> {
    nodes: Vec<Raw>,
    keys: &'a [&'a [u8]],
    opt: Opt,
}

impl Arena<'_> {
    fn push(&mut self, node: Raw) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Build the subtree of `keys[lo..hi]`, which all share the walk up to
    /// `depth` nibbles.
    fn subtree(&mut self, lo: usize, hi: usize, depth: usize) -> usize {
        if hi - lo == 1 {
            let rem = nib_len(self.keys[lo]) - depth;
            if rem == 0 || self.opt.leaf_prefix {
                return self.push(Raw::Leaf { key: lo, depth });
            }
            // Fold the tail into a terminator chain: the length survives
            // structurally even when the content is dropped.
            let leaf = self.push(Raw::Leaf {
                key: lo,
                depth: depth + rem,
            });
            return self.push(Raw::Inner {
                depth,
                prefix: rem,
                rep: lo,
                big: false,
                edges: vec![(0, leaf)],
            });
        }

        let first = self.keys[lo];
        let last = self.keys[hi - 1];
        let mut lcp = 0;
        while depth + lcp < nib_len(first)
            && depth + lcp < nib_len(last)
            && nibble(first, depth + lcp) == nibble(last, depth + lcp)
        {
            lcp += 1;
        }
        let at = depth + lcp;

        let mut edges = Vec::new();
        let mut i = lo;
        if nib_len(first) == at {
            // Only the smallest key of the group can end at the branch
            // point; it takes the terminator edge.
            let child = self.subtree(lo, lo + 1, at);
            edges.push((0, child));
            i = lo + 1;
        }
        while i < hi {
            let nib = nibble(self.keys[i], at);
            let mut j = i + 1;
            while j < hi && nibble(self.keys[j], at) == nib {
                j += 1;
            }
            let child = self.subtree(i, j, at + 1);
            edges.push((1 + nib as u16, child));
            i = j;
        }
        self.push(Raw::Inner {
            depth,
            prefix: lcp,
            rep: lo,
            big: false,
            edges,
        })
    }

    /// Merge dense top levels into byte-branching nodes; returns how many
    /// inner nodes became big. Big nodes must occupy the lowest inner
    /// indices, so merging is all-or-nothing per level and stops at the
    /// first level that fails.
    fn merge_big_levels(&mut self, root: usize) -> usize {
        let mut big_cnt = 0;
        let mut level = vec![root];
        loop {
            let inners: Vec<usize> = level
                .iter()
                .copied()
                .filter(|&id| matches!(self.nodes[id], Raw::Inner { .. }))
                .collect();
            if inners.is_empty() {
                break;
            }
            let mut total_labels = 0usize;
            let mut ok = true;
            for &id in &inners {
                match self.merged_label_count(id) {
                    Some(c) => total_labels += c,
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if !ok || total_labels < inners.len() * MERGE_MIN_LABELS {
                break;
            }
            for &id in &inners {
                self.merge_node(id);
            }
            big_cnt += inners.len();

            let mut next = Vec::new();
            for &id in &level {
                if let Raw::Inner { edges, .. } = &self.nodes[id] {
                    next.extend(edges.iter().map(|&(_, ch)| ch));
                }
            }
            level = next;
        }
        big_cnt
    }

    /// Byte-label count the node would have after merging, or `None` when
    /// it cannot merge.
    fn merged_label_count(&self, id: usize) -> Option<usize> {
        let Raw::Inner {
            depth,
            prefix,
            edges,
            ..
        } = &self.nodes[id]
        else {
            return None;
        };
        let at = depth + prefix;
        if at % 2 == 1 {
            // The last prefix nibble becomes the high half of every label.
            if *prefix == 0 {
                return None;
            }
            return Some(edges.len());
        }
        // Children must branch immediately so that two nibble levels
        // collapse into one byte level.
        let mut count = 0;
        for &(label, child) in edges {
            if label == 0 {
                count += 1;
                continue;
            }
            match &self.nodes[child] {
                Raw::Inner {
                    prefix: 0, edges, ..
                } => {
                    debug_assert!(edges.first().is_some_and(|&(l, _)| l != 0));
                    count += edges.len();
                }
                _ => return None,
            }
        }
        Some(count)
    }

    fn merge_node(&mut self, id: usize) {
        let (depth, prefix, old_edges) = match &self.nodes[id] {
            Raw::Inner {
                depth,
                prefix,
                edges,
                ..
            } => (*depth, *prefix, edges.clone()),
            Raw::Leaf { .. } => unreachable!("only inner nodes merge"),
        };
        let at = depth + prefix;

        let (new_prefix, new_edges) = if at % 2 == 1 {
            let rep = match &self.nodes[id] {
                Raw::Inner { rep, .. } => *rep,
                Raw::Leaf { .. } => unreachable!(),
            };
            let hi = nibble(self.keys[rep], at - 1) as u16;
            let edges = old_edges
                .iter()
                .map(|&(label, child)| (1 + ((hi << 4) | (label - 1)), child))
                .collect();
            (prefix - 1, edges)
        } else {
            let mut edges = Vec::new();
            for &(label, child) in &old_edges {
                if label == 0 {
                    edges.push((0, child));
                    continue;
                }
                let hi = label - 1;
                let grand = match &self.nodes[child] {
                    Raw::Inner { edges, .. } => edges.clone(),
                    Raw::Leaf { .. } => unreachable!("checked by merged_label_count"),
                };
                for (clabel, gchild) in grand {
                    edges.push((1 + ((hi << 4) | (clabel - 1)), gchild));
                }
            }
            (prefix, edges)
        };

        if let Raw::Inner {
            prefix, big, edges, ..
        } = &mut self.nodes[id]
        {
            *prefix = new_prefix;
            *big = true;
            *edges = new_edges;
        }
    }

    /// BFS emission: ids are assigned in traversal order and every array is
    /// appended to in that same order.
    fn emit<C: Codec>(&self, root: usize, big_cnt: usize, codec: &C, values: &[C::Value]) -> Tree {
        let short_table = build_short_table(SHORT_SIZE);
        let mut short_index: HashMap<u32, u64> = HashMap::new();
        for (packed, &bm) in short_table.iter().enumerate() {
            if bm != 0 {
                short_index.insert(bm, packed as u64);
            }
        }

        // (arena id, level) in BFS order.
        let mut order: Vec<(usize, usize)> = vec![(root, 1)];
        let mut head = 0;
        while head < order.len() {
            let (id, lvl) = order[head];
            head += 1;
            if let Raw::Inner { edges, .. } = &self.nodes[id] {
                for &(_, child) in edges {
                    order.push((child, lvl + 1));
                }
            }
        }

        let mut node_types = BitWriter::default();
        let mut inners = BitWriter::default();
        let mut short_bm = BitWriter::default();
        let mut ipresence = BitWriter::default();
        let mut ibytes: Vec<u8> = Vec::new();
        let mut istarts: Vec<usize> = Vec::new();
        let mut lpresence = BitWriter::default();
        let mut lbytes: Vec<u8> = Vec::new();
        let mut lstarts: Vec<usize> = Vec::new();
        let mut leaves: Vec<u8> = Vec::new();
        let mut levels: Vec<Level> = vec![Level { inner: 0, leaf: 0 }];

        for &(id, lvl) in &order {
            if levels.len() == lvl {
                levels.push(Level { inner: 0, leaf: 0 });
            }
            match &self.nodes[id] {
                Raw::Leaf { key, depth } => {
                    node_types.push_bit(false);
                    levels[lvl].leaf += 1;
                    if self.opt.leaf_prefix {
                        let tail = &self.keys[*key][depth >> 1..];
                        lpresence.push_bit(!tail.is_empty());
                        if !tail.is_empty() {
                            lstarts.push(lbytes.len());
                            lbytes.extend_from_slice(tail);
                        }
                    }
                    codec.encode(&values[*key], &mut leaves);
                }
                Raw::Inner {
                    depth,
                    prefix,
                    rep,
                    big,
                    edges,
                } => {
                    node_types.push_bit(true);
                    levels[lvl].inner += 1;

                    if *big {
                        let mut bits = [0u64; 5];
                        for &(label, _) in edges {
                            bits[label as usize >> 6] |= 1 << (label & 63);
                        }
                        inners.push_words(&bits, BIG_INNER_SIZE);
                        short_bm.push_bit(false);
                    } else {
                        let mut bm = 0u32;
                        for &(label, _) in edges {
                            bm |= 1 << label;
                        }
                        match short_index.get(&bm) {
                            Some(&packed) => {
                                short_bm.push_bit(true);
                                inners.push_bits(packed, SHORT_SIZE);
                            }
                            None => {
                                short_bm.push_bit(false);
                                inners.push_bits(bm as u64, INNER_SIZE);
                            }
                        }
                    }

                    ipresence.push_bit(*prefix > 0);
                    if *prefix > 0 {
                        if self.opt.inner_prefix {
                            let start = depth >> 1;
                            let end = (depth + prefix + 1) >> 1;
                            let unused = ((end * 2 - (depth + prefix)) * 4) as u8;
                            istarts.push(ibytes.len());
                            ibytes.push(unused);
                            ibytes.extend_from_slice(&self.keys[*rep][start..end]);
                        } else {
                            let step = prefix * 4;
                            assert!(step <= u16::MAX as usize, "prefix span too long");
                            ibytes.extend_from_slice(&(step as u16).to_le_bytes());
                        }
                    }
                }
            }
        }

        // Running counts per level into cumulative ones.
        for lvl in 1..levels.len() {
            levels[lvl].inner += levels[lvl - 1].inner;
            levels[lvl].leaf += levels[lvl - 1].leaf;
        }

        let n_inner = levels[levels.len() - 1].inner;
        let inner_prefixes = (ipresence.ones > 0).then(|| PrefixStore {
            presence: ipresence.into_bitmap_wide(),
            positions: self
                .opt
                .inner_prefix
                .then(|| position_bitmap(&istarts, ibytes.len())),
            bytes: ibytes,
        });
        let leaf_prefixes = self.opt.leaf_prefix.then(|| PrefixStore {
            presence: lpresence.into_bitmap(),
            positions: Some(position_bitmap(&lstarts, lbytes.len())),
            bytes: lbytes,
        });

        Tree {
            node_types: node_types.into_bitmap(),
            inners: inners.into_bitmap_wide(),
            big_inner_cnt: big_cnt,
            big_inner_offset: (BIG_INNER_SIZE - INNER_SIZE) * big_cnt,
            short_size: SHORT_SIZE,
            short_mask: (1 << SHORT_SIZE) - 1,
            short_bm: short_bm.into_bitmap(),
            short_table,
            inner_prefixes,
            leaf_prefixes,
            leaves,
            levels,
        }
        .validated(n_inner)
    }
}

impl Tree {
    /// Cheap structural checks before the tree is handed out: every
    /// non-root node must be pointed to by exactly one stream bit.
    fn validated(self, n_inner: usize) -> Tree {
        debug_assert_eq!(self.inners.count_ones() + 1, self.node_types.len());
        debug_assert_eq!(self.short_bm.len(), n_inner);
        self
    }
}

/// Bitmap marking each record start plus a final sentinel, so that a
/// select pair delimits record `i`.
fn position_bitmap(starts: &[usize], total: usize) -> Bitmap {
    let len = total + 1;
    let mut words = vec![0u64; len.div_ceil(64)];
    for &pos in starts.iter().chain(std::iter::once(&total)) {
        words[pos >> 6] |= 1 << (pos & 63);
    }
    Bitmap::with_select(words, len)
}

/// Append-only bit stream.
#[derive(Default)]
struct BitWriter {
    words: Vec<u64>,
    len: usize,
    ones: usize,
}

impl BitWriter {
    fn push_bits(&mut self, value: u64, n: usize) {
        debug_assert!(n <= 64);
        let v = if n == 64 { value } else { value & ((1u64 << n) - 1) };
        self.ones += v.count_ones() as usize;
        let off = self.len & 63;
        if off == 0 {
            self.words.push(v);
        } else {
            *self.words.last_mut().expect("offset implies a word") |= v << off;
            if off + n > 64 {
                self.words.push(v >> (64 - off));
            }
        }
        self.len += n;
    }

    fn push_bit(&mut self, set: bool) {
        self.push_bits(set as u64, 1);
    }

    fn push_words(&mut self, words: &[u64], nbits: usize) {
        let mut left = nbits;
        for &w in words {
            let take = left.min(64);
            self.push_bits(w, take);
            left -= take;
            if left == 0 {
                break;
            }
        }
    }

    fn trim(&mut self) {
        self.words.truncate(self.len.div_ceil(64));
    }

    fn into_bitmap(mut self) -> Bitmap {
        self.trim();
        Bitmap::new(self.words, self.len)
    }

    fn into_bitmap_wide(mut self) -> Bitmap {
        self.trim();
        Bitmap::wide(self.words, self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::U64;

    fn keys(list: &[&str]) -> Vec<Vec<u8>> {
        list.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_bit_writer_straddles_words() {
        let mut w = BitWriter::default();
        w.push_bits(0x1FFFF, 17);
        w.push_bits(0, 17);
        w.push_bits(0x1FFFF, 17);
        w.push_bits(0x7F, 7);
        // 58 bits so far; the next 17-bit group crosses the word boundary.
        w.push_bits(0x15555, 17);
        assert_eq!(w.len, 75);
        w.trim();
        assert_eq!(w.words.len(), 2);
        let bm = Bitmap::new(w.words.clone(), w.len);
        let (ones, _) = bm.rank1(74);
        assert_eq!(ones + bm.get(74) as usize, 17 + 17 + 7 + 9);
    }

    #[test]
    fn test_structural_invariants() {
        let ks = keys(&["abc", "abcd", "abd", "abde", "bc", "bcd", "bcde", "cde"]);
        let vals: Vec<u64> = (0..8).collect();
        let tree = build(&U64, &ks, &vals, Opt::default()).unwrap();

        // One stream bit per non-root node.
        assert_eq!(tree.inners.count_ones() + 1, tree.node_types.len());
        // Levels are cumulative and end at the full counts.
        for w in tree.levels.windows(2) {
            assert!(w[0].inner <= w[1].inner && w[0].leaf <= w[1].leaf);
        }
        assert_eq!(tree.key_count(), 8);
        assert_eq!(
            tree.levels[tree.levels.len() - 1].inner + tree.key_count(),
            tree.node_types.len()
        );
        // Text keys at this size stay in nibble form.
        assert_eq!(tree.big_inner_cnt, 0);
        // Terminator chains compress to the short form.
        assert!(tree.short_bm.count_ones() > 0);
    }

    #[test]
    fn test_rejects_bad_input() {
        let vals: Vec<u64> = vec![1, 2];
        assert_eq!(
            build(&U64, &keys(&["a", "a"]), &vals, Opt::default()).unwrap_err(),
            Error::DuplicateKey(1)
        );
        assert_eq!(
            build(&U64, &keys(&["ab", "aa"]), &vals, Opt::default()).unwrap_err(),
            Error::KeyOutOfOrder(1)
        );
        assert_eq!(
            build(&U64, &keys(&["ab", "abc"]), &[1u64], Opt::default()).unwrap_err(),
            Error::KeyValueLenMismatch { keys: 2, values: 1 }
        );
        assert!(build(&U64, &keys(&["ab", "abc"]), &vals, Opt::default()).is_ok());
    }

    #[test]
    fn test_dense_bytes_merge_into_big_nodes() {
        let mut ks: Vec<Vec<u8>> = Vec::new();
        let mut vals: Vec<u64> = Vec::new();
        for i in 0..16u8 {
            for j in 0..16u8 {
                ks.push(vec![i, j]);
                vals.push((i as u64) * 16 + j as u64);
            }
        }
        let tree = build(&U64, &ks, &vals, Opt::default()).unwrap();
        // Root and the 16 second-level nodes all branch on full bytes.
        assert_eq!(tree.big_inner_cnt, 17);
        assert_eq!(tree.levels[tree.levels.len() - 1].inner, 17);
    }
}
