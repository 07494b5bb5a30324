//! Node decoder: materialize a node, by id, into a query session.
//!
//! Nothing in the index is a pointer. An id is turned into a node view by
//! rank arithmetic: the node-type rank gives the inner (or leaf) ordinal,
//! the ordinal gives the bit range inside the concatenated child-presence
//! stream, and the same stream's ranks then give child ids.

use crate::prefix;
use crate::trie::{Tree, BIG_INNER_SIZE, BIG_WORD_SIZE, INNER_SIZE, WORD_SIZE};

/// Per-call scratch holding the decoded view of the current node.
#[derive(Debug, Default)]
pub(crate) struct QuerySession<'a> {
    /// Whether the node is inner; the remaining fields split on this.
    pub is_inner: bool,

    pub ith_inner: usize,
    /// Bit range of the node inside the child-presence stream.
    pub from: usize,
    pub to: usize,
    /// Key bits consumed per descent step at this node: 8 or 4.
    pub word_size: usize,
    /// Expanded 17-bit label bitmap, cached when the node is short.
    pub bm: u64,

    pub has_prefix_content: bool,
    /// Prefix length in bits; from the byte-aligned position when content
    /// is stored, from the node's position otherwise.
    pub prefix_len: usize,
    pub prefix: &'a [u8],

    pub ith_leaf: usize,
    pub has_leaf_prefix: bool,
    pub leaf_prefix: &'a [u8],
}

impl Tree {
    /// Fill `sess` with the node `id`.
    pub fn decode_node<'a>(&'a self, id: usize, sess: &mut QuerySession<'a>) {
        sess.is_inner = false;
        sess.prefix_len = 0;
        sess.has_prefix_content = false;
        sess.has_leaf_prefix = false;

        let (rank, bit) = self.node_types.rank1(id);
        if bit == 0 {
            sess.ith_leaf = id - rank;
            if let Some(lp) = &self.leaf_prefixes {
                let (ith_pref, present) = lp.presence.rank1(sess.ith_leaf);
                if present == 1 {
                    let record = lp
                        .positions
                        .as_ref()
                        .and_then(|pos| pos.select_pair(ith_pref));
                    if let Some((from, to)) = record {
                        sess.has_leaf_prefix = true;
                        sess.leaf_prefix = &lp.bytes[from..to];
                    }
                }
            }
            return;
        }

        sess.is_inner = true;
        sess.ith_inner = rank;
        self.decode_ith_inner(rank, sess);

        if let Some(ip) = &self.inner_prefixes {
            let (ith_pref, present) = ip.presence.rank1(rank);
            if present == 1 {
                match &ip.positions {
                    Some(pos) => {
                        if let Some((from, to)) = pos.select_pair(ith_pref) {
                            sess.prefix = &ip.bytes[from..to];
                            sess.prefix_len = prefix::content_bit_len(sess.prefix);
                            sess.has_prefix_content = true;
                        }
                    }
                    None => {
                        sess.prefix_len = prefix::step_bit_len(&ip.bytes, ith_pref);
                    }
                }
            }
        }
    }

    /// Bit range and word size for the `ith` inner node.
    fn decode_ith_inner(&self, ith: usize, sess: &mut QuerySession<'_>) {
        if ith < self.big_inner_cnt {
            sess.word_size = BIG_WORD_SIZE;
            sess.from = ith * BIG_INNER_SIZE;
            sess.to = sess.from + BIG_INNER_SIZE;
            return;
        }
        sess.word_size = WORD_SIZE;

        let (ith_short, short) = self.short_bm.rank1(ith);
        sess.from =
            self.big_inner_offset + INNER_SIZE * ith - (INNER_SIZE - self.short_size) * ith_short;
        if short == 1 {
            sess.to = sess.from + self.short_size;
            let j = sess.from & 63;
            let words = self.inners.words();
            let w = words[sess.from >> 6];
            let packed = if j + self.short_size <= 64 {
                (w >> j) & self.short_mask
            } else {
                ((w >> j) | (words[sess.to >> 6] << (64 - j))) & self.short_mask
            };
            sess.bm = self.short_table[packed as usize] as u64;
        } else {
            sess.to = sess.from + INNER_SIZE;
        }
    }

    /// Bit offset of the `ith` inner node in the child-presence stream.
    pub fn ith_inner_from(&self, ith: usize) -> usize {
        if ith < self.big_inner_cnt {
            return ith * BIG_INNER_SIZE;
        }
        let (ith_short, _) = self.short_bm.rank1(ith);
        self.big_inner_offset + INNER_SIZE * ith - (INNER_SIZE - self.short_size) * ith_short
    }

    /// Resolve the label the key points at and return `(left, present)`:
    /// the id of the child left of the label, and whether the label's
    /// branch exists. The child taken is `left + present`; when absent,
    /// `left` still names the nearest left branch's endpoint.
    pub fn left_child(&self, sess: &QuerySession<'_>, key: &[u8], ki: usize) -> (usize, usize) {
        let label = label_index(sess, key, ki);
        if sess.to - sess.from == self.short_size {
            let (rank, _) = self.inners.rank1(sess.from);
            let below = (sess.bm & ((1u64 << label) - 1)).count_ones() as usize;
            (rank + below, ((sess.bm >> label) & 1) as usize)
        } else {
            self.inners.rank1(sess.from + label)
        }
    }
}

/// Label index for the key bit position `ki`: 0 is the terminator, taken
/// when the key is exhausted; otherwise `1 +` the next byte or nibble.
fn label_index(sess: &QuerySession<'_>, key: &[u8], ki: usize) -> usize {
    if ki >= key.len() * 8 {
        return 0;
    }
    let b = key[ki >> 3];
    if sess.word_size == BIG_WORD_SIZE {
        1 + b as usize
    } else {
        let nib = if (ki & 7) < 4 { b >> 4 } else { b & 0xf };
        1 + nib as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_index_nibbles_and_bytes() {
        let small = QuerySession {
            word_size: WORD_SIZE,
            ..QuerySession::default()
        };
        let big = QuerySession {
            word_size: BIG_WORD_SIZE,
            ..QuerySession::default()
        };
        let key = [0xAB, 0x5C];
        assert_eq!(label_index(&small, &key, 0), 1 + 0xA);
        assert_eq!(label_index(&small, &key, 4), 1 + 0xB);
        assert_eq!(label_index(&small, &key, 8), 1 + 0x5);
        assert_eq!(label_index(&small, &key, 12), 1 + 0xC);
        assert_eq!(label_index(&big, &key, 0), 1 + 0xAB);
        assert_eq!(label_index(&big, &key, 8), 1 + 0x5C);
        // Key exhausted: terminator on both widths.
        assert_eq!(label_index(&small, &key, 16), 0);
        assert_eq!(label_index(&big, &key, 16), 0);
    }
}
