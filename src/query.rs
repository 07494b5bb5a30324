//! Query engine: one descent loop per operation, differing only in what
//! they track on a mismatch.
//!
//! All four walks share the same skeleton: decode the current node, apply
//! its prefix (compare when content is stored, skip when only the length
//! is), resolve the child for the next key word, descend. The exact lookup
//! gives up on the first mismatch; the neighbor walk keeps the nearest
//! sibling branches; the positional walks carry a [`WalkCursor`] counting
//! leaves left of the path.

use std::cmp::Ordering;

use crate::cursor::WalkCursor;
use crate::node::QuerySession;
use crate::prefix::prefix_compare;
use crate::trie::Tree;

impl Tree {
    /// Terminal node id for `key`, or `None` on a structural mismatch.
    pub fn get_id(&self, key: &[u8]) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let lbits = key.len() * 8;
        let mut i = 0usize;
        let mut eq = 0usize;
        let mut sess = QuerySession::default();

        loop {
            self.decode_node(eq, &mut sess);
            if !sess.is_inner {
                break;
            }

            if sess.has_prefix_content {
                if prefix_compare(&key[i >> 3..], sess.prefix) != Ordering::Equal {
                    return None;
                }
                i = (i & !7) + sess.prefix_len;
            } else {
                i += sess.prefix_len;
            }
            if i > lbits {
                return None;
            }

            let (left, present) = self.left_child(&sess, key, i);
            if present == 0 {
                return None;
            }
            eq = left + 1;

            if i == lbits {
                // Terminator taken: the leaf carries no prefix, skip its
                // decode entirely.
                break;
            }
            i += sess.word_size;
        }

        if self.leaf_prefixes.is_some() {
            if i == lbits {
                if sess.has_leaf_prefix {
                    return None;
                }
            } else if !sess.has_leaf_prefix || sess.leaf_prefix != &key[i >> 3..] {
                return None;
            }
        }
        Some(eq)
    }

    /// Leaf ids of the greatest key smaller than, equal to, and smallest
    /// key greater than `key`.
    pub fn search_ids(&self, key: &[u8]) -> (Option<usize>, Option<usize>, Option<usize>) {
        if self.is_empty() {
            return (None, None, None);
        }
        let lbits = key.len() * 8;
        let mut i = 0usize;
        let mut l: Option<usize> = None;
        let mut eq: Option<usize> = Some(0);
        let mut r: Option<usize> = None;
        let mut sess = QuerySession::default();

        loop {
            self.decode_node(eq.unwrap(), &mut sess);
            if !sess.is_inner {
                break;
            }

            if sess.has_prefix_content {
                match prefix_compare(&key[i >> 3..], sess.prefix) {
                    Ordering::Equal => i = (i & !7) + sess.prefix_len,
                    Ordering::Less => {
                        r = eq.take();
                        break;
                    }
                    Ordering::Greater => {
                        l = eq.take();
                        break;
                    }
                }
            } else {
                i += sess.prefix_len;
                if i > lbits {
                    r = eq.take();
                    break;
                }
            }

            let (left, present) = self.left_child(&sess, key, i);
            let child = left + present;
            let right = child + 1;

            let (first, _) = self.inners.rank1(sess.from);
            let first = first + 1;
            let (last, bit) = self.inners.rank1(sess.to - 1);
            let last = last + bit;

            if left >= first && left <= last {
                l = Some(left);
            }
            if right >= first && right <= last {
                r = Some(right);
            }

            if present == 0 {
                eq = None;
                break;
            }
            eq = Some(child);

            if i == lbits {
                break;
            }
            i += sess.word_size;
        }

        if eq.is_some() && i <= lbits {
            match self.cmp_leaf_prefix(&key[i >> 3..], &sess) {
                Ordering::Less => r = eq.take(),
                Ordering::Greater => l = eq.take(),
                Ordering::Equal => {}
            }
        }

        (
            l.map(|id| self.rightmost_leaf(id)),
            eq,
            r.map(|id| self.leftmost_leaf(id)),
        )
    }

    /// Sorted position of `key`, or `None` when no match is found.
    pub fn index_of(&self, key: &[u8]) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let lbits = key.len() * 8;
        let mut i = 0usize;
        let mut cur = WalkCursor::root();
        let mut sess = QuerySession::default();

        loop {
            self.decode_node(cur.id, &mut sess);
            if !sess.is_inner {
                break;
            }

            if sess.has_prefix_content {
                if prefix_compare(&key[i >> 3..], sess.prefix) != Ordering::Equal {
                    return None;
                }
                i = (i & !7) + sess.prefix_len;
            } else {
                i += sess.prefix_len;
            }
            if i > lbits {
                return None;
            }

            let (left, present) = self.left_child(&sess, key, i);
            if present == 0 {
                return None;
            }
            cur.next_level(sess.ith_inner, &self.levels, left + 1);

            if i == lbits {
                break;
            }
            i += sess.word_size;
        }

        if i <= lbits && self.cmp_leaf_prefix(&key[i >> 3..], &sess) != Ordering::Equal {
            return None;
        }
        Some(self.cursor_leaf_index(&mut cur))
    }

    /// Sorted positions `(l, r)` with `keys[l] <= key <= keys[r]`: equal on
    /// a match, adjacent otherwise, `None` past either end.
    pub fn index_pair(&self, key: &[u8]) -> (Option<usize>, Option<usize>) {
        if self.is_empty() {
            return (None, None);
        }
        let lbits = key.len() * 8;
        let mut i = 0usize;
        let mut left_cur: Option<WalkCursor> = None;
        let mut eq_cur = WalkCursor::root();
        let mut eq_alive = true;
        let mut sess = QuerySession::default();

        loop {
            self.decode_node(eq_cur.id, &mut sess);
            if !sess.is_inner {
                break;
            }

            if sess.has_prefix_content {
                match prefix_compare(&key[i >> 3..], sess.prefix) {
                    Ordering::Equal => i = (i & !7) + sess.prefix_len,
                    Ordering::Less => {
                        eq_alive = false;
                        break;
                    }
                    Ordering::Greater => {
                        left_cur = Some(eq_cur);
                        eq_alive = false;
                        break;
                    }
                }
            } else {
                i += sess.prefix_len;
                if i > lbits {
                    // Key ran out inside the skipped span: same as smaller
                    // than the prefix.
                    eq_alive = false;
                    break;
                }
            }

            let (left, present) = self.left_child(&sess, key, i);
            let (first, _) = self.inners.rank1(sess.from);
            if left >= first + 1 {
                let mut lc = eq_cur;
                lc.next_level(sess.ith_inner, &self.levels, left);
                left_cur = Some(lc);
            }

            if present == 0 {
                eq_alive = false;
                break;
            }
            eq_cur.next_level(sess.ith_inner, &self.levels, left + 1);

            if i == lbits {
                break;
            }
            i += sess.word_size;
        }

        if eq_alive && i <= lbits {
            match self.cmp_leaf_prefix(&key[i >> 3..], &sess) {
                Ordering::Less => eq_alive = false,
                Ordering::Greater => {
                    left_cur = Some(eq_cur);
                    eq_alive = false;
                }
                Ordering::Equal => {}
            }
        }

        if eq_alive {
            let pos = self.cursor_leaf_index(&mut eq_cur);
            return (Some(pos), Some(pos));
        }
        if let Some(mut lc) = left_cur {
            self.rightmost_cursor(&mut lc);
            let pos = self.cursor_leaf_index(&mut lc);
            let right = pos + 1;
            let r = if right < self.key_count() {
                Some(right)
            } else {
                None
            };
            return (Some(pos), r);
        }
        // Smaller than every key.
        (None, Some(0))
    }

    /// Tail-vs-leaf-prefix comparison. Without a leaf prefix store nothing
    /// was retained, so everything compares equal.
    fn cmp_leaf_prefix(&self, tail: &[u8], sess: &QuerySession<'_>) -> Ordering {
        if self.leaf_prefixes.is_none() {
            return Ordering::Equal;
        }
        let stored: &[u8] = if sess.has_leaf_prefix {
            sess.leaf_prefix
        } else {
            &[]
        };
        tail.cmp(stored)
    }

    /// Sorted index of the leaf a cursor rests on.
    ///
    /// Repeatedly enters the leftmost child of the first inner at or after
    /// the cursor, counting left leaves per level; once no inner remains at
    /// or after it, every deeper leaf hangs off the left and is added
    /// wholesale.
    fn cursor_leaf_index(&self, cur: &mut WalkCursor) -> usize {
        let bottom = self.levels.len() - 1;
        loop {
            let (next_inner, _) = self.node_types.rank1(cur.id);
            if next_inner == self.levels[cur.lvl].inner {
                cur.smaller += cur.id - next_inner - self.levels[cur.lvl - 1].leaf;
                cur.smaller += self.levels[bottom].leaf - self.levels[cur.lvl].leaf;
                return cur.smaller;
            }
            let from = self.ith_inner_from(next_inner);
            let (leftmost, _) = self.inners.rank1(from);
            cur.next_level(next_inner, &self.levels, leftmost + 1);
        }
    }

    /// Descend a cursor to the rightmost leaf beneath it.
    fn rightmost_cursor(&self, cur: &mut WalkCursor) {
        let mut sess = QuerySession::default();
        loop {
            self.decode_node(cur.id, &mut sess);
            if !sess.is_inner {
                return;
            }
            let (rank, bit) = self.inners.rank1(sess.to - 1);
            cur.next_level(sess.ith_inner, &self.levels, rank + bit);
        }
    }

    /// Rightmost leaf in the subtree of `id`.
    fn rightmost_leaf(&self, mut id: usize) -> usize {
        let mut sess = QuerySession::default();
        loop {
            self.decode_node(id, &mut sess);
            if !sess.is_inner {
                return id;
            }
            let (rank, bit) = self.inners.rank1(sess.to - 1);
            id = rank + bit;
        }
    }

    /// Leftmost leaf in the subtree of `id`.
    fn leftmost_leaf(&self, mut id: usize) -> usize {
        let mut sess = QuerySession::default();
        loop {
            self.decode_node(id, &mut sess);
            if !sess.is_inner {
                return id;
            }
            let (rank, _) = self.inners.rank1(sess.from);
            id = rank + 1;
        }
    }
}
