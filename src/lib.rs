//! # Succinct Static Trie Index
//!
//! *An ordered-key index that answers where a key would be, in a fraction
//! of the keys' size.*
//!
//! ## Intuition First
//!
//! Picture a phone book with every name torn out, keeping only the tab
//! positions where names diverge. You can no longer read any name, but
//! given a query you can still follow the tabs and land exactly where the
//! name would have been. For every name that was in the book when the tabs
//! were cut, the landing spot is correct.
//!
//! That is the trade this crate makes: the trie of a sorted key list is
//! flattened into a few rank-indexed bitmaps, the keys themselves are
//! discarded (or kept only as prefix lengths), and four queries survive:
//!
//! - [`Strie::get`]: exact lookup, possibly false-positive.
//! - [`Strie::range_get`]: the value of the range containing a key.
//! - [`Strie::neighbors`]: values left of, at, and right of a key.
//! - [`Strie::position`] / [`Strie::position_pair`]: sorted positions.
//!
//! ## The Representation
//!
//! Nodes are numbered in level order; node 0 is the root. A bitmap marks
//! which ids are inner nodes. Each inner node contributes a child-presence
//! bitmap (257 bits when branching on whole bytes, 17 bits when branching
//! on nibbles, or a 7-bit compressed form for the commonest shapes) to one
//! concatenated stream. Because every non-root node is pointed to by
//! exactly one set bit, `rank1` over that stream *is* child lookup, and no
//! pointers exist anywhere. Path-compressed spans store either their
//! content or just their bit length; the latter keeps the index small and
//! is why a lookup may claim a key it never saw.
//!
//! ## Historical Context
//!
//! ```text
//! 1968  Morrison    PATRICIA: path-compressed binary tries
//! 1989  Jacobson    rank/select; LOUDS level-order tree encoding
//! 2018  Zhang+      SuRF: succinct range filter over a byte trie
//! ```
//!
//! The level-order numbering plus rank-as-child-pointer is LOUDS applied
//! to a path-compressed nibble/byte trie, with a positional twist: leaves
//! appear in level order, not key order, so sorted positions are recovered
//! by per-level accounting during the descent.
//!
//! ## Guarantees
//!
//! Queries are pure, bounded by key length, and touch no shared mutable
//! state, so a single instance may be read from any number of threads. For
//! keys present at build time every answer is exact; for other queries the
//! default build returns a plausible neighbor (verify against an
//! authoritative store if exactness matters), while [`Opt`] can retain
//! full prefixes and make the index exact at a space cost.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitmap;
pub mod codec;
pub mod error;
pub mod trie;

mod build;
mod cursor;
mod node;
mod prefix;
mod query;

pub use codec::{Codec, U16, U64};
pub use error::{Error, Result};
pub use trie::{Opt, Stats, Strie};
