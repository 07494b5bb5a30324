//! Property tests against a sorted-vector reference model.
//!
//! The exact build (full prefix content) must agree with the reference on
//! every query; the lossy default must agree on built keys and always keep
//! its bracketing invariant.

use proptest::prelude::*;
use strie::{Opt, Strie, U64};

fn key_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    // A tiny alphabet with short keys forces shared prefixes, terminator
    // chains and prefix-of-another-key cases.
    prop::collection::vec(prop::collection::vec(0u8..4, 0..6), 1..40).prop_map(|mut keys| {
        keys.sort();
        keys.dedup();
        keys
    })
}

/// Reference answers from the sorted key list itself.
fn ref_neighbors(keys: &[Vec<u8>], q: &[u8]) -> (Option<usize>, Option<usize>, Option<usize>) {
    let eq = keys.iter().position(|k| k.as_slice() == q);
    let smaller = keys.iter().take_while(|k| k.as_slice() < q).count();
    let l = smaller.checked_sub(1);
    let first_greater = smaller + eq.is_some() as usize;
    let r = (first_greater < keys.len()).then_some(first_greater);
    (l, eq, r)
}

proptest! {
    #[test]
    fn test_exact_build_matches_reference(
        keys in key_strategy(),
        queries in prop::collection::vec(prop::collection::vec(0u8..4, 0..6), 0..30),
    ) {
        let values: Vec<u64> = (0..keys.len() as u64).collect();
        let st = Strie::with_options(
            U64,
            &keys,
            &values,
            Opt { inner_prefix: true, leaf_prefix: true },
        )
        .unwrap();

        for (i, key) in keys.iter().enumerate() {
            prop_assert_eq!(st.get(key), Some(i as u64));
            prop_assert_eq!(st.position(key), Some(i));
        }

        for q in queries.iter().map(Vec::as_slice).chain(keys.iter().map(Vec::as_slice)) {
            let (l, eq, r) = ref_neighbors(&keys, q);
            let as_val = |i: Option<usize>| i.map(|i| i as u64);
            prop_assert_eq!(
                st.neighbors(q),
                (as_val(l), as_val(eq), as_val(r)),
                "neighbors({:?})", q
            );
            prop_assert_eq!(st.get(q), as_val(eq), "get({:?})", q);
            let want_pair = match (eq, l) {
                (Some(i), _) => (Some(i), Some(i)),
                (None, Some(l)) => (Some(l), r),
                (None, None) => (None, Some(0)),
            };
            prop_assert_eq!(st.position_pair(q), want_pair, "position_pair({:?})", q);
            prop_assert_eq!(st.range_get(q), as_val(eq.or(l)), "range_get({:?})", q);
        }
    }

    #[test]
    fn test_lossy_build_present_keys_and_bracket_form(
        keys in key_strategy(),
        queries in prop::collection::vec(prop::collection::vec(0u8..4, 0..6), 0..30),
    ) {
        let values: Vec<u64> = (0..keys.len() as u64).collect();
        let st = Strie::new(U64, &keys, &values).unwrap();

        for (i, key) in keys.iter().enumerate() {
            prop_assert_eq!(st.get(key), Some(i as u64));
            prop_assert_eq!(st.position(key), Some(i));
            prop_assert_eq!(st.position_pair(key), (Some(i), Some(i)));
        }

        // Answers for absent queries may be wrong but never malformed.
        let n = keys.len();
        for q in &queries {
            match st.position_pair(q) {
                (Some(l), Some(r)) => prop_assert!((r == l || r == l + 1) && r < n),
                (Some(l), None) => prop_assert_eq!(l, n - 1),
                (None, Some(r)) => prop_assert_eq!(r, 0),
                (None, None) => prop_assert!(false, "both ends absent on non-empty index"),
            }
        }
    }
}
