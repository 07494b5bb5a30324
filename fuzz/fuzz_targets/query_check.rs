#![no_main]
use libfuzzer_sys::fuzz_target;
use strie::{Opt, Strie, U64};

fuzz_target!(|data: (Vec<Vec<u8>>, Vec<u8>)| {
    let (mut keys, probe) = data;
    keys.retain(|k| k.len() <= 64);
    keys.sort();
    keys.dedup();
    if keys.is_empty() {
        return;
    }
    let values: Vec<u64> = (0..keys.len() as u64).collect();

    let exact = Strie::with_options(
        U64,
        &keys,
        &values,
        Opt {
            inner_prefix: true,
            leaf_prefix: true,
        },
    )
    .unwrap();
    let lossy = Strie::new(U64, &keys, &values).unwrap();

    for (i, key) in keys.iter().enumerate() {
        assert_eq!(exact.get(key), Some(i as u64));
        assert_eq!(exact.position(key), Some(i));
        assert_eq!(lossy.get(key), Some(i as u64));
        assert_eq!(lossy.position(key), Some(i));
    }

    // The exact build must agree with the sorted list on any probe.
    let smaller = keys.iter().take_while(|k| k.as_slice() < probe.as_slice()).count();
    let eq = keys.get(smaller).is_some_and(|k| k.as_slice() == probe.as_slice());
    let expected = if eq {
        (Some(smaller), Some(smaller))
    } else if smaller > 0 {
        let r = (smaller < keys.len()).then_some(smaller);
        (Some(smaller - 1), r)
    } else {
        (None, Some(0))
    };
    assert_eq!(exact.position_pair(&probe), expected);

    // The lossy build may be wrong about the probe, never malformed.
    match lossy.position_pair(&probe) {
        (Some(l), Some(r)) => assert!((r == l || r == l + 1) && r < keys.len()),
        (Some(l), None) => assert_eq!(l, keys.len() - 1),
        (None, Some(r)) => assert_eq!(r, 0),
        (None, None) => panic!("both ends absent on a non-empty index"),
    }
});
