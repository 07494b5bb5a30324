//! Structural stress: dense byte alphabets collapse into byte-branching
//! big nodes, bit-string keys stay in the compressed short form, and every
//! built key resolves to its exact value and position either way.

use strie::{Strie, U16};

#[test]
fn test_dense_byte_keys_use_big_nodes() {
    let mut keys: Vec<[u8; 4]> = Vec::new();
    let mut values: Vec<u16> = Vec::new();
    for i in 0..16u8 {
        for j in 0..16u8 {
            for k in 0..16u8 {
                for l in 0..8u8 {
                    keys.push([i, j, k, l]);
                    values.push(values.len() as u16);
                }
            }
        }
    }
    let st = Strie::new(U16, &keys, &values).unwrap();

    let stats = st.stats();
    assert_eq!(stats.keys, 32768);
    // 1 root + 16 + 256 + 4096 nodes, every one byte-branching.
    assert_eq!(stats.inners, 4369);
    assert_eq!(stats.big_inners, 4369);
    assert_eq!(stats.short_inners, 0);
    assert_eq!(stats.levels, 5);

    for (i, key) in keys.iter().enumerate() {
        assert_eq!(st.get(key), Some(i as u16));
        assert_eq!(st.position(key), Some(i));
    }
    assert_eq!(st.get(&[0, 0, 0, 8]), None);
    assert_eq!(st.get(&[16, 0, 0, 0]), None);
}

#[test]
fn test_bit_string_keys_use_short_nodes() {
    let mut keys: Vec<[u8; 15]> = Vec::new();
    let mut values: Vec<u16> = Vec::new();
    for i in 0..32768u32 {
        let mut key = [0u8; 15];
        for (b, slot) in key.iter_mut().enumerate() {
            *slot = ((i >> (14 - b)) & 1) as u8;
        }
        keys.push(key);
        values.push(i as u16);
    }
    let st = Strie::new(U16, &keys, &values).unwrap();

    let stats = st.stats();
    assert_eq!(stats.keys, 32768);
    // A complete binary trie over 15 bit positions.
    assert_eq!(stats.inners, 32767);
    assert_eq!(stats.big_inners, 0);
    assert_eq!(stats.short_inners, 32767);
    assert_eq!(stats.levels, 16);

    for (i, key) in keys.iter().enumerate() {
        assert_eq!(st.get(key), Some(i as u16));
        assert_eq!(st.position(key), Some(i));
    }
}
