#![no_main]

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use vertexdb::config::TreeConfig;
use vertexdb::store::MemoryRecordStore;
use vertexdb::tree::Tree;

/// Every four input bytes decode to one operation: a tag byte picking
/// put/remove/flush/reopen, and a key. Exercises the lazy page cache and
/// the commit buffer against a fresh reload from the same `RecordStore`,
/// the path a crash-recovered tree actually takes.
fuzz_target!(|data: &[u8]| {
    let store: Arc<dyn vertexdb::store::RecordStore> = Arc::new(MemoryRecordStore::new());
    let config = TreeConfig { max_updates_before_save: 4, ..TreeConfig::default() };

    let mut tree = match Tree::<i64, i64>::create(store.clone(), 1, config.clone()) {
        Ok(tree) => tree,
        Err(_) => return,
    };

    for chunk in data.chunks_exact(4) {
        let tag = chunk[0];
        let key = i64::from(chunk[1]) | (i64::from(chunk[2]) << 8) | (i64::from(chunk[3]) << 16);

        match tag % 4 {
            0 => {
                let _ = tree.put(key, key.wrapping_mul(7));
            }
            1 => {
                let _ = tree.remove(&key);
            }
            2 => {
                let _ = tree.flush();
            }
            _ => {
                if tree.flush().is_err() {
                    continue;
                }
                let descriptor_rid = tree.descriptor_rid();
                tree = match Tree::<i64, i64>::open(store.clone(), 1, config.clone(), descriptor_rid) {
                    Ok(reopened) => reopened,
                    Err(_) => return,
                };
            }
        }
    }

    if tree.flush().is_err() {
        return;
    }
    let descriptor_rid = tree.descriptor_rid();
    let before = match tree.iter_all() {
        Ok(entries) => entries,
        Err(_) => return,
    };
    let reopened = match Tree::<i64, i64>::open(store, 1, config, descriptor_rid) {
        Ok(reopened) => reopened,
        Err(_) => return,
    };
    let after = reopened.iter_all().expect("a freshly flushed tree must reload intact");
    assert_eq!(before, after, "reload diverged from the in-memory tree it was flushed from");
});
