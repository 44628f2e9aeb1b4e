use slotmap::{Key, KeyData, new_key_type};
use std::sync::atomic::{AtomicU64, Ordering};

new_key_type! {
    /// Identifies an entity node. Keys are minted process-wide, so a key
    /// never resolves in any collection other than the one that minted it,
    /// and a key whose node was removed never resolves again.
    pub struct EntityKey;

    /// Identifies a tile within its owning tile collection.
    pub struct TileKey;
}

static NEXT_KEY: AtomicU64 = AtomicU64::new(0);

/// A fresh key, distinct from every key minted before in this process.
///
/// The counter is spread over the key's index and version; the version is
/// always odd, which slotmap reserves for live keys.
pub fn mint<K: Key>() -> K {
    loop {
        let n = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        let idx = n & 0xffff_ffff;
        if idx == u64::from(u32::MAX) {
            continue;
        }
        let version = ((n >> 32) << 1) | 1;
        return K::from(KeyData::from_ffi(idx | (version << 32)));
    }
}
