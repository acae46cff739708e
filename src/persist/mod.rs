//! Flash key/value persistence collaborator.
//!
//! The core only ever calls through the `KvStore` trait: a plain
//! `read`/`write`/`delete`/`wipe`/`gc` contract. The concrete backend is
//! `esp_idf_svc::nvs::EspDefaultNvs`, wrapped into the `(file_id,
//! record_key)` shape the slot/dump address space needs (§3/§6).

pub mod nvs;
pub mod settings;

use crate::error::FlashError;

/// `(file_id, record_key)` addressed KV store
pub trait KvStore {
    /// Reads up to `buf.len()` bytes into `buf`; returns the number of bytes
    /// actually stored, or `None` if no record exists at this address.
    fn read(&mut self, file_id: u16, record_key: u16, buf: &mut [u8]) -> Option<usize>;

    /// Writes `buf` as the full contents of the record, replacing it.
    fn write(&mut self, file_id: u16, record_key: u16, buf: &[u8]) -> bool;

    /// Deletes the record; returns the number of records actually removed
    /// (0 or 1 for a single-keyed store).
    fn delete(&mut self, file_id: u16, record_key: u16) -> usize;

    /// Erases the entire store.
    fn wipe(&mut self) -> bool;

    /// Reclaims space from deleted/stale records.
    fn gc(&mut self);
}

/// Write-with-retry policy: a flash-full condition triggers one automatic
/// GC and retry before reporting failure.
pub fn write_retrying_gc<S: KvStore>(
    store: &mut S,
    file_id: u16,
    record_key: u16,
    buf: &[u8],
) -> Result<(), FlashError> {
    if store.write(file_id, record_key, buf) {
        return Ok(());
    }
    store.gc();
    if store.write(file_id, record_key, buf) {
        Ok(())
    } else {
        Err(FlashError::WriteFail)
    }
}

pub fn read_required<S: KvStore>(
    store: &mut S,
    file_id: u16,
    record_key: u16,
    buf: &mut [u8],
) -> Result<usize, FlashError> {
    store
        .read(file_id, record_key, buf)
        .ok_or(FlashError::ReadFail)
}

/// Lets a boxed trait object stand in anywhere a concrete `S: KvStore` is
/// expected (the `Core` aggregate only ever holds a `Box<dyn KvStore +
/// Send>`, since the concrete backend, NVS or the in-memory test mock,
/// is chosen once at boot).
impl<T: KvStore + ?Sized> KvStore for Box<T> {
    fn read(&mut self, file_id: u16, record_key: u16, buf: &mut [u8]) -> Option<usize> {
        (**self).read(file_id, record_key, buf)
    }
    fn write(&mut self, file_id: u16, record_key: u16, buf: &[u8]) -> bool {
        (**self).write(file_id, record_key, buf)
    }
    fn delete(&mut self, file_id: u16, record_key: u16) -> usize {
        (**self).delete(file_id, record_key)
    }
    fn wipe(&mut self) -> bool {
        (**self).wipe()
    }
    fn gc(&mut self) {
        (**self).gc()
    }
}

/// Record address space.
pub mod ids {
    pub const SLOT_CONFIG_ID: u16 = 0x0001;
    pub const SLOT_CONFIG_KEY: u16 = 0x0001;

    /// `DUMP_ID_BASE + slot`, keyed by sense type (1 = LF, 2 = HF).
    pub const DUMP_ID_BASE: u16 = 0x0100;
    pub const SENSE_KEY_LF: u16 = 1;
    pub const SENSE_KEY_HF: u16 = 2;

    /// `NICK_ID_BASE + slot` is external (nickname UI), reserved here only
    /// so this store never collides addresses with it.
    pub const NICK_ID_BASE: u16 = 0x0200;

    pub const SETTINGS_ID: u16 = 0x0003;
    pub const SETTINGS_KEY: u16 = 0x0001;
}

#[cfg(test)]
pub mod mock {
    use super::KvStore;
    use std::collections::HashMap;

    /// In-memory KV store for unit tests, with a deterministic "fail after
    /// N writes" knob used to exercise the GC-and-retry path.
    #[derive(Default)]
    pub struct MockStore {
        map: HashMap<(u16, u16), Vec<u8>>,
        pub fail_writes_until_gc: usize,
        pub gc_calls: usize,
        successful_writes: usize,
    }

    impl MockStore {
        pub fn write_calls(&self) -> usize {
            self.successful_writes
        }
    }

    impl KvStore for MockStore {
        fn read(&mut self, file_id: u16, record_key: u16, buf: &mut [u8]) -> Option<usize> {
            let v = self.map.get(&(file_id, record_key))?;
            let n = v.len().min(buf.len());
            buf[..n].copy_from_slice(&v[..n]);
            Some(n)
        }

        fn write(&mut self, file_id: u16, record_key: u16, buf: &[u8]) -> bool {
            if self.fail_writes_until_gc > 0 {
                self.fail_writes_until_gc -= 1;
                return false;
            }
            self.map.insert((file_id, record_key), buf.to_vec());
            self.successful_writes += 1;
            true
        }

        fn delete(&mut self, file_id: u16, record_key: u16) -> usize {
            self.map.remove(&(file_id, record_key)).map_or(0, |_| 1)
        }

        fn wipe(&mut self) -> bool {
            self.map.clear();
            true
        }

        fn gc(&mut self) {
            self.gc_calls += 1;
            self.fail_writes_until_gc = 0;
        }
    }

    #[test]
    fn write_retrying_gc_recovers_once() {
        let mut store = MockStore {
            fail_writes_until_gc: 1,
            ..Default::default()
        };
        let res = super::write_retrying_gc(&mut store, 1, 1, &[1, 2, 3]);
        assert!(res.is_ok());
        assert_eq!(store.gc_calls, 1);
    }

    #[test]
    fn write_retrying_gc_still_fails_if_full_after_gc() {
        struct AlwaysFull;
        impl KvStore for AlwaysFull {
            fn read(&mut self, _: u16, _: u16, _: &mut [u8]) -> Option<usize> {
                None
            }
            fn write(&mut self, _: u16, _: u16, _: &[u8]) -> bool {
                false
            }
            fn delete(&mut self, _: u16, _: u16) -> usize {
                0
            }
            fn wipe(&mut self) -> bool {
                true
            }
            fn gc(&mut self) {}
        }
        let mut store = AlwaysFull;
        let res = super::write_retrying_gc(&mut store, 1, 1, &[1]);
        assert!(res.is_err());
    }
}
