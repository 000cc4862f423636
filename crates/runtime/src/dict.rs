//! Insertion-ordered hash mapping
//!
//! The table is split in two: an `entries` array that preserves insertion
//! order, and a bucket array of signed indices into it. Bucket values
//! `EMPTY` and `TOMBSTONE` mark never-used and deleted slots; the bucket
//! integer width (8/16/32/64-bit) is chosen by entry count and widens as
//! the table grows. Deletion leaves a hole in `entries`; when holes make
//! up more than half the array it is compacted in order. The bucket array
//! resizes to the next prime at or above the requested size once load
//! exceeds 0.6, aiming for a load of 0.3 after the resize.
//!
//! Key equality here is pure value equality ([`crate::obj::value_eq`]):
//! no user dispatch runs while the table is borrowed.

use crate::obj::{Obj, value_eq};

/// Bucket value for a never-used slot.
pub const EMPTY: i64 = -1;
/// Bucket value for a slot whose entry was deleted.
pub const TOMBSTONE: i64 = -2;

/// Bucket load factor that triggers a resize.
const MAX_LOAD: f64 = 0.6;
/// Load factor targeted by a resize.
const TARGET_LOAD: f64 = 0.3;

/// Bucket array, specialized by index width.
enum Buckets {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

impl Buckets {
    /// A bucket array of `n` slots wide enough for entry index `max_index`.
    fn with_capacity(n: usize, max_index: usize) -> Buckets {
        if max_index <= i8::MAX as usize {
            Buckets::I8(vec![EMPTY as i8; n])
        } else if max_index <= i16::MAX as usize {
            Buckets::I16(vec![EMPTY as i16; n])
        } else if max_index <= i32::MAX as usize {
            Buckets::I32(vec![EMPTY as i32; n])
        } else {
            Buckets::I64(vec![EMPTY; n])
        }
    }

    fn len(&self) -> usize {
        match self {
            Buckets::I8(v) => v.len(),
            Buckets::I16(v) => v.len(),
            Buckets::I32(v) => v.len(),
            Buckets::I64(v) => v.len(),
        }
    }

    fn get(&self, i: usize) -> i64 {
        match self {
            Buckets::I8(v) => v[i] as i64,
            Buckets::I16(v) => v[i] as i64,
            Buckets::I32(v) => v[i] as i64,
            Buckets::I64(v) => v[i],
        }
    }

    fn set(&mut self, i: usize, val: i64) {
        match self {
            Buckets::I8(v) => v[i] = val as i8,
            Buckets::I16(v) => v[i] = val as i16,
            Buckets::I32(v) => v[i] = val as i32,
            Buckets::I64(v) => v[i] = val,
        }
    }

    /// Whether entry index `idx` is representable at this width.
    fn fits(&self, idx: usize) -> bool {
        match self {
            Buckets::I8(_) => idx <= i8::MAX as usize,
            Buckets::I16(_) => idx <= i16::MAX as usize,
            Buckets::I32(_) => idx <= i32::MAX as usize,
            Buckets::I64(_) => true,
        }
    }
}

/// One key/value entry, with the key's hash memoized.
pub struct Entry {
    pub hash: u64,
    pub key: Obj,
    pub val: Obj,
}

/// The mapping. Also backs `set` (values mirror keys) and every attribute
/// mapping in the runtime.
pub struct DictData {
    entries: Vec<Option<Entry>>,
    buckets: Buckets,
    /// Live entries (non-holes).
    live: usize,
    /// Tombstones in the bucket array.
    tombs: usize,
    /// Bumped on every mutation; lets iterators detect staleness.
    version: u64,
}

impl Default for DictData {
    fn default() -> Self {
        Self::new()
    }
}

impl DictData {
    pub fn new() -> Self {
        DictData {
            entries: Vec::new(),
            buckets: Buckets::I8(Vec::new()),
            live: 0,
            tombs: 0,
            version: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Index of the entry for `key`, if present.
    pub fn get_index(&self, hash: u64, key: &Obj) -> Option<usize> {
        let n = self.buckets.len();
        if n == 0 {
            return None;
        }
        let mut i = (hash % n as u64) as usize;
        loop {
            match self.buckets.get(i) {
                EMPTY => return None,
                TOMBSTONE => {}
                b => {
                    let idx = b as usize;
                    if let Some(e) = &self.entries[idx] {
                        if e.hash == hash && value_eq(&e.key, key) {
                            return Some(idx);
                        }
                    }
                }
            }
            i = (i + 1) % n;
        }
    }

    pub fn get(&self, hash: u64, key: &Obj) -> Option<Obj> {
        self.get_index(hash, key)
            .and_then(|i| self.entries[i].as_ref())
            .map(|e| e.val.clone())
    }

    pub fn contains(&self, hash: u64, key: &Obj) -> bool {
        self.get_index(hash, key).is_some()
    }

    /// Insert or replace. Returns the previous value when replacing.
    pub fn insert(&mut self, hash: u64, key: Obj, val: Obj) -> Option<Obj> {
        self.version = self.version.wrapping_add(1);

        // Grow before probing so slot positions stay valid.
        let n = self.buckets.len();
        if n == 0 || (self.live + self.tombs + 1) as f64 > MAX_LOAD * n as f64 {
            self.rebuild(self.live + 1);
        }
        // Widen before probing if the next entry index would not fit.
        if !self.buckets.fits(self.entries.len()) {
            self.rewidth();
        }

        let n = self.buckets.len();
        let mut i = (hash % n as u64) as usize;
        let mut first_free: Option<usize> = None;
        loop {
            match self.buckets.get(i) {
                EMPTY => break,
                TOMBSTONE => {
                    if first_free.is_none() {
                        first_free = Some(i);
                    }
                }
                b => {
                    let idx = b as usize;
                    let matched = match &self.entries[idx] {
                        Some(e) => e.hash == hash && value_eq(&e.key, &key),
                        None => false,
                    };
                    if matched {
                        let e = self.entries[idx].as_mut().expect("live entry");
                        return Some(std::mem::replace(&mut e.val, val));
                    }
                }
            }
            i = (i + 1) % n;
        }

        let slot = first_free.unwrap_or(i);
        if self.buckets.get(slot) == TOMBSTONE {
            self.tombs -= 1;
        }
        self.entries.push(Some(Entry { hash, key, val }));
        let idx = self.entries.len() - 1;
        self.buckets.set(slot, idx as i64);
        self.live += 1;
        None
    }

    /// Remove `key`, leaving a tombstone; compacts when holes dominate.
    pub fn remove(&mut self, hash: u64, key: &Obj) -> Option<Obj> {
        let n = self.buckets.len();
        if n == 0 {
            return None;
        }
        let mut i = (hash % n as u64) as usize;
        loop {
            match self.buckets.get(i) {
                EMPTY => return None,
                TOMBSTONE => {}
                b => {
                    let idx = b as usize;
                    let matched = match &self.entries[idx] {
                        Some(e) => e.hash == hash && value_eq(&e.key, key),
                        None => false,
                    };
                    if matched {
                        self.version = self.version.wrapping_add(1);
                        let e = self.entries[idx].take().expect("live entry");
                        self.buckets.set(i, TOMBSTONE);
                        self.tombs += 1;
                        self.live -= 1;
                        let holes = self.entries.len() - self.live;
                        if holes * 2 > self.entries.len() {
                            self.rebuild(self.live.max(1));
                        }
                        return Some(e.val);
                    }
                }
            }
            i = (i + 1) % n;
        }
    }

    pub fn clear(&mut self) {
        self.version = self.version.wrapping_add(1);
        self.entries.clear();
        self.buckets = Buckets::I8(Vec::new());
        self.live = 0;
        self.tombs = 0;
    }

    /// First live entry at `idx` or later, as `(next_idx, key, val)`.
    /// Drives insertion-order iteration.
    pub fn next_entry(&self, idx: usize) -> Option<(usize, Obj, Obj)> {
        let mut i = idx;
        while i < self.entries.len() {
            if let Some(e) = &self.entries[i] {
                return Some((i + 1, e.key.clone(), e.val.clone()));
            }
            i += 1;
        }
        None
    }

    /// Iterate live entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Obj, &Obj)> {
        self.entries.iter().flatten().map(|e| (&e.key, &e.val))
    }

    pub fn keys(&self) -> Vec<Obj> {
        self.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Obj> {
        self.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Attribute-mapping helper: look up a string key without allocating.
    pub fn get_str(&self, name: &str) -> Option<Obj> {
        let hash = crate::string::str_hash(name);
        let n = self.buckets.len();
        if n == 0 {
            return None;
        }
        let mut i = (hash % n as u64) as usize;
        loop {
            match self.buckets.get(i) {
                EMPTY => return None,
                TOMBSTONE => {}
                b => {
                    if let Some(e) = &self.entries[b as usize] {
                        if e.hash == hash && e.key.as_str() == Some(name) {
                            return Some(e.val.clone());
                        }
                    }
                }
            }
            i = (i + 1) % n;
        }
    }

    /// Compact entries (dropping holes, preserving order) and rebuild the
    /// bucket array sized for `request` live entries.
    fn rebuild(&mut self, request: usize) {
        let want = ((request as f64 / TARGET_LOAD).ceil() as usize).max(11);
        let n = next_prime_at_least(want);
        let compacted: Vec<Option<Entry>> = self
            .entries
            .drain(..)
            .flatten()
            .map(Some)
            .collect();
        self.entries = compacted;
        self.buckets = Buckets::with_capacity(n, self.entries.len() + 1);
        self.tombs = 0;
        self.reindex();
    }

    /// Rebuild the bucket array at the same size but a wider index type.
    fn rewidth(&mut self) {
        let n = self.buckets.len().max(11);
        self.buckets = Buckets::with_capacity(n, self.entries.len() + 1);
        self.tombs = 0;
        self.reindex();
    }

    fn reindex(&mut self) {
        let n = self.buckets.len();
        for (idx, e) in self.entries.iter().enumerate() {
            if let Some(e) = e {
                let mut i = (e.hash % n as u64) as usize;
                while self.buckets.get(i) != EMPTY {
                    i = (i + 1) % n;
                }
                self.buckets.set(i, idx as i64);
            }
        }
    }
}

/// Smallest prime ≥ `n`.
pub fn next_prime_at_least(n: usize) -> usize {
    let mut c = n.max(2);
    if c > 2 && c % 2 == 0 {
        c += 1;
    }
    loop {
        if is_prime(c) {
            return c;
        }
        c += if c == 2 { 1 } else { 2 };
    }
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3usize;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_prime() {
        assert_eq!(next_prime_at_least(2), 2);
        assert_eq!(next_prime_at_least(11), 11);
        assert_eq!(next_prime_at_least(12), 13);
        assert_eq!(next_prime_at_least(100), 101);
        assert_eq!(next_prime_at_least(200), 211);
    }

    #[test]
    fn test_is_prime() {
        assert!(is_prime(2));
        assert!(is_prime(97));
        assert!(!is_prime(1));
        assert!(!is_prime(91));
    }
}
