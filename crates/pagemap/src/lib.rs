//! Page-number → frame-index dictionary used by the buffer pool.
//!
//! Static modular bucketing with chained entries per bucket. Lookups walk
//! one bucket; no resizing, no iteration order guarantees.

use common::PageNum;

/// Default bucket count, sized for pools far larger than typical frame
/// counts.
const NUM_BUCKETS: usize = 256;

/// Maps pages currently resident in the pool to their frame index.
#[derive(Debug)]
pub struct PageMap {
    buckets: Vec<Vec<(PageNum, usize)>>,
}

impl PageMap {
    pub fn new() -> Self {
        Self::with_buckets(NUM_BUCKETS)
    }

    pub fn with_buckets(num_buckets: usize) -> Self {
        assert!(num_buckets > 0, "num_buckets must be > 0");
        Self {
            buckets: vec![Vec::new(); num_buckets],
        }
    }

    fn bucket(&self, key: PageNum) -> usize {
        key.rem_euclid(self.buckets.len() as PageNum) as usize
    }

    /// Frame index for `key`, if the page is resident.
    pub fn get(&self, key: PageNum) -> Option<usize> {
        let bucket = &self.buckets[self.bucket(key)];
        bucket
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, frame)| *frame)
    }

    /// Insert a mapping, overwriting any existing entry for `key`.
    pub fn set(&mut self, key: PageNum, frame: usize) {
        let idx = self.bucket(key);
        let bucket = &mut self.buckets[idx];
        if let Some(entry) = bucket.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = frame;
        } else {
            bucket.push((key, frame));
        }
    }

    /// Remove the mapping for `key`. Returns whether it was present.
    pub fn remove(&mut self, key: PageNum) -> bool {
        let idx = self.bucket(key);
        let bucket = &mut self.buckets[idx];
        if let Some(pos) = bucket.iter().position(|(k, _)| *k == key) {
            bucket.remove(pos);
            true
        } else {
            false
        }
    }
}

impl Default for PageMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_absent_key_returns_none() {
        let map = PageMap::new();
        assert_eq!(map.get(0), None);
        assert_eq!(map.get(123), None);
    }

    #[test]
    fn set_then_get() {
        let mut map = PageMap::new();
        map.set(7, 3);
        map.set(8, 0);
        assert_eq!(map.get(7), Some(3));
        assert_eq!(map.get(8), Some(0));
    }

    #[test]
    fn set_overwrites_existing_entry() {
        let mut map = PageMap::new();
        map.set(7, 3);
        map.set(7, 5);
        assert_eq!(map.get(7), Some(5));
    }

    #[test]
    fn remove_reports_presence() {
        let mut map = PageMap::new();
        map.set(7, 3);
        assert!(map.remove(7));
        assert_eq!(map.get(7), None);
        assert!(!map.remove(7));
    }

    #[test]
    fn colliding_keys_share_a_bucket() {
        // Keys congruent mod 4 land in the same bucket chain.
        let mut map = PageMap::with_buckets(4);
        for i in 0..16 {
            map.set(i * 4 + 1, i as usize);
        }
        for i in 0..16 {
            assert_eq!(map.get(i * 4 + 1), Some(i as usize));
        }
        assert!(map.remove(5 * 4 + 1));
        assert_eq!(map.get(5 * 4 + 1), None);
        // Later entries in the chain survive the shift-down.
        assert_eq!(map.get(6 * 4 + 1), Some(6));
        assert_eq!(map.get(15 * 4 + 1), Some(15));
    }
}
