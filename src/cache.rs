// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A capacity-bounded record cache keyed by owner name.
//!
//! Each entry is either a set of records or a negative marker proving
//! NXDOMAIN; a missing key means "unknown". Eviction is deliberately coarse:
//! the negative space is expected to be dominated by transient lookups, so
//! the cache trades strict LRU for a single map under one readers-writer
//! lock.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use parking_lot::RwLock;

use crate::rr::Rr;

/// Capacity used when a resolver is constructed without one.
pub(crate) const MIN_CAPACITY: usize = 1000;

/// The result of a cache read for a name that is present.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum CacheAnswer {
    /// The name is proven not to exist.
    Negative,
    /// The records stored for the name, already filtered for liveness.
    Records(Vec<Rr>),
}

// In the None case the entry is a negative marker: the name exists in the
// map but holds no records.
type Entry = Option<HashSet<Rr>>;

#[derive(Debug)]
pub(crate) struct RecordCache {
    capacity: usize,
    expire: bool,
    entries: RwLock<HashMap<String, Entry>>,
}

impl RecordCache {
    /// A cache holding at most `capacity` names; zero selects
    /// [`MIN_CAPACITY`]. `expire` enables per-record TTL checks on read and
    /// makes eviction prefer stale records.
    pub(crate) fn new(capacity: usize, expire: bool) -> Self {
        Self {
            capacity: if capacity == 0 { MIN_CAPACITY } else { capacity },
            expire,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Stores `rr` under `qname`, upgrading a negative marker in place.
    /// Insertion is idempotent over structural record identity, so the first
    /// writer's TTL wins for an already-present record.
    pub(crate) fn add(&self, qname: &str, rr: Rr) {
        let mut entries = self.entries.write();
        if !entries.contains_key(qname) {
            Self::evict(&mut entries, self.capacity, self.expire);
        }
        match entries.entry(qname.to_owned()).or_insert_with(|| Some(HashSet::new())) {
            Some(set) => {
                set.insert(rr);
            }
            negative @ None => {
                *negative = Some(HashSet::from([rr]));
            }
        }
    }

    /// Records an NXDOMAIN proof for `qname`. Present entries, positive or
    /// negative, are left untouched.
    pub(crate) fn add_nx(&self, qname: &str) {
        let mut entries = self.entries.write();
        if entries.contains_key(qname) {
            return;
        }
        Self::evict(&mut entries, self.capacity, self.expire);
        entries.insert(qname.to_owned(), None);
    }

    /// Removes a negative marker for `qname`, if one exists. Used to undo a
    /// speculative NXDOMAIN once a better-placed server contradicts it.
    pub(crate) fn delete_nx(&self, qname: &str) {
        let mut entries = self.entries.write();
        if matches!(entries.get(qname), Some(None)) {
            entries.remove(qname);
        }
    }

    /// Reads the entry for `qname`. `None` means the name is unknown to this
    /// cache, distinct from a present-but-negative entry. In expiry mode,
    /// records whose expiry has passed are filtered out of the answer.
    pub(crate) fn get(&self, qname: &str) -> Option<CacheAnswer> {
        let entries = self.entries.read();
        match entries.get(qname)? {
            None => Some(CacheAnswer::Negative),
            Some(set) => {
                let now = Instant::now();
                let rrs = set
                    .iter()
                    .filter(|rr| !self.expire || rr.is_live(now))
                    .cloned()
                    .collect();
                Some(CacheAnswer::Records(rrs))
            }
        }
    }

    // Assumes the write lock is held. Makes room for one more key: first a
    // sweep of expired records when expiry is on, then arbitrary keys in map
    // iteration order until the bound holds.
    fn evict(entries: &mut HashMap<String, Entry>, capacity: usize, expire: bool) {
        if entries.len() < capacity {
            return;
        }
        if expire {
            let now = Instant::now();
            entries.retain(|_, entry| match entry {
                Some(set) => {
                    set.retain(|rr| rr.is_live(now));
                    !set.is_empty()
                }
                None => true,
            });
        }
        while entries.len() >= capacity {
            let Some(key) = entries.keys().next().cloned() else {
                break;
            };
            entries.remove(&key);
        }
    }
}
