// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The root hints bootstrap.
//!
//! A copy of the InterNIC root hints zone is embedded at build time and
//! parsed once into a process-wide cache holding the `.` NS delegation and
//! the letter servers' glue addresses. Resolver caches fall through to this
//! cache on read misses; it is never written after initialization.

use hickory_proto::rr::Name;
use hickory_proto::serialize::txt::Parser;
use once_cell::sync::Lazy;

use crate::cache::RecordCache;
use crate::rr::Rr;

// Refresh with: curl -O https://www.internic.net/domain/named.root
const ROOT_HINTS: &str = include_str!("named.root");

static ROOT_CACHE: Lazy<RecordCache> = Lazy::new(|| {
    let cache = RecordCache::new(ROOT_HINTS.lines().count(), false);
    let parser = Parser::new(ROOT_HINTS, None, Some(Name::root()));
    let (_, records) = parser.parse().expect("malformed embedded root hints");
    for record_set in records.values() {
        for record in record_set.records_without_rrsigs() {
            // NS plus A/AAAA glue; anything else in the file is skipped
            if let Some(rr) = Rr::from_record(record, false) {
                let name = rr.name.clone();
                cache.add(&name, rr);
            }
        }
    }
    cache
});

/// The shared, immortal cache primed from the embedded root hints.
pub(crate) fn root_cache() -> &'static RecordCache {
    &ROOT_CACHE
}

#[cfg(test)]
mod tests {
    use crate::cache::CacheAnswer;

    use super::*;

    #[test]
    fn test_root_delegation_is_primed() {
        let answer = root_cache().get(".").expect("root entry missing");
        let CacheAnswer::Records(rrs) = answer else {
            panic!("root entry is negative");
        };
        let ns = rrs.iter().filter(|rr| rr.rr_type == "NS").count();
        assert_eq!(ns, 13);
        assert!(rrs
            .iter()
            .all(|rr| rr.name == "." && rr.value.ends_with(".root-servers.net.")));
    }

    #[test]
    fn test_letter_servers_have_glue() {
        for letter in 'a'..='m' {
            let name = format!("{letter}.root-servers.net.");
            let answer = root_cache().get(&name).expect("glue entry missing");
            let CacheAnswer::Records(rrs) = answer else {
                panic!("glue entry for {name} is negative");
            };
            assert!(rrs.iter().any(|rr| rr.rr_type == "A"), "no A glue for {name}");
            assert!(
                rrs.iter().any(|rr| rr.rr_type == "AAAA"),
                "no AAAA glue for {name}"
            );
        }
    }
}
