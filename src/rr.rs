// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The normalized resource record handed back to callers.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use hickory_proto::rr::{RData, Record, RecordType};

use crate::name::to_lower_fqdn;

/// ICANN specifies that DNS servers should return the special value
/// 127.0.53.53 for A record queries of TLDs that have recently entered the
/// root zone and have a high likelihood of colliding with private DNS names.
/// The record returned is a notice to network administrators to adjust their
/// DNS configuration.
/// <https://www.icann.org/resources/pages/name-collision-2013-12-06-en#127.0.53.53>
pub const NAME_COLLISION: &str = "127.0.53.53";

/// A DNS resource record in normalized textual form.
///
/// `name` is always a lower-case fully qualified domain name ending in `.`,
/// `rr_type` the symbolic upper-case type (`A`, `NS`, `CNAME`, …), and
/// `value` the textual rendering of the record data: a dotted quad for A,
/// colon-hex for AAAA, the FQDN target for NS/CNAME/PTR and the SOA primary,
/// TAB-joined character strings for TXT, and `preference exchange` for MX.
///
/// Identity is structural over `(name, rr_type, value)`; the TTL fields do
/// not participate in equality or hashing.
#[derive(Clone, Debug, Eq)]
pub struct Rr {
    /// Owner name of the record.
    pub name: String,
    /// Symbolic record type.
    pub rr_type: String,
    /// Textual record data.
    pub value: String,
    /// Time to live as received from the wire; zero when the owning resolver
    /// does not track expiry.
    pub ttl: Duration,
    /// Absolute expiry instant; `None` when expiry tracking is off.
    pub expiry: Option<Instant>,
}

impl PartialEq for Rr {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.rr_type == other.rr_type && self.value == other.value
    }
}

impl Hash for Rr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.rr_type.hash(state);
        self.value.hash(state);
    }
}

impl Rr {
    pub(crate) fn new(name: String, rr_type: String, value: String, ttl: u32, expire: bool) -> Self {
        let ttl = Duration::from_secs(u64::from(ttl));
        Self {
            name,
            rr_type,
            value,
            ttl: if expire { ttl } else { Duration::ZERO },
            expiry: expire.then(|| Instant::now() + ttl),
        }
    }

    /// Whether this record is still usable at `now`. Records without expiry
    /// tracking never go stale.
    pub(crate) fn is_live(&self, now: Instant) -> bool {
        self.expiry.map_or(true, |expiry| expiry > now)
    }

    /// Converts a wire-format record. Types without a dedicated mapping are
    /// synthesized from the record's zone-file string form; records that
    /// cannot be represented are dropped.
    pub(crate) fn from_record(record: &Record, expire: bool) -> Option<Self> {
        if record.record_type() == RecordType::OPT {
            // EDNS metadata, not cacheable record data
            return None;
        }
        let name = to_lower_fqdn(&record.name().to_ascii());
        let rr_type = record.record_type().to_string();
        let value = match record.data()? {
            RData::A(a) => a.0.to_string(),
            RData::AAAA(aaaa) => aaaa.0.to_string(),
            RData::NS(ns) => to_lower_fqdn(&ns.0.to_ascii()),
            RData::CNAME(cname) => to_lower_fqdn(&cname.0.to_ascii()),
            RData::PTR(ptr) => to_lower_fqdn(&ptr.0.to_ascii()),
            RData::SOA(soa) => to_lower_fqdn(&soa.mname().to_ascii()),
            RData::TXT(txt) => txt
                .txt_data()
                .iter()
                .map(|chars| String::from_utf8_lossy(chars).into_owned())
                .collect::<Vec<_>>()
                .join("\t"),
            RData::MX(mx) => {
                format!("{} {}", mx.preference(), to_lower_fqdn(&mx.exchange().to_ascii()))
            }
            _ => {
                // `owner TTL CLASS TYPE RDATA…` per the zone-file rendering
                let text = record.to_string();
                let mut fields = text.split_whitespace();
                let owner = fields.next()?;
                let _ttl = fields.next()?;
                let _class = fields.next()?;
                let ty = fields.next()?;
                let rdata = fields.collect::<Vec<_>>().join("\t");
                if rdata.is_empty() {
                    return None;
                }
                return Some(Self::new(
                    to_lower_fqdn(owner),
                    ty.to_owned(),
                    rdata,
                    record.ttl(),
                    expire,
                ));
            }
        };
        Some(Self::new(name, rr_type, value, record.ttl(), expire))
    }
}

impl fmt::Display for Rr {
    /// Renders the record in zone-file form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ttl = if self.ttl == Duration::ZERO {
            3600
        } else {
            self.ttl.as_secs()
        };
        write!(
            f,
            "{}\t{:>10}\tIN\t{}\t{}",
            self.name, ttl, self.rr_type, self.value
        )
    }
}
