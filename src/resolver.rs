// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The iterative resolution engine.
//!
//! [RFC 1034](https://datatracker.ietf.org/doc/html/rfc1034#section-5.3.3),
//! section 5.3.3 describes the shape of the algorithm: look in the cache,
//! find the best servers to ask by walking from the query name toward the
//! root, send them queries until one answers, then analyze the response —
//! caching what came back, restarting at the canonical name for a CNAME, and
//! trying the next server on bizarre contents. The engine here recurses on
//! itself for the NS records of each ancestor zone and again for the A
//! records of each nameserver it wants to contact, with the depth bounded by
//! [`MAX_RECURSION`].

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_recursion::async_recursion;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cache::{CacheAnswer, RecordCache};
use crate::error::Error;
use crate::name::{count_labels, parent, shared_suffix_labels, to_lower_fqdn};
use crate::root::root_cache;
use crate::rr::Rr;
use crate::trace;
use crate::xfer::{self, Dialer, TokioDialer};

/// Per-resolve deadline for the whole operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Maximum depth of nested resolve calls.
pub const MAX_RECURSION: usize = 10;

/// Parallel fan-out to authoritative servers per parent-walk step.
pub const MAX_NAMESERVERS: usize = 2;

/// Maximum A-record addresses tried per nameserver hostname.
pub const MAX_IPS: usize = 2;

/// Safety margin before the deadline under which an exchange is not worth
/// dialing.
pub(crate) const TYPICAL_RESPONSE_TIME: Duration = Duration::from_millis(100);

/// Construction options for a [`Resolver`].
#[derive(Clone, Copy, Debug)]
pub struct ResolverOpts {
    /// Cache capacity in names; zero selects the built-in minimum of 1000.
    pub capacity: usize,
    /// Track per-record TTLs: filter expired records on read and prefer them
    /// for eviction.
    pub expire: bool,
    /// Deadline for a whole `resolve` operation, including every recursive
    /// lookup it spawns.
    pub timeout: Duration,
    /// Retry truncated UDP responses over TCP.
    pub tcp_retry: bool,
}

impl Default for ResolverOpts {
    fn default() -> Self {
        Self {
            capacity: 0,
            expire: false,
            timeout: DEFAULT_TIMEOUT,
            tcp_retry: false,
        }
    }
}

/// An iterative, caching DNS resolver.
///
/// Cloning is cheap and clones share the cache; a resolver is safe for
/// concurrent use by many callers. Each instance owns its cache, while the
/// root hints cache is process-wide and shared by all of them.
#[derive(Clone, Debug)]
pub struct Resolver {
    cache: Arc<RecordCache>,
    dialer: Arc<dyn Dialer>,
    timeout: Duration,
    expire: bool,
    tcp_retry: bool,
}

#[derive(Clone)]
struct Ctx {
    cancel: CancellationToken,
    deadline: Instant,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ResolverOpts::default())
    }
}

impl Resolver {
    /// Constructs a resolver with the standard tokio dialer.
    pub fn new(opts: ResolverOpts) -> Self {
        Self::with_dialer(opts, Arc::new(TokioDialer))
    }

    /// Constructs a resolver that dials through `dialer`.
    pub fn with_dialer(opts: ResolverOpts, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            cache: Arc::new(RecordCache::new(opts.capacity, opts.expire)),
            dialer,
            timeout: opts.timeout,
            expire: opts.expire,
            tcp_retry: opts.tcp_retry,
        }
    }

    /// A resolver with TTL expiry enabled and the given cache capacity.
    pub fn expiring(capacity: usize) -> Self {
        Self::new(ResolverOpts {
            capacity,
            expire: true,
            ..ResolverOpts::default()
        })
    }

    /// A resolver with TTL expiry enabled, the given cache capacity, and a
    /// non-default timeout.
    pub fn expiring_with_timeout(capacity: usize, timeout: Duration) -> Self {
        Self::new(ResolverOpts {
            capacity,
            expire: true,
            timeout,
            ..ResolverOpts::default()
        })
    }

    /// Finds DNS records of type `qtype` for the domain `qname`.
    ///
    /// Returns an empty sequence for a nonexistent domain and `None` for any
    /// other failure. `qtype` is the symbolic type (`"A"`, `"NS"`, `"TXT"`,
    /// …); the empty string matches any supported type.
    pub async fn resolve(&self, qname: &str, qtype: &str) -> Option<Vec<Rr>> {
        match self.resolve_err(qname, qtype).await {
            Ok(rrs) => Some(rrs),
            Err(Error::NXDomain) => Some(Vec::new()),
            Err(_) => None,
        }
    }

    /// As [`Resolver::resolve`], but preserving the error kind.
    pub async fn resolve_err(&self, qname: &str, qtype: &str) -> Result<Vec<Rr>, Error> {
        self.resolve_ctx(&CancellationToken::new(), qname, qtype)
            .await
    }

    /// As [`Resolver::resolve_err`], bound to an externally cancellable
    /// scope. Cancelling the token promptly aborts any in-flight network
    /// exchange; the configured timeout still applies.
    pub async fn resolve_ctx(
        &self,
        cancel: &CancellationToken,
        qname: &str,
        qtype: &str,
    ) -> Result<Vec<Rr>, Error> {
        let ctx = Ctx {
            cancel: cancel.clone(),
            deadline: Instant::now() + self.timeout,
        };
        self.resolve_inner(&ctx, qname, qtype, 0).await
    }

    #[async_recursion]
    async fn resolve_inner(
        &self,
        ctx: &Ctx,
        qname: &str,
        qtype: &str,
        mut depth: usize,
    ) -> Result<Vec<Rr>, Error> {
        depth += 1;
        if depth > MAX_RECURSION {
            trace::max_recursion(qname, qtype, depth);
            return Err(Error::MaxRecursion);
        }
        if ctx.cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        if Instant::now() >= ctx.deadline {
            return Err(Error::DeadlineExceeded);
        }
        let qname = to_lower_fqdn(qname);
        if let Some(answer) = self.cache_get(&qname, qtype) {
            return answer;
        }
        trace::resolve_start(&qname, qtype, depth);
        let start = Instant::now();
        let result = self.iterate_parents(ctx, &qname, qtype, depth).await;
        trace::resolve_end(&qname, qtype, depth, start.elapsed(), &result);
        result
    }

    /// Walks the ancestor chain of `qname`, resolving each zone cut's
    /// nameservers and racing exchanges against them until one answers.
    async fn iterate_parents(
        &self,
        ctx: &Ctx,
        qname: &str,
        qtype: &str,
        depth: usize,
    ) -> Result<Vec<Rr>, Error> {
        let mut last_err = None;
        let mut pname = Some(qname.to_owned());
        while let Some(p) = pname.take() {
            if p == qname && qtype == "NS" {
                // looking for [foo.com, NS] starts at [com, NS]
                pname = parent(&p);
                continue;
            }
            if p == "." && count_labels(qname) > 1 {
                // a non-TLD name is never asked for directly at the root
                return Err(last_err.unwrap_or(Error::NoResponse));
            }

            let nrrs = match self.resolve_inner(ctx, &p, "NS", depth).await {
                Ok(nrrs) => nrrs,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    last_err = Some(e);
                    pname = parent(&p);
                    continue;
                }
            };

            // a sibling recursion may have filled our entry while the NS
            // lookup ran
            if !nrrs.is_empty() && !qtype.is_empty() {
                if let Some(answer) = self.cache_get(qname, qtype) {
                    return answer;
                }
            }

            let child = ctx.cancel.child_token();
            let cctx = Ctx {
                cancel: child.clone(),
                deadline: ctx.deadline,
            };
            let (tx, mut rx) = mpsc::channel(MAX_NAMESERVERS);
            let mut count = 0;
            for nrr in nrrs.iter().filter(|rr| rr.rr_type == "NS") {
                if count == MAX_NAMESERVERS {
                    break;
                }
                count += 1;
                let this = self.clone();
                let cctx = cctx.clone();
                let tx = tx.clone();
                let host = nrr.value.clone();
                let qname = qname.to_owned();
                let qtype = qtype.to_owned();
                tokio::spawn(async move {
                    let result = this.exchange(&cctx, &host, &qname, &qtype, depth).await;
                    let _ = tx.send(result).await;
                });
            }
            drop(tx);

            while let Some(result) = rx.recv().await {
                match result {
                    Ok(mut rrs) => {
                        // first answer wins; stop the siblings
                        child.cancel();
                        // the caller gets the union of what this exchange
                        // returned and what the walk cached for the name
                        // along the way (typically its NS records)
                        if let Some(Ok(cached)) = self.cache_get(qname, "") {
                            for rr in cached {
                                if !rrs.contains(&rr) {
                                    rrs.push(rr);
                                }
                            }
                        }
                        return self.resolve_cnames(ctx, qname, qtype, rrs, depth).await;
                    }
                    Err(e) if e.is_fatal() => {
                        child.cancel();
                        return Err(e);
                    }
                    Err(e) => last_err = Some(e),
                }
            }

            if qtype == "NS" && count > 0 {
                // the recursive NS lookup above already walked toward the
                // root on our behalf
                break;
            }
            pname = parent(&p);
        }
        Err(last_err.unwrap_or(Error::NoResponse))
    }

    /// Queries one nameserver hostname for `(qname, qtype)`, trying up to
    /// [`MAX_IPS`] of its addresses.
    async fn exchange(
        &self,
        ctx: &Ctx,
        host: &str,
        qname: &str,
        qtype: &str,
        depth: usize,
    ) -> Result<Vec<Rr>, Error> {
        let arecords = match self.resolve_inner(ctx, host, "A", depth).await {
            Ok(arecords) => arecords,
            Err(e @ (Error::Timeout | Error::DeadlineExceeded | Error::Canceled)) => return Err(e),
            // an unreachable or nonexistent nameserver is this host's
            // problem, not the query's
            Err(_) => return Err(Error::NoARecords),
        };
        let mut count = 0;
        for arr in arecords.iter().filter(|rr| rr.rr_type == "A") {
            count += 1;
            if count > MAX_IPS {
                return Err(Error::MaxIps);
            }
            let Ok(ip) = arr.value.parse::<IpAddr>() else {
                continue;
            };
            match self.exchange_ip(ctx, host, ip, qname, qtype, depth).await {
                Ok(rrs) => return Ok(rrs),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("exchange with {host} at {ip} failed: {e}");
                    continue;
                }
            }
        }
        Err(Error::NoARecords)
    }

    /// One wire exchange with a single server address, including response
    /// classification, the bailiwick filter, and cache persistence.
    #[async_recursion]
    async fn exchange_ip(
        &self,
        ctx: &Ctx,
        host: &str,
        ip: IpAddr,
        qname: &str,
        qtype: &str,
        depth: usize,
    ) -> Result<Vec<Rr>, Error> {
        if Instant::now() + TYPICAL_RESPONSE_TIME >= ctx.deadline {
            // not enough budget left for a round trip
            return Err(Error::Timeout);
        }

        let dtype = RecordType::from_str(if qtype.is_empty() { "A" } else { qtype })
            .unwrap_or(RecordType::A);
        let mut qmsg = Message::new();
        qmsg.set_id(rand::random())
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(false)
            .add_query(Query::query(Name::from_ascii(qname)?, dtype));

        let start = Instant::now();
        let result = xfer::exchange(
            self.dialer.as_ref(),
            &ctx.cancel,
            &qmsg,
            SocketAddr::new(ip, 53),
            ctx.deadline,
            self.tcp_retry,
        )
        .await;
        trace::exchange(host, ip, qname, qtype, depth, start.elapsed(), &result);
        if ctx.cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        let rmsg = result?;

        match rmsg.response_code() {
            ResponseCode::NoError => {}
            ResponseCode::NXDomain => {
                let soa_delegation = qtype == "NS"
                    && rmsg
                        .name_servers()
                        .iter()
                        .any(|record| record.record_type() == RecordType::SOA);
                if !soa_delegation {
                    self.cache.add_nx(qname);
                    return Err(Error::NXDomain);
                }
                // the name exists but carries no NS records at this cut; a
                // sibling exchange may have recorded a speculative negative
                // entry that this SOA contradicts
                self.cache.delete_nx(qname);
            }
            rcode => return Err(Error::Rcode(rcode)),
        }

        let qlabels = count_labels(qname);
        let mut rrs = Vec::new();
        for record in rmsg
            .answers()
            .iter()
            .chain(rmsg.name_servers())
            .chain(rmsg.additionals())
        {
            let Some(rr) = Rr::from_record(record, self.expire) else {
                continue;
            };
            if count_labels(&rr.name) < qlabels && shared_suffix_labels(&rr.name, qname) < 2 {
                // out of bailiwick: this server has no business telling us
                // about that name
                continue;
            }
            self.cache.add(&rr.name, rr.clone());
            if rr.name == qname {
                rrs.push(rr);
            }
        }

        if qtype == "NS" {
            // a referral may name servers outside the zone without glue;
            // chase their addresses through the same server
            let nameservers: Vec<Rr> = rrs.iter().filter(|rr| rr.rr_type == "NS").cloned().collect();
            for nrr in nameservers {
                if self.cache_get(&nrr.value, "A").is_some() {
                    continue;
                }
                match self.exchange_ip(ctx, host, ip, &nrr.value, "A", depth).await {
                    Ok(glue) => rrs.extend(glue),
                    Err(e) => {
                        warn!("glue lookup for {} via {ip} failed: {e}", nrr.value);
                        break;
                    }
                }
            }
        }

        Ok(rrs)
    }

    /// Follows CNAME records owned by `qname`, caching the resolved targets
    /// under `qname` as well so later queries hit the cache directly.
    async fn resolve_cnames(
        &self,
        ctx: &Ctx,
        qname: &str,
        qtype: &str,
        crrs: Vec<Rr>,
        depth: usize,
    ) -> Result<Vec<Rr>, Error> {
        let mut rrs = Vec::with_capacity(crrs.len());
        for crr in crrs {
            rrs.push(crr.clone());
            if crr.rr_type != "CNAME" || qtype == "CNAME" {
                continue;
            }
            trace::cname(&crr, depth);
            match self.resolve_inner(ctx, &crr.value, qtype, depth).await {
                Ok(chained) => {
                    for rr in chained {
                        self.cache.add(qname, rr.clone());
                        rrs.push(rr);
                    }
                }
                Err(e @ (Error::Timeout | Error::DeadlineExceeded | Error::Canceled)) => {
                    return Err(e)
                }
                // a broken target leaves the chain as liberal as the rest of
                // the answer
                Err(_) => {}
            }
        }
        Ok(rrs)
    }

    /// Reads `(qname, qtype)` from the resolver cache, falling through to the
    /// root hints. `None` is a miss that must go to the network; `Some(Ok)`
    /// and `Some(Err(NXDomain))` are authoritative cache answers.
    fn cache_get(&self, qname: &str, qtype: &str) -> Option<Result<Vec<Rr>, Error>> {
        let answer = match self.cache.get(qname) {
            Some(answer) => answer,
            None => root_cache().get(qname)?,
        };
        match answer {
            CacheAnswer::Negative => Some(Err(Error::NXDomain)),
            CacheAnswer::Records(rrs) => {
                let filtered: Vec<Rr> = rrs
                    .into_iter()
                    .filter(|rr| qtype.is_empty() || rr.rr_type == qtype)
                    .collect();
                if filtered.is_empty() && !qtype.is_empty() && qtype != "NS" {
                    // the entry holds records, just none of this type
                    return None;
                }
                Some(Ok(filtered))
            }
        }
    }
}
