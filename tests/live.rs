// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! End-to-end resolution against the live DNS hierarchy.
//!
//! These exercise real network egress and the public internet's data, so
//! they are `#[ignore]`d by default; run them with `cargo test -- --ignored`.
//! `RUST_LOG=dnsiter::trace=debug` renders the recursion tree.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::net::{TcpStream, UdpSocket};

use dnsiter::{CancellationToken, Dialer, Error, Resolver, ResolverOpts, Rr, TokioDialer};

fn subscribe() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn timeout_from_env() -> Duration {
    std::env::var("DNSITER_TIMEOUT")
        .ok()
        .and_then(|value| value.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(dnsiter::DEFAULT_TIMEOUT)
}

fn resolver() -> Resolver {
    Resolver::new(ResolverOpts {
        timeout: timeout_from_env(),
        ..ResolverOpts::default()
    })
}

fn count(rrs: &[Rr], f: impl Fn(&Rr) -> bool) -> usize {
    rrs.iter().filter(|rr| f(rr)).count()
}

/// A [`TokioDialer`] that counts how often the resolver touched the network.
#[derive(Debug, Default)]
struct CountingDialer {
    inner: TokioDialer,
    dials: AtomicUsize,
}

impl CountingDialer {
    fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

impl Dialer for CountingDialer {
    fn bind_udp(&self, local: SocketAddr) -> BoxFuture<'static, io::Result<UdpSocket>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        self.inner.bind_udp(local)
    }

    fn connect_tcp(&self, server: SocketAddr) -> BoxFuture<'static, io::Result<TcpStream>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        self.inner.connect_tcp(server)
    }
}

#[tokio::test]
#[ignore = "requires network egress"]
async fn test_nxdomain_is_answered_from_cache() {
    subscribe();
    let dialer = Arc::new(CountingDialer::default());
    let resolver = Resolver::with_dialer(
        ResolverOpts {
            timeout: timeout_from_env(),
            ..ResolverOpts::default()
        },
        dialer.clone(),
    );

    let result = resolver.resolve_err("1.com", "").await;
    assert!(matches!(result, Err(Error::NXDomain)), "got {result:?}");

    let dials_after_first = dialer.dials();
    assert!(dials_after_first > 0);

    // the negative entry answers the repeat without touching the network
    let result = resolver.resolve_err("1.com", "").await;
    assert!(matches!(result, Err(Error::NXDomain)), "got {result:?}");
    assert_eq!(dialer.dials(), dials_after_first);
}

#[tokio::test]
#[ignore = "requires network egress"]
async fn test_google_a_returns_answer_and_authority() {
    subscribe();
    let rrs = resolver().resolve_err("google.com", "A").await.unwrap();
    assert!(rrs.len() >= 3, "got {rrs:?}");
    assert!(count(&rrs, |rr| rr.rr_type == "NS") >= 2, "got {rrs:?}");
    assert!(count(&rrs, |rr| rr.rr_type == "A") >= 1, "got {rrs:?}");
}

#[tokio::test]
#[ignore = "requires network egress"]
async fn test_google_mx() {
    subscribe();
    let rrs = resolver().resolve_err("google.com", "MX").await.unwrap();
    assert!(count(&rrs, |rr| rr.rr_type == "MX") >= 1, "got {rrs:?}");
}

#[tokio::test]
#[ignore = "requires network egress"]
async fn test_typed_lookup_after_another_type() {
    subscribe();
    let resolver = resolver();
    resolver.resolve_err("google.com", "A").await.unwrap();
    // the A lookup populated the cache, but TXT still has to go out
    let rrs = resolver.resolve_err("google.com", "TXT").await.unwrap();
    assert!(count(&rrs, |rr| rr.rr_type == "TXT") >= 1, "got {rrs:?}");
}

#[tokio::test]
#[ignore = "requires network egress"]
async fn test_github_www_materializes_cname_chain() {
    subscribe();
    let rrs = resolver()
        .resolve_err("www.github.com", "A")
        .await
        .unwrap();
    assert!(count(&rrs, |rr| rr.rr_type == "CNAME") >= 1, "got {rrs:?}");
    assert!(count(&rrs, |rr| rr.rr_type == "A") >= 1, "got {rrs:?}");
    // the terminal addresses are aliased under the queried name too
    let cached = resolver().resolve_err("www.github.com", "A").await.unwrap();
    assert!(count(&cached, |rr| rr.rr_type == "A") >= 1);
}

#[tokio::test]
#[ignore = "requires network egress"]
async fn test_ptr_in_in_addr_arpa() {
    subscribe();
    let rrs = resolver()
        .resolve_err("99.17.217.172.in-addr.arpa", "PTR")
        .await
        .unwrap();
    assert!(count(&rrs, |rr| rr.rr_type == "PTR") >= 1, "got {rrs:?}");
}

#[tokio::test]
#[ignore = "requires network egress"]
async fn test_out_of_bailiwick_nameservers() {
    subscribe();
    // pnnl.gov delegates to nameservers under .net, so the referral arrives
    // without usable glue and the resolver has to chase the addresses itself
    let rrs = resolver().resolve_err("pnnl.gov", "A").await.unwrap();
    assert!(rrs.len() >= 3, "got {rrs:?}");
    assert!(count(&rrs, |rr| rr.rr_type == "NS") >= 2, "got {rrs:?}");
    assert!(count(&rrs, |rr| rr.rr_type == "A") >= 1, "got {rrs:?}");
}

#[tokio::test]
#[ignore = "requires network egress"]
async fn test_tcp_retry_recovers_truncated_txt() {
    subscribe();
    // microsoft.com carries enough TXT data to overflow a 512-byte UDP
    // response
    let udp_only = resolver()
        .resolve_err("microsoft.com", "TXT")
        .await
        .unwrap();
    let with_retry = Resolver::new(ResolverOpts {
        timeout: timeout_from_env(),
        tcp_retry: true,
        ..ResolverOpts::default()
    })
    .resolve_err("microsoft.com", "TXT")
    .await
    .unwrap();
    assert!(
        count(&with_retry, |rr| rr.rr_type == "TXT") > count(&udp_only, |rr| rr.rr_type == "TXT"),
        "udp: {udp_only:?}\ntcp: {with_retry:?}"
    );
}

#[tokio::test]
#[ignore = "requires network egress"]
async fn test_resolve_ctx_cancellation() {
    subscribe();
    let resolver = resolver();
    let cancel = CancellationToken::new();
    let result = resolver.resolve_ctx(&cancel, "1.com", "").await;
    assert!(matches!(result, Err(Error::NXDomain)), "got {result:?}");

    cancel.cancel();
    let result = resolver.resolve_ctx(&cancel, "2.com", "").await;
    assert!(matches!(result, Err(Error::Canceled)), "got {result:?}");
}

#[tokio::test]
#[ignore = "requires network egress"]
async fn test_expiring_resolver_populates_ttl() {
    subscribe();
    let resolver = Resolver::expiring(0);
    let rrs = resolver.resolve_err("google.com", "A").await.unwrap();
    assert!(!rrs.is_empty());
    let rr = &rrs[0];
    assert!(rr.expiry.is_some(), "got {rr:?}");
    assert!(rr.ttl > Duration::ZERO, "got {rr:?}");
}

#[tokio::test]
#[ignore = "requires network egress"]
async fn test_resolve_flattens_failures() {
    subscribe();
    let resolver = resolver();
    // NXDOMAIN flattens to an empty, present answer
    let rrs = resolver.resolve("1.com", "").await;
    assert_eq!(rrs, Some(Vec::new()));

    // a dead deadline flattens to the no-records sentinel
    let resolver = Resolver::new(ResolverOpts {
        timeout: Duration::ZERO,
        ..ResolverOpts::default()
    });
    assert_eq!(resolver.resolve("google.com", "A").await, None);
}
