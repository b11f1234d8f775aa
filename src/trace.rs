//! Indented recursion tracing.
//!
//! Every `resolve` entry and exit, CNAME follow, and nameserver exchange is
//! emitted as a `tracing` debug event under the `dnsiter::trace` target. The
//! indentation follows the recursion depth, so a subscriber printing the
//! events renders the resolution tree:
//!
//! ```text
//! ╭─── resolve("example.com.", "A", 1)
//! │   ╭─── resolve("com.", "NS", 2)
//! │   │    23ms: dig +norecurse @198.41.0.4 (a.root-servers.net.) com. NS
//! │   ╰─── 23ms: resolve("com.", "NS", 2)
//! ╰─── 51ms: resolve("example.com.", "A", 1)
//! ```
//!
//! Filtering is the subscriber's business; with no subscriber installed the
//! events cost a branch.

use std::net::IpAddr;
use std::time::Duration;

use hickory_proto::op::Message;
use tracing::debug;

use crate::error::Error;

const TARGET: &str = "dnsiter::trace";

fn indent(depth: usize) -> String {
    "│   ".repeat(depth.saturating_sub(1))
}

pub(crate) fn max_recursion(qname: &str, qtype: &str, depth: usize) {
    debug!(
        target: TARGET,
        "{}error: max recursion @ {qname} {qtype} {depth}",
        indent(depth)
    );
}

pub(crate) fn resolve_start(qname: &str, qtype: &str, depth: usize) {
    debug!(
        target: TARGET,
        "{}╭─── resolve({qname:?}, {qtype:?}, {depth})",
        indent(depth)
    );
}

pub(crate) fn resolve_end(
    qname: &str,
    qtype: &str,
    depth: usize,
    elapsed: Duration,
    result: &Result<Vec<crate::Rr>, Error>,
) {
    let ms = elapsed.as_millis();
    match result {
        Ok(rrs) => debug!(
            target: TARGET,
            "{}╰─── {ms}ms: resolve({qname:?}, {qtype:?}, {depth}) # [{}]RR",
            indent(depth),
            rrs.len()
        ),
        Err(err) => debug!(
            target: TARGET,
            "{}╰─── {ms}ms: resolve({qname:?}, {qtype:?}, {depth}) # ERROR: {err}",
            indent(depth)
        ),
    }
}

pub(crate) fn cname(cname: &crate::Rr, depth: usize) {
    debug!(target: TARGET, "{}│    CNAME: {cname}", indent(depth));
}

pub(crate) fn exchange(
    host: &str,
    ip: IpAddr,
    qname: &str,
    qtype: &str,
    depth: usize,
    elapsed: Duration,
    result: &Result<Message, Error>,
) {
    let ms = elapsed.as_millis();
    let qtype = if qtype.is_empty() { "A" } else { qtype };
    match result {
        Ok(rmsg) => debug!(
            target: TARGET,
            "{}│    {ms}ms: dig +norecurse @{ip} ({host}) {qname} {qtype} # {} answer: {} ns: {} extra: {}",
            indent(depth),
            rmsg.response_code(),
            rmsg.answers().len(),
            rmsg.name_servers().len(),
            rmsg.additionals().len()
        ),
        Err(err) => debug!(
            target: TARGET,
            "{}│    {ms}ms: dig +norecurse @{ip} ({host}) {qname} {qtype} # ERROR: {err}",
            indent(depth)
        ),
    }
}
