// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! An iterative, caching DNS resolver.
//!
//! `dnsiter` answers queries by walking the DNS hierarchy itself: it seeds
//! itself from a built-in root hints zone, iteratively queries authoritative
//! nameservers from the root down, and caches every record it sees, positive
//! and negative. All outbound queries are sent with recursion-desired unset;
//! no upstream resolver is ever asked to recurse on our behalf.
//!
//! Results are returned liberally: whatever records could be gathered for the
//! queried name, even if some authoritative branches were slow or broken.
//!
//! ```no_run
//! use dnsiter::{Resolver, ResolverOpts};
//!
//! #[tokio::main]
//! async fn main() {
//!     let resolver = Resolver::new(ResolverOpts::default());
//!     for rr in resolver.resolve_err("example.com", "A").await.unwrap() {
//!         println!("{rr}");
//!     }
//! }
//! ```

#![warn(
    clippy::default_trait_access,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::unimplemented,
    missing_copy_implementations,
    missing_docs,
    non_snake_case,
    non_upper_case_globals,
    rust_2018_idioms,
    unreachable_pub
)]
#![allow(clippy::single_component_path_imports)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod cache;
pub mod error;
mod name;
mod resolver;
mod root;
mod rr;
mod trace;
mod xfer;

pub use error::Error;
pub use resolver::{
    Resolver, ResolverOpts, DEFAULT_TIMEOUT, MAX_IPS, MAX_NAMESERVERS, MAX_RECURSION,
};
pub use rr::{Rr, NAME_COLLISION};
pub use xfer::{Dialer, TokioDialer};

pub use hickory_proto as proto;
pub use tokio_util::sync::CancellationToken;
