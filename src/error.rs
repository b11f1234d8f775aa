// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Error types for the crate

#![deny(missing_docs)]

use std::io;
use std::sync::Arc;

use hickory_proto::error::ProtoError;
use hickory_proto::op::ResponseCode;
use thiserror::Error;

/// The error type for resolution failures.
///
/// `NXDomain` and the cancellation kinds (`Timeout`, `DeadlineExceeded`,
/// `Canceled`) propagate out of a resolution unconditionally. Everything else
/// is per-attempt: it ends the current exchange and lets the parent walk try
/// the next address, nameserver, or ancestor zone.
#[non_exhaustive]
#[derive(Error, Clone, Debug)]
pub enum Error {
    /// The authority declared that the queried name does not exist.
    #[error("NXDOMAIN")]
    NXDomain,

    /// The recursion depth cap was hit, indicating pathological input or a
    /// delegation loop.
    #[error("max recursion depth reached")]
    MaxRecursion,

    /// More addresses were listed for a nameserver than the per-host fan-out
    /// cap allows.
    #[error("max IPs per nameserver reached")]
    MaxIps,

    /// No usable A record could be found for a nameserver hostname.
    #[error("no A records found for nameserver")]
    NoARecords,

    /// The parent walk exhausted the ancestor chain without any answer.
    #[error("no response from any nameserver")]
    NoResponse,

    /// The remaining time budget could not fit another exchange.
    #[error("request timed out")]
    Timeout,

    /// The per-resolve deadline passed before the operation completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The caller's cancellation token fired.
    #[error("operation canceled")]
    Canceled,

    /// A nameserver answered with a failure RCODE other than NXDOMAIN.
    #[error("server responded with {0}")]
    Rcode(ResponseCode),

    /// An error got returned by the hickory-proto crate.
    #[error("proto error: {0}")]
    Proto(#[from] ProtoError),

    /// An error got returned from IO.
    #[error("io error: {0}")]
    Io(Arc<io::Error>),
}

impl Error {
    /// Returns true if the domain does not exist.
    pub fn is_nx_domain(&self) -> bool {
        matches!(self, Self::NXDomain)
    }

    /// Returns true for the kinds that abort a whole resolution rather than
    /// a single attempt.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NXDomain | Self::Timeout | Self::DeadlineExceeded | Self::Canceled
        )
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}
