// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The network exchange primitive: one question out, one parsed response in.
//!
//! Queries go out over UDP first; a truncated response is retried over TCP
//! with the standard two-byte length framing when the resolver enables it.
//! Socket construction is abstracted behind [`Dialer`] so callers can route
//! traffic through their own network stack.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use futures_util::future::BoxFuture;
use hickory_proto::op::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::resolver::TYPICAL_RESPONSE_TIME;

const MAX_RESPONSE_SIZE: usize = 4096;

/// Network-dialer capability consumed by the resolver.
///
/// The default implementation, [`TokioDialer`], binds ordinary tokio
/// sockets. Supplying a custom dialer lets tests and embedders intercept the
/// resolver's traffic without touching the exchange logic.
pub trait Dialer: Send + Sync + fmt::Debug {
    /// Binds a UDP socket on the given local address.
    fn bind_udp(&self, local: SocketAddr) -> BoxFuture<'static, io::Result<UdpSocket>>;

    /// Opens a TCP connection to the given server address.
    fn connect_tcp(&self, server: SocketAddr) -> BoxFuture<'static, io::Result<TcpStream>>;
}

/// The standard tokio-backed [`Dialer`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioDialer;

impl Dialer for TokioDialer {
    fn bind_udp(&self, local: SocketAddr) -> BoxFuture<'static, io::Result<UdpSocket>> {
        Box::pin(async move { UdpSocket::bind(local).await })
    }

    fn connect_tcp(&self, server: SocketAddr) -> BoxFuture<'static, io::Result<TcpStream>> {
        Box::pin(async move { TcpStream::connect(server).await })
    }
}

/// Sends `qmsg` to `server` and returns the parsed response, honoring the
/// deadline and the cancellation token. With `tcp_retry`, a truncated UDP
/// response is replaced by a TCP retry when the remaining budget allows; a
/// failed retry falls back to the truncated response rather than discarding
/// what was received.
pub(crate) async fn exchange(
    dialer: &dyn Dialer,
    cancel: &CancellationToken,
    qmsg: &Message,
    server: SocketAddr,
    deadline: Instant,
    tcp_retry: bool,
) -> Result<Message, Error> {
    let roundtrip = async {
        let rmsg = udp_exchange(dialer, qmsg, server, deadline).await?;
        if !rmsg.truncated() || !tcp_retry {
            return Ok(rmsg);
        }
        if Instant::now() + TYPICAL_RESPONSE_TIME >= deadline {
            return Ok(rmsg);
        }
        match tcp_exchange(dialer, qmsg, server, deadline).await {
            Ok(full) => Ok(full),
            Err(_) => Ok(rmsg),
        }
    };
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Canceled),
        result = roundtrip => result,
    }
}

async fn udp_exchange(
    dialer: &dyn Dialer,
    qmsg: &Message,
    server: SocketAddr,
    deadline: Instant,
) -> Result<Message, Error> {
    let local: SocketAddr = if server.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = dialer.bind_udp(local).await?;
    socket.connect(server).await?;
    socket.send(&qmsg.to_vec()?).await?;

    let mut buf = [0u8; MAX_RESPONSE_SIZE];
    loop {
        let len = timeout_at(deadline, socket.recv(&mut buf))
            .await
            .map_err(|_| Error::Timeout)??;
        let Ok(rmsg) = Message::from_vec(&buf[..len]) else {
            continue;
        };
        // stray datagrams with a foreign transaction id are not ours
        if rmsg.id() != qmsg.id() {
            continue;
        }
        return Ok(rmsg);
    }
}

async fn tcp_exchange(
    dialer: &dyn Dialer,
    qmsg: &Message,
    server: SocketAddr,
    deadline: Instant,
) -> Result<Message, Error> {
    let mut stream = timeout_at(deadline, dialer.connect_tcp(server))
        .await
        .map_err(|_| Error::Timeout)??;

    let bytes = qmsg.to_vec()?;
    let mut framed = Vec::with_capacity(bytes.len() + 2);
    framed.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    framed.extend_from_slice(&bytes);
    timeout_at(deadline, stream.write_all(&framed))
        .await
        .map_err(|_| Error::Timeout)??;

    let mut len_buf = [0u8; 2];
    timeout_at(deadline, stream.read_exact(&mut len_buf))
        .await
        .map_err(|_| Error::Timeout)??;
    let len = usize::from(u16::from_be_bytes(len_buf));
    let mut buf = vec![0u8; len];
    timeout_at(deadline, stream.read_exact(&mut buf))
        .await
        .map_err(|_| Error::Timeout)??;

    let rmsg = Message::from_vec(&buf)?;
    if rmsg.id() != qmsg.id() {
        return Err(Error::Proto(hickory_proto::error::ProtoError::from(
            "response id does not match query",
        )));
    }
    Ok(rmsg)
}
