#![doc = "UDP monitors for N1MM+ and WSJT-X: bind a socket per source and turn datagrams into monitor messages."]
//
//! # Sources
//!
//! - N1MM+ broadcasts each contact as a record-shaped datagram. The payload
//!   is handed on as text.
//! - WSJT-X sends framed binary messages. Only the frame envelope is read
//!   here (magic, schema, message type, client id) plus the ADIF string of a
//!   `LoggedADIF` message; the record text itself is never parsed.
//!
//! A receive that outlasts the endpoint timeout yields
//! [`MonitorMessage::NoEvent`] so listeners can re-check their stop flags.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Buf;
use qrz_rtlog_core::config::EndpointConfig;
use qrz_rtlog_core::contract::{
    Monitor, MonitorMessage, SourceKind, WsjtxEvent, WsjtxEventKind,
};
use qrz_rtlog_core::error::MonitorError;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// First four bytes of every WSJT-X datagram.
pub const WSJTX_MAGIC: u32 = 0xADBC_CBDA;

const NULL_STRING: u32 = 0xFFFF_FFFF;
const MAX_DATAGRAM: usize = 64 * 1024;

pub struct UdpMonitor {
    source: SourceKind,
    socket: UdpSocket,
    receive_timeout: Duration,
    buf: Vec<u8>,
    last: Option<MonitorMessage>,
}

impl UdpMonitor {
    /// Bind the endpoint for `source`. An invalid endpoint fails with
    /// `Endpoint` before any socket is opened; a taken port fails with `Bind`.
    pub async fn bind(source: SourceKind, endpoint: &EndpointConfig) -> Result<Self, MonitorError> {
        let address = endpoint.address();
        endpoint.validate().map_err(|e| MonitorError::Endpoint {
            endpoint: address.clone(),
            reason: e.to_string(),
        })?;
        let addr: SocketAddr = address.parse().map_err(|e| MonitorError::Endpoint {
            endpoint: address.clone(),
            reason: format!("{e}"),
        })?;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| MonitorError::Bind {
                endpoint: address.clone(),
                source,
            })?;
        debug!(%source, %address, "Bound UDP monitor");
        Ok(Self {
            source,
            socket,
            receive_timeout: endpoint.receive_timeout(),
            buf: vec![0; MAX_DATAGRAM],
            last: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, MonitorError> {
        Ok(self.socket.local_addr()?)
    }

    fn decode(&self, datagram: &[u8]) -> MonitorMessage {
        match self.source {
            SourceKind::N1mm => {
                let text = String::from_utf8_lossy(datagram).trim().to_string();
                if text.is_empty() {
                    MonitorMessage::NoEvent
                } else {
                    MonitorMessage::Text(text)
                }
            }
            SourceKind::Wsjtx => match decode_wsjtx(datagram) {
                Ok(event) => MonitorMessage::Wsjtx(event),
                Err(reason) => {
                    warn!(len = datagram.len(), reason, "Discarding malformed WSJT-X datagram");
                    MonitorMessage::NoEvent
                }
            },
        }
    }
}

#[async_trait]
impl Monitor for UdpMonitor {
    async fn get_message(&mut self) -> Result<MonitorMessage, MonitorError> {
        let received =
            tokio::time::timeout(self.receive_timeout, self.socket.recv_from(&mut self.buf)).await;
        let message = match received {
            Err(_elapsed) => MonitorMessage::NoEvent,
            Ok(Ok((len, peer))) => {
                debug!(source = %self.source, %peer, len, "Datagram received");
                self.decode(&self.buf[..len])
            }
            Ok(Err(e)) => return Err(MonitorError::Receive(e)),
        };
        self.last = Some(message.clone());
        Ok(message)
    }

    fn last_message(&self) -> Option<MonitorMessage> {
        self.last.clone()
    }
}

/// Read the WSJT-X frame envelope and, for `LoggedADIF`, its ADIF string.
/// Other message types come back with empty content.
pub fn decode_wsjtx(mut datagram: &[u8]) -> Result<WsjtxEvent, &'static str> {
    if datagram.remaining() < 12 {
        return Err("datagram shorter than the frame header");
    }
    if datagram.get_u32() != WSJTX_MAGIC {
        return Err("bad magic number");
    }
    let _schema = datagram.get_u32();
    let kind = WsjtxEventKind::from(datagram.get_u32());
    let id = read_utf8(&mut datagram)?.unwrap_or_default();
    let id = String::from_utf8_lossy(&id).into_owned();

    let content = match kind {
        WsjtxEventKind::LoggedAdif => read_utf8(&mut datagram)?.unwrap_or_default(),
        _ => Vec::new(),
    };
    Ok(WsjtxEvent { kind, id, content })
}

/// A length-prefixed byte string; a length of `0xFFFFFFFF` is a null string.
fn read_utf8(buf: &mut &[u8]) -> Result<Option<Vec<u8>>, &'static str> {
    if buf.remaining() < 4 {
        return Err("truncated string length");
    }
    let len = buf.get_u32();
    if len == NULL_STRING {
        return Ok(None);
    }
    let len = len as usize;
    if buf.remaining() < len {
        return Err("truncated string body");
    }
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    Ok(Some(bytes))
}
