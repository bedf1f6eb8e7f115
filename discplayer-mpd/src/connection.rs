// SPDX-License-Identifier: GPL-3.0-only

//! Dialing and one-connection request/response exchange

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UnixStream};
use tracing::{debug, trace};

use crate::error::{MpdError, Result};
use crate::protocol::{self, Command, Frame, Line};

const DIAL_TIMEOUT: Duration = Duration::from_secs(2);

/// One live protocol session
///
/// Implementations must not be used concurrently; the reconnecting client
/// serializes all access.
#[async_trait]
pub trait Session: Send {
    /// Send one command and read its complete response
    async fn request(&mut self, command: &Command) -> Result<Frame>;

    /// Say goodbye and release the transport; never fails
    async fn close(&mut self);

    /// False once an exchange failed or was abandoned before its final line
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Produces fresh sessions
#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self) -> Result<Box<dyn Session>>;

    /// Human-readable target for logs
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    #[default]
    Tcp,
    Unix,
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionKind::Tcp => write!(f, "tcp"),
            ConnectionKind::Unix => write!(f, "unix"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub kind: ConnectionKind,
    /// `host:port` for tcp, socket path for unix
    pub address: String,
    pub password: Option<String>,
}

type Reader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

pub struct MpdConnection {
    reader: Reader,
    writer: Writer,
    version: String,
    /// Set while a request is in flight; still set afterwards if the
    /// response was not read up to its `OK` or `ACK`.
    desynced: bool,
}

impl MpdConnection {
    /// Wrap an established transport and consume the server greeting
    pub async fn handshake<R, W>(reader: R, writer: W) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut reader: Reader = BufReader::new(Box::new(reader));
        let mut greeting = String::new();
        if reader.read_line(&mut greeting).await? == 0 {
            return Err(MpdError::Closed);
        }
        let version = protocol::parse_greeting(&greeting)?;
        debug!("Connected to MPD protocol {}", version);

        Ok(Self {
            reader,
            writer: Box::new(writer),
            version,
            desynced: false,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    async fn read_response(&mut self) -> Result<Frame> {
        let mut frame = Frame::new();
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(MpdError::Closed);
            }
            match protocol::parse_line(&line)? {
                Line::Pair(key, value) => frame.push(key, value),
                Line::Ok => return Ok(frame),
                Line::Ack {
                    code,
                    command,
                    message,
                } => {
                    return Err(MpdError::Ack {
                        code,
                        command,
                        message,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Session for MpdConnection {
    async fn request(&mut self, command: &Command) -> Result<Frame> {
        if self.desynced {
            return Err(MpdError::Closed);
        }
        trace!("-> {}", command);
        self.desynced = true;
        self.writer.write_all(command.to_line().as_bytes()).await?;
        self.writer.flush().await?;
        let response = self.read_response().await;
        if matches!(response, Ok(_) | Err(MpdError::Ack { .. })) {
            self.desynced = false;
        }
        response
    }

    async fn close(&mut self) {
        let _ = self.writer.write_all(b"close\n").await;
        let _ = self.writer.shutdown().await;
    }

    fn is_healthy(&self) -> bool {
        !self.desynced
    }
}

pub struct MpdConnector {
    config: ConnectionConfig,
}

impl MpdConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    async fn open(&self) -> Result<MpdConnection> {
        let address = self.config.address.as_str();
        match self.config.kind {
            ConnectionKind::Tcp => {
                let stream = TcpStream::connect(address).await?;
                stream.set_nodelay(true)?;
                let (reader, writer) = stream.into_split();
                MpdConnection::handshake(reader, writer).await
            }
            ConnectionKind::Unix => {
                let stream = UnixStream::connect(address).await?;
                let (reader, writer) = stream.into_split();
                MpdConnection::handshake(reader, writer).await
            }
        }
    }
}

#[async_trait]
impl Connector for MpdConnector {
    async fn dial(&self) -> Result<Box<dyn Session>> {
        let mut connection = tokio::time::timeout(DIAL_TIMEOUT, self.open())
            .await
            .map_err(|_| {
                MpdError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("dial timed out after {:?}", DIAL_TIMEOUT),
                ))
            })??;

        if let Some(password) = self.config.password.as_deref() {
            connection.request(&Command::new("password").arg(password)).await?;
        }
        Ok(Box::new(connection))
    }

    fn describe(&self) -> String {
        format!("{}://{}", self.config.kind, self.config.address)
    }
}
