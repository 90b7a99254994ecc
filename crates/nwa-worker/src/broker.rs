//! STOMP broker connection

use std::fmt::{Display, Formatter};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{Frame, StompError};

/// How long to wait for `CONNECTED` and for the `DISCONNECT` receipt
pub const BROKER_TIMEOUT: Duration = Duration::from_secs(10);

const DISCONNECT_RECEIPT: &str = "disconnect";

/// A message delivered to a subscription
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub body: String,
    pub headers: Vec<(String, String)>,
}

/// Queue of received messages, handed out one by one
pub struct Mailbox {
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Wait for the next message
    pub async fn receive(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    fn sender(&self) -> mpsc::UnboundedSender<Message> {
        self.tx.clone()
    }
}

struct Connection {
    writer: OwnedWriteHalf,
    receipts: mpsc::UnboundedReceiver<String>,
    reader: JoinHandle<()>,
}

pub struct Broker {
    host: String,
    port: u16,
    connection: Option<Connection>,
    subscriptions: Vec<String>,
}

impl Broker {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connection: None,
            subscriptions: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Open a session; received messages go to `mailbox`
    pub async fn connect(&mut self, mailbox: &Mailbox) -> Result<(), StompError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let (mut reader, mut writer) = stream.into_split();

        let connect = Frame::new("CONNECT")
            .header("accept-version", "1.2")
            .header("host", self.host.clone())
            .header("heart-beat", "0,0");
        writer.write_all(&connect.to_bytes()).await?;

        let mut buf = BytesMut::with_capacity(4096);
        let connected = tokio::time::timeout(BROKER_TIMEOUT, read_frame(&mut reader, &mut buf))
            .await
            .map_err(|_| StompError::Protocol("no CONNECTED frame from broker".to_string()))??;
        match connected.command.as_str() {
            "CONNECTED" => {
                debug!(
                    version = connected.get_header("version").unwrap_or("1.0"),
                    "STOMP session established"
                );
            }
            "ERROR" => {
                return Err(StompError::Broker(
                    connected
                        .get_header("message")
                        .map(str::to_string)
                        .unwrap_or_else(|| connected.body_str()),
                ));
            }
            other => {
                return Err(StompError::Protocol(format!(
                    "expected CONNECTED, got {}",
                    other
                )));
            }
        }

        let (receipt_tx, receipts) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(reader, buf, mailbox.sender(), receipt_tx));

        self.connection = Some(Connection {
            writer,
            receipts,
            reader,
        });
        self.subscriptions.clear();
        Ok(())
    }

    async fn write(&mut self, frame: Frame) -> Result<(), StompError> {
        let connection = self.connection.as_mut().ok_or(StompError::NotConnected)?;
        connection.writer.write_all(&frame.to_bytes()).await?;
        Ok(())
    }

    /// Subscribe to `queue` with automatic acknowledgement
    pub async fn subscribe(&mut self, id: &str, queue: &str) -> Result<(), StompError> {
        self.write(
            Frame::new("SUBSCRIBE")
                .header("destination", queue)
                .header("id", id)
                .header("ack", "auto"),
        )
        .await?;
        self.subscriptions.push(id.to_string());
        Ok(())
    }

    pub async fn send(&mut self, destination: &str, body: &str) -> Result<(), StompError> {
        self.write(
            Frame::new("SEND")
                .header("destination", destination)
                .body(body.to_string()),
        )
        .await
    }

    /// Unsubscribe everything and close the session, waiting for the broker's receipt.
    ///
    /// The connection is torn down even when the broker went away; the first
    /// write error is returned afterwards.
    pub async fn disconnect(&mut self) -> Result<(), StompError> {
        let Some(mut connection) = self.connection.take() else {
            return Err(StompError::NotConnected);
        };
        let subscriptions = std::mem::take(&mut self.subscriptions);

        let written = async {
            for id in subscriptions {
                let frame = Frame::new("UNSUBSCRIBE").header("id", id);
                connection.writer.write_all(&frame.to_bytes()).await?;
            }
            let frame = Frame::new("DISCONNECT").header("receipt", DISCONNECT_RECEIPT);
            connection.writer.write_all(&frame.to_bytes()).await
        }
        .await;

        match &written {
            Ok(()) => {
                let receipt = tokio::time::timeout(BROKER_TIMEOUT, async {
                    while let Some(id) = connection.receipts.recv().await {
                        if id == DISCONNECT_RECEIPT {
                            return true;
                        }
                    }
                    false
                })
                .await;
                if !matches!(receipt, Ok(true)) {
                    warn!(broker = %self, "No receipt for DISCONNECT");
                }
            }
            Err(e) => warn!(broker = %self, error = %e, "Failed to close the STOMP session"),
        }

        connection.reader.abort();
        if let Err(e) = connection.writer.shutdown().await {
            warn!(broker = %self, error = %e, "Failed to shut down the broker socket");
        }
        written.map_err(StompError::from)
    }
}

impl Display for Broker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

async fn read_frame(reader: &mut OwnedReadHalf, buf: &mut BytesMut) -> Result<Frame, StompError> {
    loop {
        if let Some(frame) = Frame::decode(buf)? {
            return Ok(frame);
        }
        if reader.read_buf(buf).await? == 0 {
            return Err(StompError::ConnectionClosed);
        }
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    mut buf: BytesMut,
    mailbox: mpsc::UnboundedSender<Message>,
    receipts: mpsc::UnboundedSender<String>,
) {
    loop {
        let frame = match read_frame(&mut reader, &mut buf).await {
            Ok(frame) => frame,
            Err(StompError::ConnectionClosed) => {
                info!("Broker closed the connection");
                return;
            }
            Err(e) => {
                error!(error = %e, "Failed to read from broker");
                return;
            }
        };

        match frame.command.as_str() {
            "MESSAGE" => {
                let message = Message {
                    body: frame.body_str(),
                    headers: frame.headers,
                };
                if mailbox.send(message).is_err() {
                    return;
                }
            }
            "ERROR" => {
                error!(
                    message = %frame.body_str(),
                    headers = ?frame.headers,
                    "Received an error from the broker"
                );
            }
            "RECEIPT" => {
                if let Some(id) = frame.get_header("receipt-id") {
                    let _ = receipts.send(id.to_string());
                }
            }
            other => debug!(command = other, "Ignoring frame"),
        }
    }
}
