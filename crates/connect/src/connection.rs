// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Duplex text-message connection to one remote endpoint.
//!
//! The write half is serviced by a dedicated writer task fed through an
//! unbounded channel; [`MessageSender`] fronts that channel and is the
//! reverse-channel handle given to subscription callbacks. Sends and
//! receives are independent directions, so callback code may send on the
//! same connection the session is reading from without coordination.

use std::{
    fmt::{self, Debug},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Bytes, Message},
};

use crate::error::{SessionError, SessionResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Cloneable handle for sending text messages on a live connection.
///
/// Handed to subscription callbacks as the reverse channel, allowing e.g.
/// an order to be placed from inside a market-data callback over the same
/// connection the session is receiving on.
#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
}

impl MessageSender {
    /// Sends a text message.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] when the connection is closed.
    pub fn send_text(&self, text: impl Into<String>) -> SessionResult<()> {
        self.send_raw(Message::Text(text.into().into()))
    }

    /// Sends a protocol ping frame.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] when the connection is closed.
    pub(crate) fn send_ping(&self) -> SessionResult<()> {
        self.send_raw(Message::Ping(Bytes::new()))
    }

    fn send_raw(&self, message: Message) -> SessionResult<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(SessionError::NotConnected);
        }
        self.tx
            .send(message)
            .map_err(|_| SessionError::NotConnected)
    }

    /// Initiates a graceful close: queues a close frame and marks the
    /// connection closed for all holders of this handle. Idempotent.
    pub(crate) fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.tx.send(Message::Close(None));
        }
    }

    /// Returns `true` while the connection accepts sends.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Debug for MessageSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSender")
            .field("open", &self.is_open())
            .finish()
    }
}

/// A duplex text-message channel to one remote WebSocket endpoint.
pub struct Connection {
    reader: SplitStream<WsStream>,
    sender: MessageSender,
    open: Arc<AtomicBool>,
}

impl Connection {
    /// Opens a connection to the given wire URI.
    ///
    /// # Errors
    ///
    /// Returns a recoverable transport error when the handshake is rejected.
    pub async fn open(url: &str) -> SessionResult<Self> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| SessionError::Transport(format!("WebSocket handshake failed: {e}")))?;
        tracing::debug!(url, "Connection established");

        let (sink, reader) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        let open = Arc::new(AtomicBool::new(true));

        tokio::spawn(writer_task(sink, rx, Arc::clone(&open)));

        let sender = MessageSender {
            tx,
            open: Arc::clone(&open),
        };

        Ok(Self {
            reader,
            sender,
            open,
        })
    }

    /// Returns a cloneable send handle for this connection.
    #[must_use]
    pub fn sender(&self) -> MessageSender {
        self.sender.clone()
    }

    /// Sends a text message.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] when the connection is closed.
    pub fn send(&self, text: impl Into<String>) -> SessionResult<()> {
        self.sender.send_text(text)
    }

    /// Receives the next text message, answering protocol pings and skipping
    /// non-text frames along the way.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] when called on a closed
    /// connection, or a recoverable transport error when the peer closes or
    /// the stream fails.
    pub async fn receive(&mut self) -> SessionResult<String> {
        if !self.open.load(Ordering::Acquire) {
            return Err(SessionError::NotConnected);
        }
        loop {
            match self.reader.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Ping(payload))) => {
                    tracing::trace!("Received ping frame ({} bytes)", payload.len());
                    let _ = self.sender.send_raw(Message::Pong(payload));
                }
                Some(Ok(Message::Pong(payload))) => {
                    tracing::trace!("Received pong frame ({} bytes)", payload.len());
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!("Skipping binary message ({} bytes)", data.len());
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("Received close frame: {frame:?}");
                    self.open.store(false, Ordering::Release);
                    return Err(SessionError::Transport(
                        "connection closed by peer".to_string(),
                    ));
                }
                Some(Ok(Message::Frame(_))) => {
                    tracing::warn!("Received raw frame (unexpected)");
                }
                Some(Err(e)) => {
                    self.open.store(false, Ordering::Release);
                    return Err(SessionError::Transport(e.to_string()));
                }
                None => {
                    self.open.store(false, Ordering::Release);
                    return Err(SessionError::Transport("connection closed".to_string()));
                }
            }
        }
    }

    /// Closes the connection gracefully. Idempotent.
    pub fn close(&mut self) {
        self.sender.close();
    }

    /// Returns `true` while the connection is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.sender.close();
    }
}

impl Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.is_open())
            .finish()
    }
}

async fn writer_task(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    open: Arc<AtomicBool>,
) {
    while let Some(message) = rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            tracing::debug!("Writer task stopped: {e}");
            break;
        }
        if closing {
            break;
        }
    }
    open.store(false, Ordering::Release);
    if let Err(e) = sink.close().await {
        tracing::trace!("Sink close: {e}");
    }
    tracing::trace!("Writer task finished");
}
