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

//! Error types for streaming sessions and the request pipeline.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::subscription::SubscriptionId;

/// Error type for streaming sessions and their connections.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Operation attempted on a closed connection.
    #[error("Not connected")]
    NotConnected,
    /// Transport-level failure: peer-initiated close (graceful or abnormal),
    /// rejected handshake, or an explicit reconnect request from the venue.
    #[error("Transport error: {0}")]
    Transport(String),
    /// Authentication handshake rejected or unavailable.
    #[error("Authentication error: {0}")]
    Authentication(String),
    /// The adapter does not support the requested operation.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// Start was requested with nothing to stream.
    #[error("No subscriptions registered")]
    NoSubscriptions,
    /// `run()` called on a session that is already running.
    #[error("Session already running")]
    AlreadyRunning,
    /// The subscription is already bound to a session group.
    #[error("Subscription already registered: {0}")]
    AlreadyRegistered(SubscriptionId),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
    /// Any other failure.
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl SessionError {
    /// Returns `true` when the session loop may convert this error into a
    /// reconnect attempt (subject to the auto-reconnect setting and the
    /// session not already closing).
    ///
    /// `NotConnected` is recoverable: inside a session it only arises when
    /// the connection just went away under an in-flight send, which is the
    /// same condition as a peer close observed by the receive side.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::NotConnected)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<tungstenite::Error> for SessionError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

/// Result type alias for streaming session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Error type for the signed request pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    /// Logical failure reported by the venue, raised by the adapter's
    /// response classifier (which may fire even on a 2xx status).
    #[error("Venue error {code}: {message}")]
    Venue {
        /// Venue-assigned error code.
        code: String,
        /// Error message from the venue.
        message: String,
    },
    /// Network or connection error.
    #[error("Network error: {0}")]
    Network(String),
    /// Request timed out.
    #[error("Timeout: {0}")]
    Timeout(String),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
    /// The adapter's signing hook failed.
    #[error("Signing error: {0}")]
    Sign(String),
    /// Unexpected HTTP status code.
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

impl From<reqwest::Error> for HttpError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

/// Result type alias for request pipeline operations.
pub type HttpResult<T> = Result<T, HttpError>;
