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

//! The venue adapter capability trait.
//!
//! An adapter supplies everything venue-specific and nothing else: endpoint
//! addresses, wire encodings, a request-signing hook, and classification of
//! inbound frames and HTTP responses. The engine owns connection lifecycle,
//! reconnection, subscription tracking, dispatch, and orchestration, and is
//! handed the adapter by composition (`Arc<dyn VenueAdapter>`).

use std::{collections::HashMap, fmt::Debug};

use async_trait::async_trait;
use serde_json::Value;
use strum::Display;
use ustr::Ustr;

use crate::{
    connection::MessageSender,
    error::{HttpResult, SessionResult},
    http::{ResponseBody, VenueRequest},
    subscription::Subscription,
};

/// Classification of one inbound wire message, produced by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// A payload routable to a subscription by its topic.
    Data {
        /// The external identity of the owning subscription.
        topic: Ustr,
        /// The decoded payload delivered to callbacks.
        payload: Value,
    },
    /// Positive confirmation of the authentication handshake.
    AuthAccepted,
    /// The venue rejected the authentication handshake.
    AuthRejected(String),
    /// The venue asked the client to drop and re-establish the connection.
    ReconnectRequest(String),
    /// A control frame with no routing consequence (acks, pongs, notices).
    Control,
}

/// Direction of a subscription control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ControlOp {
    Subscribe,
    Unsubscribe,
}

/// Venue-specific capability hooks consumed by the engine.
///
/// Implementations must be cheap to call: every hook other than
/// [`Self::on_maintenance`] runs on the session's receive path.
#[async_trait]
pub trait VenueAdapter: Send + Sync + Debug {
    /// A short identifier used in diagnostics.
    fn name(&self) -> &str;

    /// Base URL for request/response calls.
    fn http_base_url(&self) -> String;

    /// Wire URI for a streaming connection covering the given subscriptions.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint can serve the subscriptions.
    fn ws_url(&self, subscriptions: &[Subscription]) -> SessionResult<String>;

    /// Signs a request in place, adding or replacing params, body fields,
    /// and headers (timestamps, API-key header, signature).
    ///
    /// # Errors
    ///
    /// Returns an error if signing material is missing or invalid.
    fn sign(&self, request: &mut VenueRequest) -> HttpResult<()>;

    /// Classifies an HTTP response. The transport status alone is never
    /// trusted as a success signal: venues may report logical errors under
    /// a 2xx status, and this hook is where they surface.
    ///
    /// # Errors
    ///
    /// Returns the adapter-defined error for logical failures.
    fn classify_response(
        &self,
        status: u16,
        headers: &HashMap<String, String>,
        body: &ResponseBody,
    ) -> HttpResult<()>;

    /// The authentication message to send after connecting, or `None` when
    /// the venue authenticates out of band.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be produced.
    fn auth_message(&self) -> SessionResult<Option<String>>;

    /// Builds one subscribe/unsubscribe control message covering the given
    /// per-subscription payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be encoded.
    fn control_message(&self, op: ControlOp, payloads: &[Value]) -> SessionResult<String>;

    /// Decodes and classifies one inbound wire message.
    ///
    /// # Errors
    ///
    /// Returns an error for undecodable frames; the session logs and drops
    /// these rather than failing.
    fn classify_inbound(&self, text: &str) -> SessionResult<InboundMessage>;

    /// Periodic maintenance hook (token refresh, application-level ping).
    /// Invoked on the session's maintenance interval when one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error to fail the session.
    async fn on_maintenance(&self, sender: &MessageSender) -> SessionResult<()> {
        let _ = sender;
        Ok(())
    }
}
