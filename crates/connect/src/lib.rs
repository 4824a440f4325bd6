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

//! Venue-agnostic streaming session engine and signed request pipeline.
//!
//! `tradelink-connect` maintains long-lived, authenticated streaming
//! sessions to external trading venues and issues authenticated
//! request/response calls to them. Venue-specific adapters plug in through
//! the [`VenueAdapter`] capability trait, supplying only endpoint
//! addresses, message encodings, a request-signing hook, and response
//! classification; the engine supplies connection lifecycle, reconnection,
//! subscription tracking, message dispatch, and multi-session
//! orchestration.
//!
//! # Layers
//!
//! - [`Connection`] / [`MessageSender`]: a duplex text-message channel with
//!   a cloneable reverse-channel send handle.
//! - [`Subscription`] / [`SubscriptionSpec`]: units of streaming interest
//!   with memoized external identity and async callbacks.
//! - [`SessionManager`]: one connection plus its tracked subscriptions,
//!   driven through connect → authenticate → subscribe → dispatch with
//!   reconnection and graceful shutdown.
//! - [`SessionOrchestrator`]: runs many sessions concurrently; any terminal
//!   sibling failure tears the whole set down.
//! - [`VenueHttpClient`]: one-shot signed request/response calls over a
//!   shared connection pool.
//!
//! The engine persists nothing, exposes no CLI, and imposes no timeout,
//! retry, or throttling policy of its own; those concerns layer above.

pub mod adapter;
pub mod config;
pub mod connection;
pub mod consts;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod session;
pub mod subscription;

mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{ControlOp, InboundMessage, VenueAdapter};
pub use config::{OrchestratorConfig, SessionConfig};
pub use connection::{Connection, MessageSender};
pub use error::{HttpError, HttpResult, SessionError, SessionResult};
pub use http::{Method, ResponseBody, VenueHttpClient, VenueRequest, VenueResponse};
pub use orchestrator::{GroupId, SessionOrchestrator};
pub use session::{SessionManager, SessionState};
pub use subscription::{
    CallbackFuture, IdAllocator, StreamCallback, Subscription, SubscriptionId, SubscriptionSpec,
};
