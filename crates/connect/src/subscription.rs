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

//! Subscriptions: units of streaming interest with memoized identity.
//!
//! A [`Subscription`] wraps an adapter-implemented [`SubscriptionSpec`] with
//! the state the engine owns: a one-shot internal identity bound at
//! registration, the memoized external topic, an initialization latch, and
//! the callbacks to invoke on matching inbound messages.

use std::{
    fmt::{self, Debug},
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ustr::Ustr;

use crate::{
    connection::MessageSender,
    error::{SessionError, SessionResult},
};

/// Process-unique internal identity of a subscription, assigned once at
/// registration and used for equality and removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocates subscription identities from a single arena.
///
/// Injected into every session an orchestrator constructs, so identities
/// stay unique without process-wide mutable state.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Creates a new allocator starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next unused identity.
    pub fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Future returned by a stream callback.
pub type CallbackFuture = BoxFuture<'static, ()>;

/// Async callback invoked with a matching payload and, when the message
/// arrived over a live connection, the reverse-channel handle for sending
/// on that same connection.
pub type StreamCallback = Arc<dyn Fn(Value, Option<MessageSender>) -> CallbackFuture + Send + Sync>;

/// Venue-specific hooks describing one logical stream.
#[async_trait]
pub trait SubscriptionSpec: Send + Sync + Debug {
    /// The external identity under which the venue routes messages for this
    /// stream. Called at most once per subscription; the engine memoizes
    /// the result.
    fn topic(&self) -> String;

    /// The payload fragment contributed to a subscribe control message.
    fn subscribe_payload(&self) -> Value;

    /// The payload fragment contributed to an unsubscribe control message,
    /// or `None` when the venue has no unsubscription support.
    fn unsubscribe_payload(&self) -> Option<Value> {
        None
    }

    /// Whether this stream requires the session to authenticate first.
    fn requires_auth(&self) -> bool {
        false
    }

    /// Asynchronous setup run once before first use (e.g. fetching a
    /// listen-key over the request pipeline).
    ///
    /// # Errors
    ///
    /// Returns an error to fail the owning session start or subscribe call.
    async fn initialize(&self) -> SessionResult<()> {
        Ok(())
    }
}

struct SubscriptionInner {
    spec: Arc<dyn SubscriptionSpec>,
    id: OnceLock<SubscriptionId>,
    topic: OnceLock<Ustr>,
    initialized: AtomicBool,
    callbacks: Vec<StreamCallback>,
}

/// A caller's declared interest in one logical stream.
///
/// Cheap to clone; clones share identity and state. Equality is by internal
/// identity once bound, by allocation otherwise.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    /// Creates a subscription with no callbacks (useful for streams consumed
    /// purely for their side effects, e.g. keepalive channels).
    #[must_use]
    pub fn new(spec: Arc<dyn SubscriptionSpec>) -> Self {
        Self::with_callbacks(spec, Vec::new())
    }

    /// Creates a subscription with the given callbacks.
    #[must_use]
    pub fn with_callbacks(spec: Arc<dyn SubscriptionSpec>, callbacks: Vec<StreamCallback>) -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                spec,
                id: OnceLock::new(),
                topic: OnceLock::new(),
                initialized: AtomicBool::new(false),
                callbacks,
            }),
        }
    }

    /// Returns the internal identity, or `None` before registration.
    #[must_use]
    pub fn id(&self) -> Option<SubscriptionId> {
        self.inner.id.get().copied()
    }

    /// Binds the internal identity exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyRegistered`] if the subscription is
    /// already bound; a subscription belongs to exactly one group.
    pub(crate) fn bind_id(&self, id: SubscriptionId) -> SessionResult<()> {
        self.inner
            .id
            .set(id)
            .map_err(|_| SessionError::AlreadyRegistered(self.id().unwrap_or(id)))
    }

    /// Returns the external topic, computing it on first use and memoizing
    /// the result for the life of the subscription.
    #[must_use]
    pub fn topic(&self) -> Ustr {
        *self
            .inner
            .topic
            .get_or_init(|| Ustr::from(&self.inner.spec.topic()))
    }

    /// Whether this stream requires an authenticated session.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        self.inner.spec.requires_auth()
    }

    /// The payload fragment for subscribe control messages.
    #[must_use]
    pub fn subscribe_payload(&self) -> Value {
        self.inner.spec.subscribe_payload()
    }

    /// The payload fragment for unsubscribe control messages, if supported.
    #[must_use]
    pub fn unsubscribe_payload(&self) -> Option<Value> {
        self.inner.spec.unsubscribe_payload()
    }

    /// Runs the setup hook once per subscription lifetime.
    ///
    /// # Errors
    ///
    /// Propagates the hook's error; a failed attempt releases the latch so
    /// the next session start can retry.
    pub(crate) async fn ensure_initialized(&self) -> SessionResult<()> {
        if self.inner.initialized.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Err(e) = self.inner.spec.initialize().await {
            self.inner.initialized.store(false, Ordering::Release);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn callbacks(&self) -> &[StreamCallback] {
        &self.inner.callbacks
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => Arc::ptr_eq(&self.inner, &other.inner),
        }
    }
}

impl Eq for Subscription {}

impl Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id())
            .field("topic", &self.inner.topic.get())
            .field("requires_auth", &self.requires_auth())
            .field("callbacks", &self.inner.callbacks.len())
            .finish()
    }
}
