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

//! The streaming session state machine.
//!
//! A [`SessionManager`] owns at most one live [`Connection`] and the
//! registry of its tracked subscriptions, and drives
//! connect → authenticate → subscribe → receive/dispatch with periodic
//! maintenance, keepalive pings, and reconnection on recoverable transport
//! failures.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use serde_json::Value;
use strum::Display;
use tokio::sync::RwLock;

use crate::{
    adapter::{ControlOp, InboundMessage, VenueAdapter},
    config::SessionConfig,
    connection::{Connection, MessageSender},
    error::{SessionError, SessionResult},
    registry::SubscriptionRegistry,
    subscription::{IdAllocator, Subscription, SubscriptionId},
};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[repr(u8)]
pub enum SessionState {
    Stopped = 0,
    Running = 1,
    Closing = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Closing,
            _ => Self::Stopped,
        }
    }
}

/// What the run loop does with a failed connection attempt or session task.
enum Disposition {
    /// The session was closing: terminate cleanly.
    CleanStop,
    /// Recoverable with auto-reconnect enabled: try again.
    Reconnect(SessionError),
    /// Terminal: propagate to the caller.
    Fail(SessionError),
}

/// Manages one streaming session: a single connection, its tracked
/// subscriptions, and the reconnect policy.
pub struct SessionManager {
    adapter: Arc<dyn VenueAdapter>,
    config: SessionConfig,
    ids: Arc<IdAllocator>,
    registry: SubscriptionRegistry,
    state: AtomicU8,
    sender: RwLock<Option<MessageSender>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("adapter", &self.adapter.name())
            .field("state", &self.state())
            .field("topics", &self.registry.active_topics())
            .finish()
    }
}

impl SessionManager {
    /// Creates a new session manager with no tracked subscriptions.
    #[must_use]
    pub fn new(
        adapter: Arc<dyn VenueAdapter>,
        config: SessionConfig,
        ids: Arc<IdAllocator>,
    ) -> Self {
        Self {
            adapter,
            config,
            ids,
            registry: SubscriptionRegistry::new(),
            state: AtomicU8::new(SessionState::Stopped as u8),
            sender: RwLock::new(None),
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns the topics of all tracked subscriptions.
    #[must_use]
    pub fn active_topics(&self) -> Vec<ustr::Ustr> {
        self.registry.active_topics()
    }

    /// Runs the session until shutdown or a terminal error.
    ///
    /// The call returns `Ok` only through [`Self::shutdown`]; otherwise it
    /// returns the first error that could not be converted into a reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyRunning`] when called re-entrantly,
    /// any subscription initialization error, and the terminal session
    /// error as described above.
    pub async fn run(&self) -> SessionResult<()> {
        match self.state.compare_exchange(
            SessionState::Stopped as u8,
            SessionState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(current) if SessionState::from_u8(current) == SessionState::Closing => {
                tracing::debug!(adapter = self.adapter.name(), "Session shut down before start");
                return Ok(());
            }
            Err(_) => return Err(SessionError::AlreadyRunning),
        }
        tracing::info!(adapter = self.adapter.name(), "Session starting");

        let result = self.run_loop().await;
        self.state
            .store(SessionState::Stopped as u8, Ordering::Release);
        match &result {
            Ok(()) => tracing::info!(adapter = self.adapter.name(), "Session stopped"),
            Err(e) => tracing::error!(
                adapter = self.adapter.name(),
                error = %e,
                topics = ?self.registry.active_topics(),
                "Session failed",
            ),
        }
        result
    }

    async fn run_loop(&self) -> SessionResult<()> {
        for subscription in self.registry.snapshot().await {
            subscription.ensure_initialized().await?;
        }

        let mut first_attempt = true;
        loop {
            let delay = if first_attempt {
                self.config.startup_delay
            } else {
                self.config.reconnect_delay
            };
            first_attempt = false;
            tokio::time::sleep(delay).await;

            if self.state() == SessionState::Closing {
                return Ok(());
            }

            let subscriptions = self.registry.snapshot().await;
            let url = self.adapter.ws_url(&subscriptions)?;
            let mut connection = match Connection::open(&url).await {
                Ok(connection) => connection,
                Err(e) => match self.disposition(e) {
                    Disposition::CleanStop => return Ok(()),
                    Disposition::Reconnect(e) => {
                        tracing::warn!(
                            adapter = self.adapter.name(),
                            error = %e,
                            topics = ?self.registry.active_topics(),
                            "Connect failed; reconnecting",
                        );
                        continue;
                    }
                    Disposition::Fail(e) => return Err(e),
                },
            };
            *self.sender.write().await = Some(connection.sender());

            // A shutdown racing the connect above may have read the sender
            // slot before it was filled; re-checking the state here closes
            // that window.
            if self.state() == SessionState::Closing {
                connection.close();
                *self.sender.write().await = None;
                return Ok(());
            }

            let sender = connection.sender();
            // The select is the join/cancel barrier: whichever arm finishes
            // first, the others are dropped at their next await point.
            let outcome: SessionResult<()> = tokio::select! {
                res = self.main_task(&mut connection) => res,
                res = self.periodic_task(sender.clone()) => res,
                res = self.keepalive_task(sender.clone()) => res,
            };

            connection.close();
            *self.sender.write().await = None;

            let error = match outcome {
                Ok(()) => SessionError::Transport("session task ended unexpectedly".to_string()),
                Err(e) => e,
            };
            match self.disposition(error) {
                Disposition::CleanStop => return Ok(()),
                Disposition::Reconnect(e) => {
                    tracing::warn!(
                        adapter = self.adapter.name(),
                        error = %e,
                        topics = ?self.registry.active_topics(),
                        "Connection lost; reconnecting",
                    );
                }
                Disposition::Fail(e) => return Err(e),
            }
        }
    }

    fn disposition(&self, error: SessionError) -> Disposition {
        if !error.is_recoverable() {
            return Disposition::Fail(error);
        }
        if self.state() == SessionState::Closing {
            Disposition::CleanStop
        } else if self.config.auto_reconnect {
            Disposition::Reconnect(error)
        } else {
            Disposition::Fail(error)
        }
    }

    async fn main_task(&self, connection: &mut Connection) -> SessionResult<()> {
        let subscriptions = self.registry.snapshot().await;

        if subscriptions.iter().any(Subscription::requires_auth) {
            self.authenticate(connection).await?;
        }

        if !subscriptions.is_empty() {
            let payloads: Vec<Value> = subscriptions
                .iter()
                .map(Subscription::subscribe_payload)
                .collect();
            let message = self
                .adapter
                .control_message(ControlOp::Subscribe, &payloads)?;
            connection.send(message)?;
            tracing::debug!(
                adapter = self.adapter.name(),
                count = subscriptions.len(),
                "Subscribe control message sent",
            );
        }

        loop {
            let text = connection.receive().await?;
            let reply = connection.sender();
            self.handle_inbound(&text, reply).await?;
        }
    }

    async fn authenticate(&self, connection: &mut Connection) -> SessionResult<()> {
        let message = self.adapter.auth_message()?.ok_or_else(|| {
            SessionError::Authentication("adapter produced no authentication message".to_string())
        })?;
        connection.send(message)?;

        loop {
            let text = connection.receive().await?;
            match self.adapter.classify_inbound(&text) {
                Ok(InboundMessage::AuthAccepted) => {
                    tracing::info!(adapter = self.adapter.name(), "Authenticated");
                    return Ok(());
                }
                Ok(InboundMessage::AuthRejected(reason)) => {
                    return Err(SessionError::Authentication(reason));
                }
                Ok(InboundMessage::ReconnectRequest(reason)) => {
                    return Err(SessionError::Transport(format!(
                        "venue requested reconnect: {reason}"
                    )));
                }
                Ok(InboundMessage::Data { topic, payload }) => {
                    // Some venues start streaming before confirming auth.
                    self.registry
                        .publish(topic, payload, Some(connection.sender()))
                        .await;
                }
                Ok(InboundMessage::Control) => {
                    tracing::trace!("Control message while awaiting auth confirmation");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping undecodable message");
                }
            }
        }
    }

    async fn handle_inbound(&self, text: &str, reply: MessageSender) -> SessionResult<()> {
        match self.adapter.classify_inbound(text) {
            Ok(InboundMessage::Data { topic, payload }) => {
                self.registry.publish(topic, payload, Some(reply)).await;
                Ok(())
            }
            Ok(InboundMessage::ReconnectRequest(reason)) => Err(SessionError::Transport(format!(
                "venue requested reconnect: {reason}"
            ))),
            Ok(InboundMessage::AuthRejected(reason)) => Err(SessionError::Authentication(reason)),
            Ok(InboundMessage::AuthAccepted | InboundMessage::Control) => {
                tracing::trace!("Control message: {text}");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable message");
                Ok(())
            }
        }
    }

    async fn periodic_task(&self, sender: MessageSender) -> SessionResult<()> {
        match self.config.maintenance_interval {
            Some(interval) => loop {
                self.adapter.on_maintenance(&sender).await?;
                tokio::time::sleep(interval).await;
            },
            None => std::future::pending().await,
        }
    }

    async fn keepalive_task(&self, sender: MessageSender) -> SessionResult<()> {
        match self.config.heartbeat {
            Some(interval) => loop {
                tokio::time::sleep(interval).await;
                sender.send_ping()?;
            },
            None => std::future::pending().await,
        }
    }

    /// Adds new subscriptions to a session, binding their identities.
    ///
    /// Each subscription is initialized before tracking. When a connection
    /// is live, exactly one subscribe control message is transmitted,
    /// containing only the new subscriptions; otherwise they are picked up
    /// by the next connect's full subscribe.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyRegistered`] for subscriptions already
    /// bound elsewhere, or any initialization/encoding/send error.
    pub async fn subscribe(&self, subscriptions: Vec<Subscription>) -> SessionResult<()> {
        for subscription in &subscriptions {
            subscription.bind_id(self.ids.next_id())?;
        }
        self.admit(subscriptions).await
    }

    /// Tracks already-bound subscriptions, initializing and announcing them.
    pub(crate) async fn admit(&self, subscriptions: Vec<Subscription>) -> SessionResult<()> {
        if subscriptions.is_empty() {
            return Ok(());
        }
        for subscription in &subscriptions {
            subscription.ensure_initialized().await?;
        }
        let payloads: Vec<Value> = subscriptions
            .iter()
            .map(Subscription::subscribe_payload)
            .collect();
        self.registry.insert_all(subscriptions).await;

        if let Some(sender) = self.sender.read().await.clone() {
            let message = self
                .adapter
                .control_message(ControlOp::Subscribe, &payloads)?;
            sender.send_text(message)?;
            tracing::debug!(
                adapter = self.adapter.name(),
                count = payloads.len(),
                "Subscribe control message sent for new subscriptions",
            );
        }
        Ok(())
    }

    /// Tracks already-bound subscriptions without initializing or
    /// announcing them; used when seeding a session before `run()`.
    pub(crate) async fn track_existing(&self, subscriptions: Vec<Subscription>) {
        self.registry.insert_all(subscriptions).await;
    }

    /// Removes subscriptions by internal identity and transmits one
    /// unsubscribe control message when a connection is live.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnsupportedOperation`] when any subscription
    /// lacks unsubscription support; the tracked set is left unchanged in
    /// that case.
    pub async fn unsubscribe(&self, subscriptions: &[Subscription]) -> SessionResult<()> {
        if subscriptions.is_empty() {
            return Ok(());
        }
        let mut payloads = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let payload = subscription.unsubscribe_payload().ok_or_else(|| {
                SessionError::UnsupportedOperation(format!(
                    "unsubscription not supported for topic {}",
                    subscription.topic()
                ))
            })?;
            payloads.push(payload);
        }
        let ids: Vec<SubscriptionId> = subscriptions
            .iter()
            .filter_map(Subscription::id)
            .collect();
        let removed = self.registry.remove_all(&ids).await;
        tracing::debug!(
            adapter = self.adapter.name(),
            removed,
            "Subscriptions removed",
        );

        if let Some(sender) = self.sender.read().await.clone() {
            let message = self
                .adapter
                .control_message(ControlOp::Unsubscribe, &payloads)?;
            sender.send_text(message)?;
        }
        Ok(())
    }

    /// Requests a graceful shutdown. Idempotent and safe to call
    /// concurrently with an in-flight reconnect attempt.
    ///
    /// Closing the live connection proactively forces the in-flight receive
    /// to fail; the run loop observes the closing state and terminates
    /// instead of reconnecting.
    pub async fn shutdown(&self) {
        let previous = self.state.swap(SessionState::Closing as u8, Ordering::AcqRel);
        if SessionState::from_u8(previous) == SessionState::Closing {
            tracing::trace!(adapter = self.adapter.name(), "Shutdown already in progress");
            return;
        }
        tracing::info!(adapter = self.adapter.name(), "Session closing");
        if let Some(sender) = self.sender.read().await.clone() {
            sender.close();
        }
    }
}
