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

//! Multi-session orchestration.
//!
//! The orchestrator groups subscriptions into independent sessions, starts
//! them together with staggered connects, and aggregates failures: any
//! sibling failing terminally tears every session down rather than leaving
//! some running degraded. Per-group fault isolation is out of scope; run
//! one orchestrator per fault domain when isolation is required.

use std::{
    fmt,
    sync::{Arc, atomic::{AtomicU64, Ordering}},
};

use serde::{Deserialize, Serialize};
use tokio::{sync::RwLock, task::JoinSet};

use crate::{
    adapter::VenueAdapter,
    config::OrchestratorConfig,
    error::{SessionError, SessionResult},
    session::SessionManager,
    subscription::{IdAllocator, Subscription},
};

/// Identity of a session group within one orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A caller-defined bundle of subscriptions bound to exactly one session.
///
/// The bound session manager is discarded and rebuilt on every `start()`,
/// so each restart begins with a clean state machine.
struct SessionGroup {
    id: GroupId,
    subscriptions: Vec<Subscription>,
    manager: Option<Arc<SessionManager>>,
}

/// Runs many independent sessions concurrently with coordinated failure
/// handling.
pub struct SessionOrchestrator {
    adapter: Arc<dyn VenueAdapter>,
    config: OrchestratorConfig,
    ids: Arc<IdAllocator>,
    next_group: AtomicU64,
    groups: RwLock<Vec<SessionGroup>>,
}

impl fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("adapter", &self.adapter.name())
            .finish_non_exhaustive()
    }
}

impl SessionOrchestrator {
    /// Creates a new orchestrator for the given adapter.
    #[must_use]
    pub fn new(adapter: Arc<dyn VenueAdapter>, config: OrchestratorConfig) -> Self {
        Self {
            adapter,
            config,
            ids: Arc::new(IdAllocator::new()),
            next_group: AtomicU64::new(0),
            groups: RwLock::new(Vec::new()),
        }
    }

    /// Registers a new session group. Does not connect anything.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSubscriptions`] for an empty bundle and
    /// [`SessionError::AlreadyRegistered`] when a subscription is already
    /// bound to a group.
    pub async fn compose(&self, subscriptions: Vec<Subscription>) -> SessionResult<GroupId> {
        if subscriptions.is_empty() {
            return Err(SessionError::NoSubscriptions);
        }
        for subscription in &subscriptions {
            subscription.bind_id(self.ids.next_id())?;
        }
        let id = GroupId(self.next_group.fetch_add(1, Ordering::Relaxed));
        self.groups.write().await.push(SessionGroup {
            id,
            subscriptions,
            manager: None,
        });
        tracing::debug!(group = %id, "Session group registered");
        Ok(id)
    }

    /// Returns the number of registered groups.
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }

    /// Starts one session per registered group and runs them all until the
    /// first terminates. On that event every sibling is shut down and fully
    /// awaited, then the triggering session's error (if any) is returned.
    ///
    /// By design this only returns `Ok` through [`Self::shutdown_all`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSubscriptions`] when no groups are
    /// registered, otherwise the first terminal session error.
    pub async fn start(&self) -> SessionResult<()> {
        let managers: Vec<Arc<SessionManager>> = {
            let mut groups = self.groups.write().await;
            if groups.is_empty() {
                return Err(SessionError::NoSubscriptions);
            }
            let mut managers = Vec::with_capacity(groups.len());
            for (index, group) in groups.iter_mut().enumerate() {
                let mut config = self.config.session.clone();
                config.startup_delay += self.config.stagger * index as u32;
                let manager = Arc::new(SessionManager::new(
                    Arc::clone(&self.adapter),
                    config,
                    Arc::clone(&self.ids),
                ));
                manager.track_existing(group.subscriptions.clone()).await;
                group.manager = Some(Arc::clone(&manager));
                managers.push(manager);
            }
            managers
        };
        tracing::info!(sessions = managers.len(), "Starting sessions");

        let mut tasks: JoinSet<SessionResult<()>> = JoinSet::new();
        for manager in &managers {
            let manager = Arc::clone(manager);
            tasks.spawn(async move { manager.run().await });
        }

        let trigger = match tasks.join_next().await {
            Some(Ok(result)) => result,
            Some(Err(e)) => Err(SessionError::Fatal(format!("session task panicked: {e}"))),
            None => Ok(()),
        };
        if let Err(e) = &trigger {
            tracing::error!(error = %e, "Session failed; shutting down siblings");
        }

        for manager in &managers {
            manager.shutdown().await;
        }
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "Sibling session ended with error during shutdown");
                }
                Err(e) => tracing::warn!(error = %e, "Session task join error"),
            }
        }
        trigger
    }

    /// Adds subscriptions to an existing group, delegating to its bound
    /// session when one is running.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown groups, already-bound subscriptions, or
    /// any failure from the delegated subscribe.
    pub async fn add_subscriptions(
        &self,
        group_id: GroupId,
        subscriptions: Vec<Subscription>,
    ) -> SessionResult<()> {
        let manager = {
            let mut groups = self.groups.write().await;
            let group = groups
                .iter_mut()
                .find(|group| group.id == group_id)
                .ok_or_else(|| SessionError::Fatal(format!("unknown session group: {group_id}")))?;
            for subscription in &subscriptions {
                subscription.bind_id(self.ids.next_id())?;
            }
            group.subscriptions.extend(subscriptions.iter().cloned());
            group.manager.clone()
        };
        match manager {
            Some(manager) => manager.admit(subscriptions).await,
            None => Ok(()),
        }
    }

    /// Removes the given subscriptions from whichever groups own them,
    /// delegating to the bound sessions.
    ///
    /// # Errors
    ///
    /// Returns the first delegation error; groups whose session reports
    /// [`SessionError::UnsupportedOperation`] are left unchanged.
    pub async fn unsubscribe(&self, subscriptions: &[Subscription]) -> SessionResult<()> {
        let mut groups = self.groups.write().await;
        for group in groups.iter_mut() {
            let members: Vec<Subscription> = group
                .subscriptions
                .iter()
                .filter(|owned| subscriptions.contains(owned))
                .cloned()
                .collect();
            if members.is_empty() {
                continue;
            }
            if let Some(manager) = group.manager.clone() {
                manager.unsubscribe(&members).await?;
            }
            group
                .subscriptions
                .retain(|owned| !members.contains(owned));
        }
        Ok(())
    }

    /// Removes every subscription of the given group.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown groups or any failure from the
    /// delegated unsubscribe.
    pub async fn unsubscribe_group(&self, group_id: GroupId) -> SessionResult<()> {
        let mut groups = self.groups.write().await;
        let group = groups
            .iter_mut()
            .find(|group| group.id == group_id)
            .ok_or_else(|| SessionError::Fatal(format!("unknown session group: {group_id}")))?;
        if group.subscriptions.is_empty() {
            return Ok(());
        }
        if let Some(manager) = group.manager.clone() {
            manager.unsubscribe(&group.subscriptions).await?;
        }
        group.subscriptions.clear();
        Ok(())
    }

    /// Requests a graceful shutdown of every bound session.
    pub async fn shutdown_all(&self) {
        let managers: Vec<Arc<SessionManager>> = self
            .groups
            .read()
            .await
            .iter()
            .filter_map(|group| group.manager.clone())
            .collect();
        tracing::info!(sessions = managers.len(), "Shutting down all sessions");
        for manager in managers {
            manager.shutdown().await;
        }
    }
}
