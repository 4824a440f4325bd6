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

//! Subscription tracking and inbound message dispatch.

use dashmap::DashMap;
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::RwLock;
use ustr::Ustr;

use crate::{
    connection::MessageSender,
    subscription::{Subscription, SubscriptionId},
};

/// Maps inbound message topics to tracked subscriptions and invokes their
/// callbacks. Embedded in a session; never shared across sessions.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    /// Tracked subscriptions in registration order.
    entries: RwLock<Vec<Subscription>>,
    /// Lock-free dispatch index keyed by memoized topic.
    by_topic: DashMap<Ustr, Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks the given subscriptions, indexing each by its topic.
    pub async fn insert_all(&self, subscriptions: Vec<Subscription>) {
        let mut entries = self.entries.write().await;
        for subscription in subscriptions {
            self.by_topic
                .insert(subscription.topic(), subscription.clone());
            entries.push(subscription);
        }
    }

    /// Removes subscriptions by internal identity, returning the number
    /// removed.
    pub async fn remove_all(&self, ids: &[SubscriptionId]) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|subscription| {
            if subscription.id().is_some_and(|id| ids.contains(&id)) {
                self.by_topic.remove(&subscription.topic());
                false
            } else {
                true
            }
        });
        before - entries.len()
    }

    /// Returns the tracked subscriptions in registration order.
    pub async fn snapshot(&self) -> Vec<Subscription> {
        self.entries.read().await.clone()
    }

    /// Returns the active topics for diagnostics.
    pub fn active_topics(&self) -> Vec<Ustr> {
        self.by_topic.iter().map(|entry| *entry.key()).collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Dispatches one decoded message to the matching subscription.
    ///
    /// All callbacks of the matched subscription run concurrently and are
    /// joined before this returns: the caller does not read the next wire
    /// message until the previous message's callbacks complete, bounding
    /// in-flight work to one message per session.
    ///
    /// Unmatched topics are logged and dropped, never raised.
    pub async fn publish(&self, topic: Ustr, payload: Value, reply: Option<MessageSender>) {
        let Some(subscription) = self.by_topic.get(&topic).map(|entry| entry.value().clone())
        else {
            tracing::warn!(%topic, "Dropping message for unknown subscription topic");
            return;
        };

        let callbacks = subscription.callbacks();
        if callbacks.is_empty() {
            return;
        }

        let futures: Vec<_> = callbacks
            .iter()
            .map(|callback| callback(payload.clone(), reply.clone()))
            .collect();
        join_all(futures).await;
    }
}
