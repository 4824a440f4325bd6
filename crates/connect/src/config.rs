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

//! Configuration for sessions and their orchestration.
//!
//! # Reconnection
//!
//! The startup delay and the reconnect delay are separate settings. The
//! startup delay is applied once before the first connect (and is what the
//! orchestrator staggers across sessions); the reconnect delay throttles
//! every subsequent attempt. Configure both to the same value to reproduce
//! a uniform delay on every attempt.

use std::time::Duration;

/// Configuration for one streaming session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Delay before the first connection attempt.
    pub startup_delay: Duration,
    /// Delay before every reconnection attempt after the first.
    pub reconnect_delay: Duration,
    /// Whether recoverable transport errors trigger a reconnect instead of
    /// failing the session.
    pub auto_reconnect: bool,
    /// Interval between invocations of the adapter's maintenance hook, or
    /// `None` to disable periodic maintenance.
    pub maintenance_interval: Option<Duration>,
    /// Interval between protocol ping frames, or `None` to disable the
    /// built-in keepalive. Set below the venue's idle timeout.
    pub heartbeat: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_millis(250),
            reconnect_delay: Duration::from_secs(5),
            auto_reconnect: true,
            maintenance_interval: None,
            heartbeat: Some(Duration::from_secs(20)),
        }
    }
}

/// Configuration for a multi-session orchestrator.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Base configuration applied to every session.
    pub session: SessionConfig,
    /// Additional startup delay applied per session in registration order,
    /// so concurrently starting sessions do not all open connections in the
    /// same instant.
    pub stagger: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            stagger: Duration::from_millis(250),
        }
    }
}
