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

//! Shared stubs for unit tests.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    adapter::{ControlOp, InboundMessage, VenueAdapter},
    error::{HttpResult, SessionResult},
    http::{ResponseBody, VenueRequest},
    subscription::{Subscription, SubscriptionSpec},
};

/// Adapter stub with an inert wire dialect; sessions built on it never
/// reach a live endpoint in unit tests.
#[derive(Debug, Default)]
pub(crate) struct NullAdapter;

#[async_trait]
impl VenueAdapter for NullAdapter {
    fn name(&self) -> &str {
        "null"
    }

    fn http_base_url(&self) -> String {
        "http://127.0.0.1:1".to_string()
    }

    fn ws_url(&self, _subscriptions: &[Subscription]) -> SessionResult<String> {
        Ok("ws://127.0.0.1:1/ws".to_string())
    }

    fn sign(&self, _request: &mut VenueRequest) -> HttpResult<()> {
        Ok(())
    }

    fn classify_response(
        &self,
        _status: u16,
        _headers: &HashMap<String, String>,
        _body: &ResponseBody,
    ) -> HttpResult<()> {
        Ok(())
    }

    fn auth_message(&self) -> SessionResult<Option<String>> {
        Ok(None)
    }

    fn control_message(&self, op: ControlOp, payloads: &[Value]) -> SessionResult<String> {
        Ok(json!({"op": op.to_string(), "args": payloads}).to_string())
    }

    fn classify_inbound(&self, _text: &str) -> SessionResult<InboundMessage> {
        Ok(InboundMessage::Control)
    }
}

#[derive(Debug)]
struct StubSpec {
    topic: String,
}

#[async_trait]
impl SubscriptionSpec for StubSpec {
    fn topic(&self) -> String {
        self.topic.clone()
    }

    fn subscribe_payload(&self) -> Value {
        json!({"topic": self.topic})
    }

    fn unsubscribe_payload(&self) -> Option<Value> {
        Some(json!({"topic": self.topic}))
    }
}

/// A subscription over a stub spec with the given topic and no callbacks.
pub(crate) fn stub_subscription(topic: &str) -> Subscription {
    Subscription::new(Arc::new(StubSpec {
        topic: topic.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use ustr::Ustr;

    use super::*;

    #[rstest]
    fn test_null_adapter_control_message_shape() {
        let adapter = NullAdapter;
        let message = adapter
            .control_message(ControlOp::Subscribe, &[json!({"topic": "trades:BTC"})])
            .unwrap();

        let value: Value = serde_json::from_str(&message).unwrap();
        assert_eq!(value["op"], "subscribe");
        assert_eq!(value["args"].as_array().unwrap().len(), 1);
    }

    #[rstest]
    fn test_stub_subscription_topic() {
        let subscription = stub_subscription("trades:BTC");

        assert_eq!(subscription.topic(), Ustr::from("trades:BTC"));
    }
}
