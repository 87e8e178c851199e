//! Webhook plugin contract.
//!
//! Extends [`Plugin`] with inbound-event handling: HMAC-SHA256 signature
//! verification (constant-time compare) and event processing keyed by
//! event type. [`SignedEventPlugin`] is the shipped implementation; it
//! verifies, then records the event in the execution's memory store.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::{json, Map, Value};
use sha2::Sha256;
use tracing::warn;

use crate::engine::result::ErrorKind;
use crate::engine::ExecutionContext;
use crate::store::StoredEntry;

use super::{Plugin, PluginResult};

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex HMAC-SHA256 signature of a payload
pub fn sign_payload(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex signature against the payload (constant-time)
pub fn verify_signature(secret: &[u8], payload: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Plugins that accept signed external events
#[async_trait]
pub trait WebhookPlugin: Plugin {
    /// Verify the payload signature
    fn verify_signature(&self, payload: &[u8], signature_hex: &str) -> bool;

    /// Handle one verified event
    async fn process_event(
        &self,
        context: &ExecutionContext,
        event_type: &str,
        payload: &Value,
    ) -> PluginResult;

    /// Event types this plugin handles
    fn supported_events(&self) -> Vec<String>;
}

// ============================================================================
// SHIPPED IMPLEMENTATION
// ============================================================================

/// Webhook plugin that verifies HMAC-signed events and records them in
/// the run's memory store under `webhook/<event_type>`.
pub struct SignedEventPlugin {
    id: String,
    secret: Vec<u8>,
    events: Vec<String>,
}

impl SignedEventPlugin {
    pub fn new<I, S>(secret: impl Into<Vec<u8>>, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: "pl_webhook".to_string(),
            secret: secret.into(),
            events: events.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Plugin for SignedEventPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "signed-webhook"
    }

    /// Params: `{ "event": "<type>", "payload": {...}, "signature": "<hex>" }`
    async fn execute(
        &self,
        context: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> PluginResult {
        let event_type = params
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let payload = params.get("payload").cloned().unwrap_or(Value::Null);
        let signature = params
            .get("signature")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if !self.events.iter().any(|e| e == event_type) {
            return PluginResult::failure(
                &self.id,
                ErrorKind::Validation,
                format!("unsupported event '{}'", event_type),
            );
        }
        let raw = payload.to_string();
        if !WebhookPlugin::verify_signature(self, raw.as_bytes(), signature) {
            warn!(event_type, "webhook signature rejected");
            return PluginResult::failure(&self.id, ErrorKind::Auth, "signature mismatch");
        }
        self.process_event(context, event_type, &payload).await
    }

    fn supported_actions(&self) -> Vec<String> {
        vec!["webhook_receive".to_string()]
    }
}

#[async_trait]
impl WebhookPlugin for SignedEventPlugin {
    fn verify_signature(&self, payload: &[u8], signature_hex: &str) -> bool {
        verify_signature(&self.secret, payload, signature_hex)
    }

    async fn process_event(
        &self,
        context: &ExecutionContext,
        event_type: &str,
        payload: &Value,
    ) -> PluginResult {
        context.store().put(
            &format!("webhook/{}", event_type),
            StoredEntry::new(StoredEntry::EVENT, payload.clone()),
        );
        PluginResult::success(
            &self.id,
            Some(json!({ "event": event_type, "accepted": true })),
        )
    }

    fn supported_events(&self) -> Vec<String> {
        self.events.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_round_trip() {
        let secret = b"s3cret";
        let payload = br#"{"n":1}"#;
        let signature = sign_payload(secret, payload);
        assert!(verify_signature(secret, payload, &signature));
        assert!(!verify_signature(secret, b"tampered", &signature));
        assert!(!verify_signature(b"wrong", payload, &signature));
        assert!(!verify_signature(secret, payload, "not-hex"));
    }

    #[tokio::test]
    async fn verified_event_lands_in_the_store() {
        let plugin = SignedEventPlugin::new(*b"k1", ["push"]);
        let ctx = ExecutionContext::new();
        let payload = json!({ "ref": "main" });
        let signature = sign_payload(b"k1", payload.to_string().as_bytes());

        let mut params = Map::new();
        params.insert("event".into(), json!("push"));
        params.insert("payload".into(), payload);
        params.insert("signature".into(), json!(signature));

        let result = plugin.execute(&ctx, &params).await;
        assert!(result.is_success());
        assert!(ctx.store().has("webhook/push"));
    }

    #[tokio::test]
    async fn bad_signature_is_an_auth_failure() {
        let plugin = SignedEventPlugin::new(*b"k1", ["push"]);
        let ctx = ExecutionContext::new();
        let mut params = Map::new();
        params.insert("event".into(), json!("push"));
        params.insert("payload".into(), json!({ "ref": "main" }));
        params.insert("signature".into(), json!("deadbeef"));

        let result = plugin.execute(&ctx, &params).await;
        assert_eq!(result.error_category, Some(ErrorKind::Auth));
        assert!(!ctx.store().has("webhook/push"));
    }

    #[tokio::test]
    async fn unsupported_event_is_rejected() {
        let plugin = SignedEventPlugin::new(*b"k1", ["push"]);
        let ctx = ExecutionContext::new();
        let mut params = Map::new();
        params.insert("event".into(), json!("delete"));
        let result = plugin.execute(&ctx, &params).await;
        assert_eq!(result.error_category, Some(ErrorKind::Validation));
        assert_eq!(plugin.supported_events(), vec!["push"]);
    }
}
