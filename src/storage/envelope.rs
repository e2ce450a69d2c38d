use crate::constants::STORAGE_SCHEMA_VERSION;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Versioned wrapper around every stored value.
///
/// Makes format evolution and optional compression/encryption detectable and
/// reversible on read. This engine writes neither compressed nor encrypted
/// payloads, so envelopes flagged as such are treated as unreadable rather
/// than misinterpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub data: serde_json::Value,
    /// Milliseconds since the Unix epoch at write time
    pub timestamp: u64,
    pub version: u32,
    #[serde(default)]
    pub compressed: bool,
    #[serde(default)]
    pub encrypted: bool,
}

impl Envelope {
    pub fn wrap(data: serde_json::Value) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            data,
            timestamp,
            version: STORAGE_SCHEMA_VERSION,
            compressed: false,
            encrypted: false,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode stored text back into the payload value. Returns None for
    /// unparseable, future-versioned, or transformed envelopes.
    pub fn decode(text: &str) -> Option<serde_json::Value> {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("discarding unparseable storage envelope: {err}");
                return None;
            }
        };
        if envelope.version > STORAGE_SCHEMA_VERSION {
            warn!(
                "discarding envelope from future schema version {}",
                envelope.version
            );
            return None;
        }
        if envelope.compressed || envelope.encrypted {
            warn!("discarding envelope with unsupported transform flags");
            return None;
        }
        Some(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roundtrip() {
        let value = json!({"max_visible": 5, "position": "TopRight"});
        let text = Envelope::wrap(value.clone()).encode().unwrap();
        assert_eq!(Envelope::decode(&text), Some(value));
    }

    #[test]
    fn test_timestamp_is_set() {
        let envelope = Envelope::wrap(json!(1));
        assert!(envelope.timestamp > 0);
        assert_eq!(envelope.version, STORAGE_SCHEMA_VERSION);
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(Envelope::decode("not json"), None);
        assert_eq!(Envelope::decode("{\"data\": 1}"), None);
    }

    #[test]
    fn test_future_version_rejected() {
        let mut envelope = Envelope::wrap(json!(1));
        envelope.version = STORAGE_SCHEMA_VERSION + 1;
        let text = envelope.encode().unwrap();
        assert_eq!(Envelope::decode(&text), None);
    }

    #[test]
    fn test_transformed_envelope_rejected() {
        let mut envelope = Envelope::wrap(json!(1));
        envelope.compressed = true;
        let text = envelope.encode().unwrap();
        assert_eq!(Envelope::decode(&text), None);
    }

    #[test]
    fn test_missing_flags_default_to_false() {
        let text = format!(
            "{{\"data\": 7, \"timestamp\": 1, \"version\": {STORAGE_SCHEMA_VERSION}}}"
        );
        assert_eq!(Envelope::decode(&text), Some(json!(7)));
    }
}
