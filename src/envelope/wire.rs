//! Transport encodings for envelopes

use super::Envelope;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Text format an envelope is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    #[default]
    Json,
    Yaml,
}

impl WireFormat {
    /// Pick a format from a file extension, JSON unless `.yaml` / `.yml`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => WireFormat::Yaml,
            _ => WireFormat::Json,
        }
    }

    pub fn encode<P: Serialize>(&self, envelope: &Envelope<P>) -> Result<String> {
        Ok(match self {
            WireFormat::Json => serde_json::to_string_pretty(envelope)?,
            WireFormat::Yaml => serde_yaml::to_string(envelope)?,
        })
    }

    pub fn decode<P: DeserializeOwned>(&self, input: &str) -> Result<Envelope<P>> {
        Ok(match self {
            WireFormat::Json => serde_json::from_str(input)?,
            WireFormat::Yaml => serde_yaml::from_str(input)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeCipher;
    use crate::routing::RouteSpec;

    fn sealed() -> Envelope<serde_json::Value> {
        let mut env = Envelope::builder(serde_json::json!({"event_type": "core.node.stop"}))
            .source_node("node-a")
            .route(RouteSpec::direct("node://b"))
            .authorized_roles(["operator"])
            .build()
            .unwrap();
        EnvelopeCipher::with_iterations(1_000)
            .seal(&mut env, "pw")
            .unwrap();
        env
    }

    #[test]
    fn test_from_path() {
        assert_eq!(WireFormat::from_path("e.yaml"), WireFormat::Yaml);
        assert_eq!(WireFormat::from_path("e.yml"), WireFormat::Yaml);
        assert_eq!(WireFormat::from_path("e.json"), WireFormat::Json);
        assert_eq!(WireFormat::from_path("envelope"), WireFormat::Json);
    }

    #[test]
    fn test_sealed_json_has_no_plaintext() {
        let env = sealed();
        let json = env.to_json().unwrap();

        assert!(!json.contains("core.node.stop"));
        assert!(json.contains("\"is_encrypted\": true"));
        assert!(json.contains("\"algorithm\": \"AES-256-GCM\""));
    }

    #[test]
    fn test_yaml_transport_preserves_decryptability() {
        let env = sealed();
        let yaml = env.to_yaml().unwrap();
        let back: Envelope<serde_json::Value> = Envelope::from_yaml(&yaml).unwrap();

        assert_eq!(back.envelope_id(), env.envelope_id());
        assert_eq!(back.envelope_timestamp(), env.envelope_timestamp());
        assert_eq!(back.content_hash(), env.content_hash());

        let payload = EnvelopeCipher::with_iterations(1_000)
            .decrypt(&back, "pw")
            .unwrap();
        assert_eq!(payload["event_type"], "core.node.stop");
    }

    #[test]
    fn test_garbage_rejected() {
        let result: Result<Envelope<serde_json::Value>> = WireFormat::Json.decode("{not json");
        assert!(result.is_err());
    }
}
