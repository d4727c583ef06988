//! Envelopes: one message in flight between nodes
//!
//! An envelope starts out holding a plaintext payload and may be sealed
//! exactly once. Sealing replaces the payload with a base64 ciphertext and
//! [`EncryptionMetadata`]; opening never mutates the envelope.
//!
//! Identity fields (`envelope_id`, `source_node_id`, `envelope_timestamp`)
//! have no setters. An envelope read back from the wire can still carry
//! altered identity or relocated ciphertext, which is what the associated
//! data check in [`EnvelopeCipher::decrypt`] catches.

pub mod aad;
mod factory;
mod metadata;
mod protocol;
pub mod wire;

pub use factory::{create_secure_encrypted, SealRequest};
pub use metadata::{Algorithm, EncryptionMetadata};
pub use protocol::EnvelopeCipher;
pub use wire::WireFormat;

use crate::crypto::blake3_hex;
use crate::error::{Error, Result};
use crate::routing::RouteSpec;
use aad::{build_aad, canonical_timestamp, put_field};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

const CONTENT_LABEL: &[u8] = b"nodeseal-content-v1";

/// Canonical byte form of a payload
pub(crate) fn canonical_bytes<P: Serialize>(payload: &P) -> Result<Vec<u8>> {
    serde_json::to_vec(payload)
        .map_err(|e| Error::Serialization(format!("Failed to serialize payload: {}", e)))
}

/// Inverse of [`canonical_bytes`]
pub(crate) fn from_canonical_bytes<P: DeserializeOwned>(bytes: &[u8]) -> Result<P> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::Deserialization(format!("Failed to deserialize payload: {}", e)))
}

/// Read a present `payload` field as `Some`, even when it holds `null`
///
/// A missing field stays `None` through `#[serde(default)]`.
fn deserialize_present<'de, D, P>(deserializer: D) -> std::result::Result<Option<P>, D::Error>
where
    D: Deserializer<'de>,
    P: Deserialize<'de>,
{
    P::deserialize(deserializer).map(Some)
}

/// A message in flight between nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "P: Deserialize<'de>"))]
pub struct Envelope<P> {
    envelope_id: Uuid,
    source_node_id: String,
    envelope_timestamp: DateTime<Utc>,
    route_spec: RouteSpec,
    content_hash: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    authorized_roles: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present",
        bound(deserialize = "P: Deserialize<'de>")
    )]
    payload: Option<P>,
    #[serde(default)]
    is_encrypted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    encrypted_payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encryption_metadata: Option<EncryptionMetadata>,
}

impl<P> Envelope<P> {
    /// Create a plaintext envelope with a fresh id and timestamp
    pub fn new(
        payload: P,
        route_spec: RouteSpec,
        source_node_id: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        Envelope {
            envelope_id: Uuid::new_v4(),
            source_node_id: source_node_id.into(),
            envelope_timestamp: Utc::now(),
            route_spec,
            content_hash: content_hash.into(),
            authorized_roles: Vec::new(),
            payload: Some(payload),
            is_encrypted: false,
            encrypted_payload: None,
            encryption_metadata: None,
        }
    }

    /// Start building a plaintext envelope around `payload`
    pub fn builder(payload: P) -> EnvelopeBuilder<P> {
        EnvelopeBuilder::new(payload)
    }

    pub fn envelope_id(&self) -> Uuid {
        self.envelope_id
    }

    pub fn source_node_id(&self) -> &str {
        &self.source_node_id
    }

    pub fn envelope_timestamp(&self) -> DateTime<Utc> {
        self.envelope_timestamp
    }

    pub fn route_spec(&self) -> &RouteSpec {
        &self.route_spec
    }

    /// Final destination from the route descriptor
    pub fn destination(&self) -> &str {
        &self.route_spec.final_destination
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Roles for the authorization layer; not enforced here
    pub fn authorized_roles(&self) -> &[String] {
        &self.authorized_roles
    }

    /// Plaintext payload, `None` once the envelope is sealed
    pub fn payload(&self) -> Option<&P> {
        if self.is_encrypted {
            None
        } else {
            self.payload.as_ref()
        }
    }

    /// Consume the envelope, returning the plaintext payload if unsealed
    pub fn into_payload(self) -> Option<P> {
        if self.is_encrypted {
            None
        } else {
            self.payload
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }

    /// Base64 ciphertext, present once sealed
    pub fn encrypted_payload(&self) -> Option<&str> {
        self.encrypted_payload.as_deref()
    }

    pub fn encryption_metadata(&self) -> Option<&EncryptionMetadata> {
        self.encryption_metadata.as_ref()
    }

    /// Associated data for this envelope's current identity
    pub fn associated_data(&self) -> Vec<u8> {
        build_aad(
            &self.envelope_id,
            &self.source_node_id,
            &self.envelope_timestamp,
        )
    }

    /// Identity, route and roles, length-prefixed
    fn header_material(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(CONTENT_LABEL);
        put_field(&mut buf, self.envelope_id.hyphenated().to_string().as_bytes());
        put_field(&mut buf, self.source_node_id.as_bytes());
        put_field(
            &mut buf,
            canonical_timestamp(&self.envelope_timestamp).as_bytes(),
        );
        put_field(&mut buf, self.route_spec.route_type.as_str().as_bytes());
        put_field(&mut buf, self.route_spec.final_destination.as_bytes());
        buf.extend_from_slice(&(self.route_spec.hops.len() as u32).to_be_bytes());
        for hop in &self.route_spec.hops {
            put_field(&mut buf, hop.as_bytes());
        }
        buf.extend_from_slice(&(self.authorized_roles.len() as u32).to_be_bytes());
        for role in &self.authorized_roles {
            put_field(&mut buf, role.as_bytes());
        }
        buf
    }

    /// Content hash of a sealed envelope (ciphertext and metadata)
    fn sealed_content_hash(&self) -> Option<String> {
        let ciphertext = self.encrypted_payload.as_ref()?;
        let meta = self.encryption_metadata.as_ref()?;

        let mut buf = self.header_material();
        put_field(&mut buf, b"sealed");
        put_field(&mut buf, ciphertext.as_bytes());
        put_field(&mut buf, meta.algorithm.as_str().as_bytes());
        put_field(&mut buf, meta.key_id.as_bytes());
        put_field(&mut buf, meta.iv.as_bytes());
        put_field(&mut buf, meta.auth_tag.as_bytes());
        put_field(&mut buf, meta.aad_hash.as_bytes());
        Some(blake3_hex(&buf))
    }
}

impl<P: Serialize> Envelope<P> {
    /// Recompute the content hash from the envelope's current state
    ///
    /// Plaintext envelopes hash the canonical payload bytes; sealed ones
    /// hash the ciphertext and metadata, so the two states never collide.
    pub fn compute_content_hash(&self) -> Result<String> {
        if self.is_encrypted {
            return self.sealed_content_hash().ok_or_else(|| {
                Error::Validation(format!(
                    "Envelope {} is marked encrypted but ciphertext or metadata is missing",
                    self.envelope_id
                ))
            });
        }

        let payload = self.payload.as_ref().ok_or_else(|| {
            Error::Validation(format!(
                "Envelope {} has no plaintext payload",
                self.envelope_id
            ))
        })?;

        let mut buf = self.header_material();
        put_field(&mut buf, b"plain");
        put_field(&mut buf, &canonical_bytes(payload)?);
        Ok(blake3_hex(&buf))
    }

    /// Replace the roles carried for the authorization layer
    ///
    /// Roles are covered by the content hash, so it is recomputed. They are
    /// not part of the associated data and a sealed envelope still opens.
    pub fn with_authorized_roles<I, S>(mut self, roles: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorized_roles = roles.into_iter().map(Into::into).collect();
        self.content_hash = self.compute_content_hash()?;
        Ok(self)
    }

    /// Check the stored content hash against the current state
    pub fn verify_content_hash(&self) -> Result<bool> {
        Ok(self.compute_content_hash()? == self.content_hash)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        WireFormat::Json.encode(self)
    }

    /// Serialize as YAML
    pub fn to_yaml(&self) -> Result<String> {
        WireFormat::Yaml.encode(self)
    }
}

impl<P: DeserializeOwned> Envelope<P> {
    /// Parse an envelope from JSON
    pub fn from_json(input: &str) -> Result<Self> {
        WireFormat::Json.decode(input)
    }

    /// Parse an envelope from YAML
    pub fn from_yaml(input: &str) -> Result<Self> {
        WireFormat::Yaml.decode(input)
    }
}

/// Builder for plaintext envelopes
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder<P> {
    payload: P,
    source_node_id: Option<String>,
    route_spec: Option<RouteSpec>,
    authorized_roles: Vec<String>,
    content_hash: Option<String>,
}

impl<P> EnvelopeBuilder<P> {
    fn new(payload: P) -> Self {
        EnvelopeBuilder {
            payload,
            source_node_id: None,
            route_spec: None,
            authorized_roles: Vec::new(),
            content_hash: None,
        }
    }

    /// Sending node
    pub fn source_node(mut self, source_node_id: impl Into<String>) -> Self {
        self.source_node_id = Some(source_node_id.into());
        self
    }

    /// Resolved route
    pub fn route(mut self, route_spec: RouteSpec) -> Self {
        self.route_spec = Some(route_spec);
        self
    }

    /// Roles carried for the authorization layer
    pub fn authorized_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorized_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Use a caller-supplied content hash instead of computing one
    pub fn content_hash(mut self, content_hash: impl Into<String>) -> Self {
        self.content_hash = Some(content_hash.into());
        self
    }
}

impl<P: Serialize> EnvelopeBuilder<P> {
    /// Build the envelope, computing the content hash when none was given
    pub fn build(self) -> Result<Envelope<P>> {
        let source_node_id = self
            .source_node_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Validation("Envelope requires a source node id".to_string()))?;
        let route_spec = self
            .route_spec
            .ok_or_else(|| Error::Validation("Envelope requires a route".to_string()))?;

        let mut envelope = Envelope::new(self.payload, route_spec, source_node_id, String::new());
        envelope.authorized_roles = self.authorized_roles;
        envelope.content_hash = match self.content_hash {
            Some(hash) => hash,
            None => envelope.compute_content_hash()?,
        };
        Ok(envelope)
    }
}
