//! Build-and-seal in one step
//!
//! The envelope is never handed back in plaintext form, so there is no
//! window where an unsealed copy exists outside the caller's control.

use super::{Envelope, EnvelopeCipher};
use crate::error::Result;
use crate::routing::{DirectRouter, RouteResolver};
use serde::Serialize;
use tracing::debug;

/// Inputs for [`EnvelopeCipher::create_secure_encrypted`]
#[derive(Debug, Clone)]
pub struct SealRequest<P> {
    /// Event to protect
    pub payload: P,
    /// Destination address, resolved through a [`RouteResolver`]
    pub destination: String,
    /// Sending node
    pub source_node_id: String,
    /// Roles for the authorization layer
    pub authorized_roles: Vec<String>,
    /// Pre-computed content hash of the plaintext envelope, if any
    pub content_hash: Option<String>,
}

impl<P> SealRequest<P> {
    pub fn new(
        payload: P,
        destination: impl Into<String>,
        source_node_id: impl Into<String>,
    ) -> Self {
        SealRequest {
            payload,
            destination: destination.into(),
            source_node_id: source_node_id.into(),
            authorized_roles: Vec::new(),
            content_hash: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorized_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_content_hash(mut self, content_hash: impl Into<String>) -> Self {
        self.content_hash = Some(content_hash.into());
        self
    }
}

impl EnvelopeCipher {
    /// Resolve the route, build the envelope and seal it
    pub fn create_secure_encrypted<P, R>(
        &self,
        resolver: &R,
        request: SealRequest<P>,
        passphrase: impl AsRef<[u8]>,
    ) -> Result<Envelope<P>>
    where
        P: Serialize,
        R: RouteResolver + ?Sized,
    {
        let route = resolver.resolve(&request.destination)?;

        let mut builder = Envelope::builder(request.payload)
            .source_node(request.source_node_id)
            .route(route)
            .authorized_roles(request.authorized_roles);
        if let Some(hash) = request.content_hash {
            builder = builder.content_hash(hash);
        }

        let mut envelope = builder.build()?;
        self.seal(&mut envelope, passphrase)?;

        debug!(
            envelope_id = %envelope.envelope_id(),
            destination = %envelope.destination(),
            "Created sealed envelope"
        );
        Ok(envelope)
    }
}

/// Build and seal an envelope with the default cipher and a direct route
pub fn create_secure_encrypted<P: Serialize>(
    payload: P,
    destination: &str,
    source_node_id: &str,
    passphrase: impl AsRef<[u8]>,
    authorized_roles: Vec<String>,
    content_hash: Option<String>,
) -> Result<Envelope<P>> {
    let mut request = SealRequest::new(payload, destination, source_node_id)
        .with_roles(authorized_roles);
    request.content_hash = content_hash;

    EnvelopeCipher::default().create_secure_encrypted(&DirectRouter, request, passphrase)
}
