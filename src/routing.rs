//! Route descriptors and the resolver seam
//!
//! Routing proper lives outside this crate. The envelope only needs a
//! resolved [`RouteSpec`] to carry, so resolution is a trait with a direct
//! implementation for point-to-point delivery.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// How an envelope travels to its destination
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    /// Delivered straight to the final destination
    Direct,
    /// Forwarded through intermediate hops
    Relayed,
}

impl RouteType {
    /// Wire name of the route type
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Direct => "direct",
            RouteType::Relayed => "relayed",
        }
    }
}

/// Resolved routing descriptor carried by an envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteSpec {
    /// Route variant
    pub route_type: RouteType,
    /// Address of the node that should finally receive the envelope
    pub final_destination: String,
    /// Intermediate hops, empty for direct routes
    #[serde(default)]
    pub hops: Vec<String>,
}

impl RouteSpec {
    /// Direct route to `destination`
    pub fn direct(destination: impl Into<String>) -> Self {
        RouteSpec {
            route_type: RouteType::Direct,
            final_destination: destination.into(),
            hops: Vec::new(),
        }
    }

    /// Relayed route through `hops` to `destination`
    pub fn relayed(destination: impl Into<String>, hops: Vec<String>) -> Self {
        RouteSpec {
            route_type: RouteType::Relayed,
            final_destination: destination.into(),
            hops,
        }
    }

    /// Check if this is a direct route
    pub fn is_direct(&self) -> bool {
        self.route_type == RouteType::Direct
    }
}

/// Resolves a destination address into a route
pub trait RouteResolver {
    /// Resolve `destination` into a route descriptor
    fn resolve(&self, destination: &str) -> Result<RouteSpec>;
}

/// Resolver producing direct routes
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectRouter;

impl RouteResolver for DirectRouter {
    fn resolve(&self, destination: &str) -> Result<RouteSpec> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(Error::Routing("Destination address is empty".to_string()));
        }
        Ok(RouteSpec::direct(destination))
    }
}
