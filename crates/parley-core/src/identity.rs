//! Principal identifiers and credentials
//!
//! A session authenticates as a full identity (`user@domain/resource`). Routing
//! and collaborator notifications mostly use the bare form (`user@domain`).

use crate::errors::BrokerError;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Bare Identity
// ----------------------------------------------------------------------------

/// Identity without a resource part (`user@domain` or `domain`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BareJid {
    node: Option<String>,
    domain: String,
}

impl BareJid {
    /// Create a bare identity from its parts
    pub fn new(node: Option<&str>, domain: &str) -> Result<Self, BrokerError> {
        if domain.is_empty() {
            return Err(BrokerError::identity_error("domain part is empty"));
        }
        if let Some(node) = node {
            if node.is_empty() {
                return Err(BrokerError::identity_error("local part is empty"));
            }
        }

        Ok(Self {
            node: node.map(str::to_string),
            domain: domain.to_ascii_lowercase(),
        })
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Attach a resource, producing a full identity
    pub fn with_resource(&self, resource: &str) -> Result<FullJid, BrokerError> {
        if resource.is_empty() {
            return Err(BrokerError::identity_error("resource part is empty"));
        }
        Ok(FullJid {
            bare: self.clone(),
            resource: resource.to_string(),
        })
    }
}

impl fmt::Display for BareJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "{}@{}", node, self.domain),
            None => write!(f, "{}", self.domain),
        }
    }
}

impl FromStr for BareJid {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('/') {
            return Err(BrokerError::identity_error(format!(
                "bare identity must not carry a resource: {}",
                s
            )));
        }
        match s.split_once('@') {
            Some((node, domain)) => BareJid::new(Some(node), domain),
            None => BareJid::new(None, s),
        }
    }
}

// ----------------------------------------------------------------------------
// Full Identity
// ----------------------------------------------------------------------------

/// Identity including the resource part (`user@domain/resource`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FullJid {
    bare: BareJid,
    resource: String,
}

impl FullJid {
    pub fn bare(&self) -> &BareJid {
        &self.bare
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn into_bare(self) -> BareJid {
        self.bare
    }
}

impl fmt::Display for FullJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bare, self.resource)
    }
}

impl FromStr for FullJid {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Resource may itself contain '/' or '@', so split on the first '/' only
        let (bare, resource) = s.split_once('/').ok_or_else(|| {
            BrokerError::identity_error(format!("full identity requires a resource: {}", s))
        })?;

        bare.parse::<BareJid>()?.with_resource(resource)
    }
}

// ----------------------------------------------------------------------------
// Credential
// ----------------------------------------------------------------------------

/// Opaque secret used to authenticate a session
///
/// Never serialized and redacted from `Debug` output so it cannot leak through
/// logs or snapshots.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new<T: Into<String>>(secret: T) -> Self {
        Self(secret.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Expose the secret to a transport performing authentication
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<&str> for Credential {
    fn from(secret: &str) -> Self {
        Self::new(secret)
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Self::new(secret)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
