//! Provisioning-backend boundary.
//!
//! The builder performs no I/O of its own; concrete subnet lookups are
//! delegated through [`ProvisioningBackend`] as a blocking call that either
//! returns stable facts or fails. Backend failures are opaque to the core
//! and propagate unchanged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::SubnetType;

/// Errors from the provisioning backend's own domain. The core never
/// retries these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The network identifier is unknown to the backend.
    #[error("unknown VPC: {0}")]
    UnknownVpc(String),

    /// The backend could not answer a lookup.
    #[error("backend lookup failed: {0}")]
    Lookup(String),
}

/// Externally-resolved facts about the spec's network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFacts {
    /// The VPC these facts describe.
    pub vpc_id: String,
    /// Placement used when the spec selects neither subnets nor a type.
    #[serde(default = "default_subnet_type")]
    pub default_subnet_type: SubnetType,
    /// Known subnet ids per subnet type. May be empty for a type the VPC
    /// does not have.
    #[serde(default)]
    pub subnets: HashMap<SubnetType, Vec<String>>,
}

fn default_subnet_type() -> SubnetType {
    SubnetType::Public
}

impl NetworkFacts {
    /// Facts for a VPC with no known subnets and public default placement.
    #[must_use]
    pub fn for_vpc(vpc_id: impl Into<String>) -> Self {
        Self {
            vpc_id: vpc_id.into(),
            default_subnet_type: SubnetType::Public,
            subnets: HashMap::new(),
        }
    }

    /// Register subnet ids for a subnet type.
    #[must_use]
    pub fn with_subnets(mut self, subnet_type: SubnetType, ids: Vec<String>) -> Self {
        self.subnets.insert(subnet_type, ids);
        self
    }

    /// Subnet ids matching a type; empty when unknown.
    #[must_use]
    pub fn subnet_ids(&self, subnet_type: SubnetType) -> &[String] {
        self.subnets
            .get(&subnet_type)
            .map_or(&[], Vec::as_slice)
    }
}

/// The external system that resolves network facts and later realizes the
/// resource graph in an order consistent with its dependency edges.
pub trait ProvisioningBackend {
    /// Resolve a network identifier into concrete subnet facts.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the lookup fails; the builder
    /// propagates it unchanged.
    fn resolve_network(&self, vpc_id: &str) -> Result<NetworkFacts, BackendError>;
}

/// In-memory backend answering from pre-loaded facts. Used by tests and by
/// the CLI when a facts file is supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticFacts {
    facts: NetworkFacts,
}

impl StaticFacts {
    /// Backend knowing exactly the given facts.
    #[must_use]
    pub fn new(facts: NetworkFacts) -> Self {
        Self { facts }
    }

    /// Backend knowing a VPC with no subnet detail.
    #[must_use]
    pub fn for_vpc(vpc_id: impl Into<String>) -> Self {
        Self::new(NetworkFacts::for_vpc(vpc_id))
    }
}

impl ProvisioningBackend for StaticFacts {
    fn resolve_network(&self, vpc_id: &str) -> Result<NetworkFacts, BackendError> {
        if vpc_id == self.facts.vpc_id {
            Ok(self.facts.clone())
        } else {
            Err(BackendError::UnknownVpc(vpc_id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_facts_resolution() {
        let backend = StaticFacts::new(
            NetworkFacts::for_vpc("vpc-1")
                .with_subnets(SubnetType::Public, vec!["subnet-a".to_string()]),
        );

        let facts = backend.resolve_network("vpc-1").unwrap();
        assert_eq!(facts.subnet_ids(SubnetType::Public), ["subnet-a"]);
        assert!(facts.subnet_ids(SubnetType::PrivateWithEgress).is_empty());
    }

    #[test]
    fn test_unknown_vpc() {
        let backend = StaticFacts::for_vpc("vpc-1");
        assert_eq!(
            backend.resolve_network("vpc-2"),
            Err(BackendError::UnknownVpc("vpc-2".to_string()))
        );
    }

    #[test]
    fn test_facts_yaml() {
        let yaml = r"
vpc_id: vpc-1
default_subnet_type: private_with_egress
subnets:
  public: [subnet-a, subnet-b]
";
        let facts: NetworkFacts = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(facts.default_subnet_type, SubnetType::PrivateWithEgress);
        assert_eq!(facts.subnet_ids(SubnetType::Public).len(), 2);
    }
}
