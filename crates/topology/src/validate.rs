//! Spec validation.
//!
//! Runs before any resource is derived. Validation is first-fail: the first
//! violated rule aborts with its error and later checks are skipped, in a
//! fixed order (placement exclusivity, control-plane peers, worker peers).

use thiserror::Error;

use crate::spec::{ClusterSpec, InstanceRoleSpec, NodeRole, PeerType};

/// A contradictory or incomplete cluster spec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Both an explicit subnet list and a subnet-type selector were given.
    #[error(
        "attributes `subnets` and `subnet_type` are mutually exclusive; \
         remove one of them from the cluster spec"
    )]
    MutuallyExclusivePlacement,

    /// An ingress rule declared a security-group peer without a peer id.
    #[error(
        "attribute `peer` is mandatory for an ingress rule when `peer_type` \
         is `security_group` for the {role} node"
    )]
    MissingPeerReference {
        /// Role whose rule list contains the offending entry.
        role: NodeRole,
    },
}

/// Validate a cluster spec.
///
/// # Errors
///
/// Returns the first violated rule; the spec must be fixed and resubmitted.
pub fn validate(spec: &ClusterSpec) -> Result<(), ValidationError> {
    if !spec.subnets.is_empty() && spec.subnet_type.is_some() {
        return Err(ValidationError::MutuallyExclusivePlacement);
    }
    validate_peers(NodeRole::ControlPlane, &spec.control_plane)?;
    validate_peers(NodeRole::Worker, &spec.worker)?;
    Ok(())
}

fn validate_peers(role: NodeRole, role_spec: &InstanceRoleSpec) -> Result<(), ValidationError> {
    for rule in &role_spec.ingress_rules {
        if rule.peer_type == PeerType::SecurityGroup && rule.peer.is_none() {
            return Err(ValidationError::MissingPeerReference { role });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{IngressRuleSpec, PortRange, SubnetRef, SubnetType};

    #[test]
    fn test_valid_default_spec() {
        assert!(validate(&ClusterSpec::new("vpc-1")).is_ok());
    }

    #[test]
    fn test_mutually_exclusive_placement() {
        let mut spec = ClusterSpec::new("vpc-1");
        spec.subnet_type = Some(SubnetType::PrivateWithEgress);
        spec.subnets = vec![SubnetRef {
            subnet_id: "subnet-123456".to_string(),
            availability_zone: Some("ap-south-2a".to_string()),
        }];

        assert_eq!(
            validate(&spec),
            Err(ValidationError::MutuallyExclusivePlacement)
        );
    }

    #[test]
    fn test_missing_peer_reference_names_role() {
        let mut spec = ClusterSpec::new("vpc-1");
        spec.worker.ingress_rules.push(IngressRuleSpec {
            port: PortRange::single(443),
            peer_type: PeerType::SecurityGroup,
            peer: None,
        });

        assert_eq!(
            validate(&spec),
            Err(ValidationError::MissingPeerReference {
                role: NodeRole::Worker
            })
        );
    }

    #[test]
    fn test_placement_checked_before_peers() {
        let mut spec = ClusterSpec::new("vpc-1");
        spec.subnet_type = Some(SubnetType::Public);
        spec.subnets = vec![SubnetRef {
            subnet_id: "subnet-1".to_string(),
            availability_zone: None,
        }];
        spec.control_plane.ingress_rules.push(IngressRuleSpec {
            port: PortRange::single(443),
            peer_type: PeerType::SecurityGroup,
            peer: None,
        });

        // Placement exclusivity wins even though a peer rule is also broken.
        assert_eq!(
            validate(&spec),
            Err(ValidationError::MutuallyExclusivePlacement)
        );
    }

    #[test]
    fn test_peer_present_is_accepted() {
        let mut spec = ClusterSpec::new("vpc-1");
        spec.control_plane.ingress_rules.push(IngressRuleSpec {
            port: PortRange::single(8080),
            peer_type: PeerType::SecurityGroup,
            peer: Some("sg-1234567890abcdef0".to_string()),
        });
        assert!(validate(&spec).is_ok());
    }
}
