//! Resource graph produced by one topology build.
//!
//! Descriptors carry deterministic logical ids ([`ResourceId`]); the
//! provider-assigned identifiers do not exist until the backend realizes the
//! graph. Anything that needs a not-yet-assigned identifier (join commands,
//! outputs) holds an attribute-reference token of the form
//! `${<logical-id>.<attr>}` which the backend substitutes after creation.
//! Creation ordering is expressed as dependency edges, never as in-process
//! waiting.

use serde::{Deserialize, Serialize};

use crate::network::ResolvedIngressRule;
use crate::spec::{NodeRole, SubnetType, VolumeType};

/// Deterministic logical identifier of a resource within one graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Build an id from a resource kind and name, e.g.
    /// `instance/k8s-worker-1`.
    #[must_use]
    pub fn new(kind: &str, name: &str) -> Self {
        Self(format!("{kind}/{name}"))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An attribute-reference token resolved by the backend once the
    /// provider identifier is known.
    #[must_use]
    pub fn attr(&self, attr: &str) -> String {
        format!("${{{}.{attr}}}", self.0)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A role security group to be created in the spec's VPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupDescriptor {
    /// Logical id.
    pub id: ResourceId,
    /// Group name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// VPC the group belongs to.
    pub vpc_id: String,
    /// Ordered inbound rules.
    pub ingress: Vec<ResolvedIngressRule>,
}

/// One statement of an inline policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyStatement {
    /// Statement id.
    pub sid: String,
    /// Allowed actions.
    pub actions: Vec<String>,
    /// Resources the actions apply to.
    pub resources: Vec<String>,
}

/// Where the shared instance role comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    /// Allocate a fresh role with the given name.
    Create {
        /// Role name.
        name: String,
    },
    /// Extend an existing externally-owned role.
    External {
        /// Role ARN supplied in the spec.
        arn: String,
    },
}

/// The shared IAM role every instance in the cluster assumes. The role is
/// shared; instance profiles wrapping it are not (one per instance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleResolution {
    /// Logical id.
    pub id: ResourceId,
    /// Fresh role or external reference. Policies below are attached either
    /// way.
    pub source: RoleSource,
    /// Managed policy names to attach.
    pub managed_policies: Vec<String>,
    /// Inline policy statements to attach.
    pub inline_statements: Vec<PolicyStatement>,
}

/// A freshly allocated instance profile wrapping the shared role. Profile
/// attachment is per-instance in the target provisioning model, so profiles
/// are never shared even when the role is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceProfile {
    /// Logical id.
    pub id: ResourceId,
    /// Profile name.
    pub name: String,
    /// The shared role this profile wraps.
    pub role: ResourceId,
}

/// Machine image selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineImage {
    /// Image id read from an SSM parameter.
    SsmParameter(String),
    /// Default Ubuntu image lookup by the backend.
    UbuntuLookup,
}

/// Where an instance lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Exactly the explicitly listed subnets.
    Subnets {
        /// Subnet ids from the spec.
        subnet_ids: Vec<String>,
    },
    /// A selector resolved against the VPC's subnets.
    SubnetType {
        /// Requested (or defaulted) subnet type.
        subnet_type: SubnetType,
        /// Matching subnet ids reported by the backend.
        subnet_ids: Vec<String>,
    },
}

/// A fully resolved block device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVolume {
    /// Device name; unique per instance.
    pub device_name: String,
    /// Size in GiB.
    pub size_gib: u32,
    /// Volume class.
    pub volume_type: VolumeType,
    /// Destroyed with the instance when true.
    pub delete_on_termination: bool,
}

/// The fully resolved shape of one compute instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    /// Logical id.
    pub id: ResourceId,
    /// Composed instance name.
    pub name: String,
    /// Node role.
    pub role: NodeRole,
    /// Instance class, e.g. `t4g`.
    pub instance_class: String,
    /// Instance size, e.g. `medium`.
    pub instance_size: String,
    /// Machine image selection.
    pub image: MachineImage,
    /// Subnet placement.
    pub placement: Placement,
    /// The role security group attached to this instance.
    pub security_group: ResourceId,
    /// Per-instance profile wrapping the shared role.
    pub profile: InstanceProfile,
    /// Key pair, when direct access is wanted.
    pub key_pair_name: Option<String>,
    /// Primary volume first, then secondaries in declaration order.
    pub volumes: Vec<ResolvedVolume>,
    /// Ordered boot commands.
    pub user_data: Vec<String>,
    /// Instances always require IMDSv2.
    pub require_imdsv2: bool,
}

/// `before` must be realized before `after`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Resource created first.
    pub before: ResourceId,
    /// Resource created after.
    pub after: ResourceId,
}

/// A named value published from the resolved graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Output key.
    pub key: String,
    /// Attribute-reference token.
    pub value: String,
}

/// Everything one build produces. Created fresh per build; the builder keeps
/// no state between builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGraph {
    /// Effective cluster name.
    pub cluster_name: String,
    /// Control-plane security group.
    pub control_plane_sg: SecurityGroupDescriptor,
    /// Worker security group.
    pub worker_sg: SecurityGroupDescriptor,
    /// Shared instance role.
    pub role: RoleResolution,
    /// Worker descriptors in replica order.
    pub workers: Vec<InstanceDescriptor>,
    /// Control-plane descriptor.
    pub control_plane: InstanceDescriptor,
    /// Creation-order constraints.
    pub edges: Vec<DependencyEdge>,
    /// Published outputs.
    pub outputs: Vec<Output>,
}

impl ResourceGraph {
    /// All instance descriptors, workers first.
    pub fn instances(&self) -> impl Iterator<Item = &InstanceDescriptor> {
        self.workers.iter().chain(std::iter::once(&self.control_plane))
    }

    /// Whether the graph orders `before` ahead of `after`.
    #[must_use]
    pub fn depends_on(&self, before: &ResourceId, after: &ResourceId) -> bool {
        self.edges
            .iter()
            .any(|e| &e.before == before && &e.after == after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_attr_token() {
        let id = ResourceId::new("instance", "k8s-worker-1");
        assert_eq!(id.as_str(), "instance/k8s-worker-1");
        assert_eq!(id.attr("instance_id"), "${instance/k8s-worker-1.instance_id}");
    }

    #[test]
    fn test_resource_id_is_deterministic() {
        assert_eq!(
            ResourceId::new("security-group", "ctrl-plane"),
            ResourceId::new("security-group", "ctrl-plane")
        );
    }
}
