//! Cluster specification types.
//!
//! A [`ClusterSpec`] is the single input to a topology build. It is
//! constructed once per deployment request and read-only to the builder;
//! defaults are applied during resolution, not during deserialization, so a
//! round-tripped spec stays byte-identical to what the user wrote.

use serde::{Deserialize, Serialize};

/// Reserved device name for every instance's primary volume.
pub const PRIMARY_DEVICE_NAME: &str = "/dev/xvda";

/// Default volume size in GiB.
pub const DEFAULT_VOLUME_SIZE_GIB: u32 = 20;

/// Default instance class (burstable ARM tier).
pub const DEFAULT_INSTANCE_CLASS: &str = "t4g";

/// Default instance size.
pub const DEFAULT_INSTANCE_SIZE: &str = "medium";

/// Cluster name used when the spec does not provide one.
pub const DEFAULT_CLUSTER_NAME: &str = "k8s";

/// Logical category of cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Runs the Kubernetes control plane.
    ControlPlane,
    /// Runs workloads and joins the control plane on boot.
    Worker,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ControlPlane => write!(f, "control-plane"),
            Self::Worker => write!(f, "worker"),
        }
    }
}

/// Subnet placement selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetType {
    /// Routable from the internet.
    Public,
    /// Outbound access via NAT only.
    PrivateWithEgress,
    /// No internet route at all.
    PrivateIsolated,
}

/// Reference to an existing subnet, resolved externally by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRef {
    /// Subnet identifier (e.g. `subnet-0abc`).
    pub subnet_id: String,
    /// Availability zone, when the caller wants to pin one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

/// EBS volume class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    /// General-purpose SSD, third generation.
    #[default]
    Gp3,
    /// General-purpose SSD, second generation.
    Gp2,
    /// Provisioned-IOPS SSD.
    Io2,
    /// Throughput-optimized HDD.
    St1,
    /// Magnetic.
    Standard,
}

/// A secondary volume attached to an instance.
///
/// Device names must be unique per instance and must not reuse the reserved
/// primary device name [`PRIMARY_DEVICE_NAME`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Device name, e.g. `/dev/xvdb`. Mandatory.
    pub device_name: String,
    /// Size in GiB. Defaults to 20.
    #[serde(default)]
    pub size_gib: Option<u32>,
    /// Volume class. Defaults to gp3.
    #[serde(default)]
    pub volume_type: Option<VolumeType>,
    /// Whether the volume is destroyed with the instance. Defaults to true.
    #[serde(default)]
    pub delete_on_termination: Option<bool>,
}

/// Overrides for the primary volume. The device name is not configurable;
/// it is always forced to [`PRIMARY_DEVICE_NAME`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeOverride {
    /// Size in GiB. Defaults to 20.
    pub size_gib: Option<u32>,
    /// Volume class. Defaults to gp3.
    pub volume_type: Option<VolumeType>,
    /// Whether the volume is destroyed with the instance. Defaults to true.
    pub delete_on_termination: Option<bool>,
}

/// Inclusive port range. A missing upper bound means a single port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    /// Lower bound (or the only port).
    pub lower: u16,
    /// Optional inclusive upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<u16>,
}

impl PortRange {
    /// A single-port rule.
    #[must_use]
    pub const fn single(port: u16) -> Self {
        Self {
            lower: port,
            upper: None,
        }
    }

    /// An inclusive range rule.
    #[must_use]
    pub const fn range(lower: u16, upper: u16) -> Self {
        Self {
            lower,
            upper: Some(upper),
        }
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upper {
            Some(upper) => write!(f, "{}-{}", self.lower, upper),
            None => write!(f, "{}", self.lower),
        }
    }
}

/// Allowed source for an ingress rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerType {
    /// Any IPv4 address (open to the internet).
    AnyIpv4,
    /// Another security group, referenced by id in `peer`.
    SecurityGroup,
}

/// A custom inbound rule added on top of the baseline Kubernetes ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRuleSpec {
    /// Port or inclusive port range.
    pub port: PortRange,
    /// Source kind.
    pub peer_type: PeerType,
    /// Security-group id; mandatory when `peer_type` is `SecurityGroup`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
}

/// Per-role instance shape. Owned by [`ClusterSpec`], never shared across
/// roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceRoleSpec {
    /// Instance class (e.g. `t4g`, `m7g`). Defaults to the burstable ARM tier.
    pub instance_class: Option<String>,
    /// Instance size (e.g. `medium`, `large`). Defaults to `medium`.
    pub instance_size: Option<String>,
    /// Primary volume overrides.
    pub primary_volume: Option<VolumeOverride>,
    /// Additional volumes, each with its own device name.
    pub secondary_volumes: Vec<VolumeSpec>,
    /// Custom inbound rules appended after the baseline rules.
    pub ingress_rules: Vec<IngressRuleSpec>,
    /// Commands prepended before the built-in boot script.
    pub prepend_user_data: Vec<String>,
    /// Commands appended after the built-in boot script.
    pub append_user_data: Vec<String>,
}

/// Root cluster configuration. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSpec {
    /// VPC identifier; subnets are resolved externally from it.
    pub vpc_id: String,
    /// Placement selector. Mutually exclusive with `subnets`.
    pub subnet_type: Option<SubnetType>,
    /// Explicit placement. Mutually exclusive with `subnet_type`.
    pub subnets: Vec<SubnetRef>,
    /// Associate public IPs; also opens HTTPS from any IPv4 on both role
    /// security groups and defaults placement to public subnets.
    pub associate_public_ip: bool,
    /// Key pair for direct access. Omission implies session-based access only.
    pub key_pair_name: Option<String>,
    /// Cluster name used in instance names and outputs. Defaults to `k8s`.
    pub cluster_name: Option<String>,
    /// SSM parameter holding the machine image id. When absent the default
    /// Ubuntu image lookup is recorded instead.
    pub ami_param_name: Option<String>,
    /// Existing role ARN. Skips role creation and extends the referenced role.
    pub role_arn: Option<String>,
    /// Control-plane instance shape.
    pub control_plane: InstanceRoleSpec,
    /// Worker instance shape, shared by every replica.
    pub worker: InstanceRoleSpec,
    /// Number of worker replicas. Zero is legal and yields an empty
    /// join-command list.
    pub worker_count: u32,
    /// Prefix composed into every instance name.
    pub name_prefix: Option<String>,
    /// Environment tag composed into every instance name.
    pub env_tag: Option<String>,
}

impl Default for ClusterSpec {
    fn default() -> Self {
        Self {
            vpc_id: String::new(),
            subnet_type: None,
            subnets: Vec::new(),
            associate_public_ip: false,
            key_pair_name: None,
            cluster_name: None,
            ami_param_name: None,
            role_arn: None,
            control_plane: InstanceRoleSpec::default(),
            worker: InstanceRoleSpec::default(),
            worker_count: 1,
            name_prefix: None,
            env_tag: None,
        }
    }
}

impl ClusterSpec {
    /// Create a spec for the given VPC with defaults everywhere else.
    #[must_use]
    pub fn new(vpc_id: impl Into<String>) -> Self {
        Self {
            vpc_id: vpc_id.into(),
            ..Self::default()
        }
    }

    /// Set the cluster name.
    #[must_use]
    pub fn with_cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = Some(name.into());
        self
    }

    /// Set the worker replica count.
    #[must_use]
    pub fn with_worker_count(mut self, count: u32) -> Self {
        self.worker_count = count;
        self
    }

    /// Enable public IP association.
    #[must_use]
    pub fn with_public_ip(mut self) -> Self {
        self.associate_public_ip = true;
        self
    }

    /// Set the worker instance shape.
    #[must_use]
    pub fn with_worker(mut self, worker: InstanceRoleSpec) -> Self {
        self.worker = worker;
        self
    }

    /// Set the control-plane instance shape.
    #[must_use]
    pub fn with_control_plane(mut self, control_plane: InstanceRoleSpec) -> Self {
        self.control_plane = control_plane;
        self
    }

    /// Effective cluster name.
    #[must_use]
    pub fn cluster_name(&self) -> &str {
        self.cluster_name.as_deref().unwrap_or(DEFAULT_CLUSTER_NAME)
    }

    /// The role spec for a node role.
    #[must_use]
    pub fn role_spec(&self, role: NodeRole) -> &InstanceRoleSpec {
        match role {
            NodeRole::ControlPlane => &self.control_plane,
            NodeRole::Worker => &self.worker,
        }
    }

    /// Compose a full instance name: `{prefix-}{base}{-env}`.
    #[must_use]
    pub fn instance_name(&self, base: &str) -> String {
        let mut name = String::new();
        if let Some(ref prefix) = self.name_prefix {
            name.push_str(prefix);
            name.push('-');
        }
        name.push_str(base);
        if let Some(ref env) = self.env_tag {
            name.push('-');
            name.push_str(env);
        }
        name
    }
}
