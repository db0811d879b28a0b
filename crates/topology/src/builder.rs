//! The topology build pipeline.
//!
//! A linear, synchronous pipeline over an immutable spec: validate, resolve
//! network facts, allocate security groups, derive rules, resolve the shared
//! role, resolve workers in replica order, compose and resolve the control
//! plane, record dependency edges, attach outputs. Any error aborts the
//! whole build; no partial graph is ever returned and no state survives
//! between builds.

use thiserror::Error;
use tracing::{debug, info};

use crate::backend::{BackendError, ProvisioningBackend};
use crate::graph::{
    DependencyEdge, PolicyStatement, ResourceGraph, ResourceId, RoleResolution, RoleSource,
    SecurityGroupDescriptor,
};
use crate::instance::InstanceSpecResolver;
use crate::network::NetworkPolicyDeriver;
use crate::outputs;
use crate::spec::{ClusterSpec, NodeRole};
use crate::userdata::UserDataComposer;
use crate::validate::{validate, ValidationError};

/// Managed policies attached to the instance role.
const MANAGED_POLICIES: [&str; 2] = ["AmazonSSMManagedInstanceCore", "AmazonEC2FullAccess"];

/// Errors that abort a topology build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The spec failed validation before any resource was derived.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Two volumes on one instance share a device name.
    #[error("device name {device} is used twice on instance {instance}")]
    DuplicateDeviceName {
        /// Composed name of the offending instance.
        instance: String,
        /// The colliding device name.
        device: String,
    },

    /// An external lookup failed; propagated unchanged, never retried.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Orchestrates one build from spec to resource graph.
#[derive(Debug, Clone, Default)]
pub struct TopologyBuilder {
    network: NetworkPolicyDeriver,
    userdata: UserDataComposer,
}

impl TopologyBuilder {
    /// Builder with the standard port tables and boot scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with a custom rule deriver and boot-script composer.
    #[must_use]
    pub fn with_components(network: NetworkPolicyDeriver, userdata: UserDataComposer) -> Self {
        Self { network, userdata }
    }

    /// Build the resource graph for `spec`.
    ///
    /// # Errors
    ///
    /// Returns the first [`BuildError`] encountered; on error no partial
    /// graph exists.
    pub fn build(
        &self,
        spec: &ClusterSpec,
        backend: &dyn ProvisioningBackend,
    ) -> Result<ResourceGraph, BuildError> {
        validate(spec)?;

        let cluster_name = spec.cluster_name().to_string();
        info!("building topology for cluster {cluster_name}");

        let facts = backend.resolve_network(&spec.vpc_id)?;
        debug!("resolved network facts for {}", facts.vpc_id);

        let control_plane_sg = SecurityGroupDescriptor {
            id: ResourceId::new("security-group", &format!("{cluster_name}-ctrl-plane-sg")),
            name: format!("{cluster_name}-ctrl-plane-sg"),
            description: "Control plane security group".to_string(),
            vpc_id: spec.vpc_id.clone(),
            ingress: self.network.derive_rules(NodeRole::ControlPlane, spec),
        };
        let worker_sg = SecurityGroupDescriptor {
            id: ResourceId::new("security-group", &format!("{cluster_name}-worker-sg")),
            name: format!("{cluster_name}-worker-sg"),
            description: "Worker node security group".to_string(),
            vpc_id: spec.vpc_id.clone(),
            ingress: self.network.derive_rules(NodeRole::Worker, spec),
        };

        let role = resolve_role(spec, &cluster_name);
        let resolver = InstanceSpecResolver::new(spec, &facts, role.id.clone());

        let mut workers = Vec::new();
        for index in 1..=spec.worker_count {
            let user_data = self
                .userdata
                .compose(NodeRole::Worker, &spec.worker, &[]);
            let worker = resolver.resolve(
                NodeRole::Worker,
                &format!("{cluster_name}-worker-{index}"),
                &worker_sg.id,
                user_data,
            )?;
            debug!("resolved worker descriptor {}", worker.name);
            workers.push(worker);
        }

        // The control-plane script is a function of the complete worker set,
        // so it is composed only after every worker descriptor exists.
        let worker_ids: Vec<ResourceId> = workers.iter().map(|w| w.id.clone()).collect();
        let control_plane_user_data =
            self.userdata
                .compose(NodeRole::ControlPlane, &spec.control_plane, &worker_ids);
        let control_plane = resolver.resolve(
            NodeRole::ControlPlane,
            &format!("{cluster_name}-ctrl-plane"),
            &control_plane_sg.id,
            control_plane_user_data,
        )?;

        let edges = worker_ids
            .iter()
            .map(|worker| DependencyEdge {
                before: worker.clone(),
                after: control_plane.id.clone(),
            })
            .collect();

        let mut graph = ResourceGraph {
            cluster_name,
            control_plane_sg,
            worker_sg,
            role,
            workers,
            control_plane,
            edges,
            outputs: Vec::new(),
        };
        graph.outputs = outputs::export(&graph);

        info!(
            "topology complete: {} workers, {} edges, {} outputs",
            graph.workers.len(),
            graph.edges.len(),
            graph.outputs.len()
        );
        Ok(graph)
    }
}

/// Resolve the shared instance role. An external ARN skips role creation
/// and extends the referenced role; the policies are attached either way.
fn resolve_role(spec: &ClusterSpec, cluster_name: &str) -> RoleResolution {
    let role_name = format!("{cluster_name}-node-role");
    let source = spec.role_arn.as_ref().map_or(
        RoleSource::Create {
            name: role_name.clone(),
        },
        |arn| RoleSource::External { arn: arn.clone() },
    );

    RoleResolution {
        id: ResourceId::new("iam-role", &role_name),
        source,
        managed_policies: MANAGED_POLICIES.iter().map(ToString::to_string).collect(),
        inline_statements: vec![PolicyStatement {
            sid: "SendCommand".to_string(),
            actions: vec!["ssm:SendCommand".to_string()],
            resources: vec!["*".to_string()],
        }],
    }
}
