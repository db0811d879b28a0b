//! Per-instance shape resolution.
//!
//! Turns one role's abstract instance request into a concrete descriptor:
//! merged volumes, placement, identity, sizing, image. Provider identifiers
//! are not known here; the descriptor carries a logical id and the actual
//! assignment happens when the backend realizes the graph.

use tracing::debug;

use crate::backend::NetworkFacts;
use crate::builder::BuildError;
use crate::graph::{
    InstanceDescriptor, InstanceProfile, MachineImage, Placement, ResolvedVolume, ResourceId,
};
use crate::spec::{
    ClusterSpec, InstanceRoleSpec, NodeRole, SubnetType, PRIMARY_DEVICE_NAME,
    DEFAULT_INSTANCE_CLASS, DEFAULT_INSTANCE_SIZE, DEFAULT_VOLUME_SIZE_GIB,
};

/// Resolves abstract role requests into concrete instance descriptors.
pub struct InstanceSpecResolver<'a> {
    spec: &'a ClusterSpec,
    facts: &'a NetworkFacts,
    role_id: ResourceId,
}

impl<'a> InstanceSpecResolver<'a> {
    /// Resolver over one spec, its network facts, and the shared role.
    #[must_use]
    pub fn new(spec: &'a ClusterSpec, facts: &'a NetworkFacts, role_id: ResourceId) -> Self {
        Self {
            spec,
            facts,
            role_id,
        }
    }

    /// Resolve one instance. `base_name` is the pre-composition name, e.g.
    /// `k8s-worker-1`; `user_data` is the already-composed boot sequence.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateDeviceName`] when a secondary volume
    /// reuses the primary device name or another secondary's device name.
    pub fn resolve(
        &self,
        role: NodeRole,
        base_name: &str,
        security_group: &ResourceId,
        user_data: Vec<String>,
    ) -> Result<InstanceDescriptor, BuildError> {
        let name = self.spec.instance_name(base_name);
        let role_spec = self.spec.role_spec(role);
        let volumes = resolve_volumes(role_spec, &name)?;

        debug!("resolved {} volumes for instance {name}", volumes.len());

        Ok(InstanceDescriptor {
            id: ResourceId::new("instance", &name),
            profile: InstanceProfile {
                id: ResourceId::new("instance-profile", &name),
                name: format!("{name}-profile"),
                role: self.role_id.clone(),
            },
            role,
            instance_class: role_spec
                .instance_class
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTANCE_CLASS.to_string()),
            instance_size: role_spec
                .instance_size
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTANCE_SIZE.to_string()),
            image: self.spec.ami_param_name.as_ref().map_or(
                MachineImage::UbuntuLookup,
                |param| MachineImage::SsmParameter(param.clone()),
            ),
            placement: self.resolve_placement(),
            security_group: security_group.clone(),
            key_pair_name: self.spec.key_pair_name.clone(),
            volumes,
            user_data,
            require_imdsv2: true,
            name,
        })
    }

    fn resolve_placement(&self) -> Placement {
        if !self.spec.subnets.is_empty() {
            return Placement::Subnets {
                subnet_ids: self
                    .spec
                    .subnets
                    .iter()
                    .map(|s| s.subnet_id.clone())
                    .collect(),
            };
        }

        let subnet_type = self.spec.subnet_type.unwrap_or(if self.spec.associate_public_ip {
            SubnetType::Public
        } else {
            self.facts.default_subnet_type
        });

        Placement::SubnetType {
            subnet_type,
            subnet_ids: self.facts.subnet_ids(subnet_type).to_vec(),
        }
    }
}

/// Merge volume overrides over defaults. The primary volume is always
/// present and its device name is forced to the reserved constant.
fn resolve_volumes(
    role_spec: &InstanceRoleSpec,
    instance_name: &str,
) -> Result<Vec<ResolvedVolume>, BuildError> {
    let primary = role_spec.primary_volume.clone().unwrap_or_default();
    let mut volumes = vec![ResolvedVolume {
        device_name: PRIMARY_DEVICE_NAME.to_string(),
        size_gib: primary.size_gib.unwrap_or(DEFAULT_VOLUME_SIZE_GIB),
        volume_type: primary.volume_type.unwrap_or_default(),
        delete_on_termination: primary.delete_on_termination.unwrap_or(true),
    }];

    for secondary in &role_spec.secondary_volumes {
        if volumes.iter().any(|v| v.device_name == secondary.device_name) {
            return Err(BuildError::DuplicateDeviceName {
                instance: instance_name.to_string(),
                device: secondary.device_name.clone(),
            });
        }
        volumes.push(ResolvedVolume {
            device_name: secondary.device_name.clone(),
            size_gib: secondary.size_gib.unwrap_or(DEFAULT_VOLUME_SIZE_GIB),
            volume_type: secondary.volume_type.unwrap_or_default(),
            delete_on_termination: secondary.delete_on_termination.unwrap_or(true),
        });
    }

    Ok(volumes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{SubnetRef, VolumeOverride, VolumeSpec, VolumeType};

    fn resolver_fixture(spec: &ClusterSpec, facts: &NetworkFacts) -> InstanceDescriptor {
        let resolver =
            InstanceSpecResolver::new(spec, facts, ResourceId::new("iam-role", "k8s-node-role"));
        resolver
            .resolve(
                NodeRole::Worker,
                "k8s-worker-1",
                &ResourceId::new("security-group", "k8s-worker-sg"),
                Vec::new(),
            )
            .unwrap()
    }

    #[test]
    fn test_primary_volume_defaults() {
        let spec = ClusterSpec::new("vpc-1");
        let facts = NetworkFacts::for_vpc("vpc-1");
        let instance = resolver_fixture(&spec, &facts);

        assert_eq!(instance.volumes.len(), 1);
        let primary = &instance.volumes[0];
        assert_eq!(primary.device_name, PRIMARY_DEVICE_NAME);
        assert_eq!(primary.size_gib, 20);
        assert_eq!(primary.volume_type, VolumeType::Gp3);
        assert!(primary.delete_on_termination);
    }

    #[test]
    fn test_primary_override_cannot_move_device() {
        let mut spec = ClusterSpec::new("vpc-1");
        spec.worker.primary_volume = Some(VolumeOverride {
            size_gib: Some(100),
            volume_type: Some(VolumeType::Io2),
            delete_on_termination: Some(false),
        });
        let facts = NetworkFacts::for_vpc("vpc-1");
        let instance = resolver_fixture(&spec, &facts);

        let primary = &instance.volumes[0];
        assert_eq!(primary.device_name, PRIMARY_DEVICE_NAME);
        assert_eq!(primary.size_gib, 100);
        assert_eq!(primary.volume_type, VolumeType::Io2);
        assert!(!primary.delete_on_termination);
    }

    #[test]
    fn test_secondary_reusing_primary_device_fails() {
        let mut spec = ClusterSpec::new("vpc-1");
        spec.worker.secondary_volumes = vec![VolumeSpec {
            device_name: PRIMARY_DEVICE_NAME.to_string(),
            size_gib: Some(20),
            volume_type: None,
            delete_on_termination: None,
        }];
        let facts = NetworkFacts::for_vpc("vpc-1");
        let resolver =
            InstanceSpecResolver::new(&spec, &facts, ResourceId::new("iam-role", "r"));

        let err = resolver
            .resolve(
                NodeRole::Worker,
                "k8s-worker-1",
                &ResourceId::new("security-group", "sg"),
                Vec::new(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::DuplicateDeviceName {
                instance: "k8s-worker-1".to_string(),
                device: PRIMARY_DEVICE_NAME.to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_secondary_devices_fail() {
        let mut spec = ClusterSpec::new("vpc-1");
        let volume = VolumeSpec {
            device_name: "/dev/xvdb".to_string(),
            size_gib: None,
            volume_type: None,
            delete_on_termination: None,
        };
        spec.worker.secondary_volumes = vec![volume.clone(), volume];
        let facts = NetworkFacts::for_vpc("vpc-1");
        let resolver =
            InstanceSpecResolver::new(&spec, &facts, ResourceId::new("iam-role", "r"));

        let err = resolver
            .resolve(
                NodeRole::Worker,
                "k8s-worker-1",
                &ResourceId::new("security-group", "sg"),
                Vec::new(),
            )
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateDeviceName { device, .. } if device == "/dev/xvdb"));
    }

    #[test]
    fn test_explicit_subnets_win() {
        let mut spec = ClusterSpec::new("vpc-1");
        spec.subnets = vec![SubnetRef {
            subnet_id: "subnet-123456".to_string(),
            availability_zone: None,
        }];
        let facts = NetworkFacts::for_vpc("vpc-1")
            .with_subnets(SubnetType::Public, vec!["subnet-other".to_string()]);
        let instance = resolver_fixture(&spec, &facts);

        assert_eq!(
            instance.placement,
            Placement::Subnets {
                subnet_ids: vec!["subnet-123456".to_string()]
            }
        );
    }

    #[test]
    fn test_placement_defaults_to_public() {
        let spec = ClusterSpec::new("vpc-1");
        let facts = NetworkFacts::for_vpc("vpc-1")
            .with_subnets(SubnetType::Public, vec!["subnet-a".to_string()]);
        let instance = resolver_fixture(&spec, &facts);

        assert_eq!(
            instance.placement,
            Placement::SubnetType {
                subnet_type: SubnetType::Public,
                subnet_ids: vec!["subnet-a".to_string()]
            }
        );
    }

    #[test]
    fn test_profile_is_per_instance() {
        let spec = ClusterSpec::new("vpc-1");
        let facts = NetworkFacts::for_vpc("vpc-1");
        let resolver =
            InstanceSpecResolver::new(&spec, &facts, ResourceId::new("iam-role", "k8s-node-role"));
        let sg = ResourceId::new("security-group", "sg");

        let first = resolver
            .resolve(NodeRole::Worker, "k8s-worker-1", &sg, Vec::new())
            .unwrap();
        let second = resolver
            .resolve(NodeRole::Worker, "k8s-worker-2", &sg, Vec::new())
            .unwrap();

        assert_ne!(first.profile.id, second.profile.id);
        assert_eq!(first.profile.role, second.profile.role);
    }

    #[test]
    fn test_sizing_and_image_defaults() {
        let spec = ClusterSpec::new("vpc-1");
        let facts = NetworkFacts::for_vpc("vpc-1");
        let instance = resolver_fixture(&spec, &facts);

        assert_eq!(instance.instance_class, "t4g");
        assert_eq!(instance.instance_size, "medium");
        assert_eq!(instance.image, MachineImage::UbuntuLookup);
        assert!(instance.require_imdsv2);
    }
}
