//! Ingress-rule derivation for the two role security groups.
//!
//! The baseline rules model the control-plane/worker trust relationship and
//! are not user-configurable. Custom rules from the spec are appended after
//! them in declaration order; duplicates are kept as written, idempotent
//! application is the provisioning backend's job.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::spec::{ClusterSpec, NodeRole, PeerType, PortRange};

/// Ports the control-plane group accepts from the worker group: API server,
/// etcd, kubelet, kube-scheduler, kube-controller-manager.
pub const CONTROL_PLANE_PORTS_FROM_WORKERS: &[PortRange] = &[
    PortRange::single(6443),
    PortRange::range(2379, 2380),
    PortRange::single(10250),
    PortRange::single(10259),
    PortRange::single(10257),
];

/// Ports the worker group accepts from the control-plane group and from
/// itself: kubelet, kube-proxy, NodePort services.
pub const WORKER_PORTS: &[PortRange] = &[
    PortRange::single(10250),
    PortRange::single(10256),
    PortRange::range(30000, 32767),
];

/// HTTPS port opened from any IPv4 source when public IPs are requested.
const HTTPS_PORT: u16 = 443;

/// Resolved source of an ingress rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedPeer {
    /// Any IPv4 address.
    AnyIpv4,
    /// One of the two role security groups allocated by this build.
    RoleGroup(NodeRole),
    /// An externally-owned security group, looked up by id.
    SecurityGroupId(String),
}

/// A fully resolved inbound rule, ready for the provisioning backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIngressRule {
    /// Allowed source.
    pub peer: ResolvedPeer,
    /// Port or inclusive range. Degenerate ranges are passed through
    /// unchanged; the backend owns range validation.
    pub port: PortRange,
}

/// Derives the ordered rule set for one role's security group.
///
/// The baseline port tables are injected at construction; there is no
/// process-wide mutable state.
#[derive(Debug, Clone)]
pub struct NetworkPolicyDeriver {
    control_plane_from_workers: Vec<PortRange>,
    worker_baseline: Vec<PortRange>,
}

impl Default for NetworkPolicyDeriver {
    fn default() -> Self {
        Self {
            control_plane_from_workers: CONTROL_PLANE_PORTS_FROM_WORKERS.to_vec(),
            worker_baseline: WORKER_PORTS.to_vec(),
        }
    }
}

impl NetworkPolicyDeriver {
    /// Deriver with the standard Kubernetes port tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deriver with custom baseline tables.
    #[must_use]
    pub fn with_baselines(
        control_plane_from_workers: Vec<PortRange>,
        worker_baseline: Vec<PortRange>,
    ) -> Self {
        Self {
            control_plane_from_workers,
            worker_baseline,
        }
    }

    /// Derive the ordered rule set for `role`: baseline rules, then the
    /// public-HTTPS rule when requested, then the role's custom rules in
    /// declaration order.
    #[must_use]
    pub fn derive_rules(&self, role: NodeRole, spec: &ClusterSpec) -> Vec<ResolvedIngressRule> {
        let mut rules = Vec::new();

        match role {
            NodeRole::ControlPlane => {
                for port in &self.control_plane_from_workers {
                    rules.push(ResolvedIngressRule {
                        peer: ResolvedPeer::RoleGroup(NodeRole::Worker),
                        port: *port,
                    });
                }
            }
            NodeRole::Worker => {
                // Each baseline port is opened from the control plane and
                // from the worker group itself (worker-to-worker traffic).
                for port in &self.worker_baseline {
                    rules.push(ResolvedIngressRule {
                        peer: ResolvedPeer::RoleGroup(NodeRole::ControlPlane),
                        port: *port,
                    });
                    rules.push(ResolvedIngressRule {
                        peer: ResolvedPeer::RoleGroup(NodeRole::Worker),
                        port: *port,
                    });
                }
            }
        }

        if spec.associate_public_ip {
            rules.push(ResolvedIngressRule {
                peer: ResolvedPeer::AnyIpv4,
                port: PortRange::single(HTTPS_PORT),
            });
        }

        for rule in &spec.role_spec(role).ingress_rules {
            let peer = match rule.peer_type {
                PeerType::AnyIpv4 => ResolvedPeer::AnyIpv4,
                // Peer presence is enforced by validation before derivation.
                PeerType::SecurityGroup => {
                    ResolvedPeer::SecurityGroupId(rule.peer.clone().unwrap_or_default())
                }
            };
            rules.push(ResolvedIngressRule {
                peer,
                port: rule.port,
            });
        }

        debug!("derived {} ingress rules for {role} group", rules.len());
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::IngressRuleSpec;

    #[test]
    fn test_control_plane_baseline() {
        let deriver = NetworkPolicyDeriver::new();
        let rules = deriver.derive_rules(NodeRole::ControlPlane, &ClusterSpec::new("vpc-1"));

        assert_eq!(rules.len(), 5);
        assert!(rules
            .iter()
            .all(|r| r.peer == ResolvedPeer::RoleGroup(NodeRole::Worker)));
        assert_eq!(rules[0].port, PortRange::single(6443));
        assert_eq!(rules[1].port, PortRange::range(2379, 2380));
    }

    #[test]
    fn test_worker_baseline_pairs() {
        let deriver = NetworkPolicyDeriver::new();
        let rules = deriver.derive_rules(NodeRole::Worker, &ClusterSpec::new("vpc-1"));

        // Three ports, each from the control plane and from the worker group.
        assert_eq!(rules.len(), 6);
        assert_eq!(rules[0].peer, ResolvedPeer::RoleGroup(NodeRole::ControlPlane));
        assert_eq!(rules[1].peer, ResolvedPeer::RoleGroup(NodeRole::Worker));
        assert_eq!(rules[4].port, PortRange::range(30000, 32767));
        assert_eq!(rules[5].port, PortRange::range(30000, 32767));
    }

    #[test]
    fn test_public_ip_adds_https_to_both_roles() {
        let deriver = NetworkPolicyDeriver::new();
        let spec = ClusterSpec::new("vpc-1").with_public_ip();

        for role in [NodeRole::ControlPlane, NodeRole::Worker] {
            let rules = deriver.derive_rules(role, &spec);
            let https = ResolvedIngressRule {
                peer: ResolvedPeer::AnyIpv4,
                port: PortRange::single(443),
            };
            assert_eq!(rules.iter().filter(|r| **r == https).count(), 1);
        }
    }

    #[test]
    fn test_custom_rules_appended_in_order() {
        let deriver = NetworkPolicyDeriver::new();
        let mut spec = ClusterSpec::new("vpc-1");
        spec.control_plane.ingress_rules = vec![
            IngressRuleSpec {
                port: PortRange::single(8080),
                peer_type: PeerType::AnyIpv4,
                peer: None,
            },
            IngressRuleSpec {
                port: PortRange::range(9000, 9100),
                peer_type: PeerType::SecurityGroup,
                peer: Some("sg-0123".to_string()),
            },
        ];

        let rules = deriver.derive_rules(NodeRole::ControlPlane, &spec);
        assert_eq!(rules.len(), 7);
        assert_eq!(rules[5].peer, ResolvedPeer::AnyIpv4);
        assert_eq!(rules[5].port, PortRange::single(8080));
        assert_eq!(
            rules[6].peer,
            ResolvedPeer::SecurityGroupId("sg-0123".to_string())
        );
    }

    #[test]
    fn test_duplicates_are_kept() {
        let deriver = NetworkPolicyDeriver::new();
        let mut spec = ClusterSpec::new("vpc-1");
        let rule = IngressRuleSpec {
            port: PortRange::single(6443),
            peer_type: PeerType::AnyIpv4,
            peer: None,
        };
        spec.worker.ingress_rules = vec![rule.clone(), rule];

        let rules = deriver.derive_rules(NodeRole::Worker, &spec);
        assert_eq!(rules.len(), 8);
        assert_eq!(rules[6], rules[7]);
    }

    #[test]
    fn test_degenerate_range_passes_through() {
        let deriver = NetworkPolicyDeriver::new();
        let mut spec = ClusterSpec::new("vpc-1");
        spec.worker.ingress_rules = vec![IngressRuleSpec {
            port: PortRange::range(9100, 9000),
            peer_type: PeerType::AnyIpv4,
            peer: None,
        }];

        let rules = deriver.derive_rules(NodeRole::Worker, &spec);
        assert_eq!(rules.last().unwrap().port, PortRange::range(9100, 9000));
    }
}
