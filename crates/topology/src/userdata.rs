//! Boot-script composition.
//!
//! The ordering law is fixed: `prepend ++ base ++ role-extra ++ append`.
//! Workers get no extra commands. The control plane gets the init script
//! followed by one join command per worker; each join command references
//! the worker's instance-id token, which is why workers must be realized
//! before the control plane.

use crate::graph::ResourceId;
use crate::spec::{InstanceRoleSpec, NodeRole};

/// Built-in runtime-install commands applied to every instance.
pub const RUNTIME_INSTALL: &[&str] = &[
    "#!/bin/bash",
    "set -euo pipefail",
    "swapoff -a",
    "sed -i '/ swap / s/^/#/' /etc/fstab",
    "modprobe overlay",
    "modprobe br_netfilter",
    "cat <<EOF >/etc/sysctl.d/k8s.conf",
    "net.bridge.bridge-nf-call-iptables = 1",
    "net.bridge.bridge-nf-call-ip6tables = 1",
    "net.ipv4.ip_forward = 1",
    "EOF",
    "sysctl --system",
    "apt-get update",
    "apt-get install -y containerd apt-transport-https ca-certificates curl gpg",
    "mkdir -p /etc/containerd",
    "containerd config default | tee /etc/containerd/config.toml",
    "sed -i 's/SystemdCgroup = false/SystemdCgroup = true/' /etc/containerd/config.toml",
    "systemctl restart containerd",
    "curl -fsSL https://pkgs.k8s.io/core:/stable:/v1.31/deb/Release.key | gpg --dearmor -o /etc/apt/keyrings/kubernetes-apt-keyring.gpg",
    "echo 'deb [signed-by=/etc/apt/keyrings/kubernetes-apt-keyring.gpg] https://pkgs.k8s.io/core:/stable:/v1.31/deb/ /' | tee /etc/apt/sources.list.d/kubernetes.list",
    "apt-get update",
    "apt-get install -y kubelet kubeadm kubectl",
    "apt-mark hold kubelet kubeadm kubectl",
];

/// Built-in control-plane initialization commands, applied after the
/// runtime install on the control-plane instance only.
pub const CONTROL_PLANE_INIT: &[&str] = &[
    "kubeadm init --pod-network-cidr=10.244.0.0/16",
    "mkdir -p /home/ubuntu/.kube",
    "cp -i /etc/kubernetes/admin.conf /home/ubuntu/.kube/config",
    "chown ubuntu:ubuntu /home/ubuntu/.kube/config",
    "su - ubuntu -c 'kubectl apply -f https://raw.githubusercontent.com/flannel-io/flannel/master/Documentation/kube-flannel.yml'",
];

/// The control-plane-issued remote command that joins one worker to the
/// cluster, parameterized by that worker's instance-id token.
#[must_use]
pub fn join_command(worker: &ResourceId) -> String {
    format!(
        "aws ssm send-command --instance-ids \"{}\" \
         --document-name \"AWS-RunShellScript\" \
         --comment \"Join worker to cluster\" \
         --parameters \"commands=[\\\"$(kubeadm token create --print-join-command)\\\"]\"",
        worker.attr("instance_id")
    )
}

/// Assembles the ordered boot-command sequence for an instance.
///
/// Holds the two boot-script assets (runtime install, control-plane init)
/// as opaque line lists; composition is total over any input.
#[derive(Debug, Clone)]
pub struct UserDataComposer {
    install: Vec<String>,
    control_plane_init: Vec<String>,
}

impl Default for UserDataComposer {
    fn default() -> Self {
        Self {
            install: RUNTIME_INSTALL.iter().map(ToString::to_string).collect(),
            control_plane_init: CONTROL_PLANE_INIT
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl UserDataComposer {
    /// Composer with the built-in boot scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Composer with caller-supplied script assets.
    #[must_use]
    pub fn with_scripts(install: Vec<String>, control_plane_init: Vec<String>) -> Self {
        Self {
            install,
            control_plane_init,
        }
    }

    /// Compose the boot sequence for `role`. `workers` is consulted only for
    /// the control plane, one join command per entry in order.
    #[must_use]
    pub fn compose(
        &self,
        role: NodeRole,
        role_spec: &InstanceRoleSpec,
        workers: &[ResourceId],
    ) -> Vec<String> {
        let mut commands = role_spec.prepend_user_data.clone();
        commands.extend(self.install.iter().cloned());

        if role == NodeRole::ControlPlane {
            commands.extend(self.control_plane_init.iter().cloned());
            commands.extend(workers.iter().map(join_command));
        }

        commands.extend(role_spec.append_user_data.iter().cloned());
        commands
    }
}
