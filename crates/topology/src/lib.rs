//! Cluster topology builder for self-managed Kubernetes on EC2.
//!
//! This crate resolves a declarative [`ClusterSpec`] into a
//! [`ResourceGraph`]: security-group descriptors with derived ingress rules,
//! an IAM role resolution, one instance descriptor per worker plus one for
//! the control plane, composed boot scripts, and creation-order dependency
//! edges. The graph is handed to an external provisioning backend; the
//! builder itself performs no cloud I/O.
//!
//! # Example
//!
//! ```rust
//! use topology::backend::StaticFacts;
//! use topology::builder::TopologyBuilder;
//! use topology::spec::ClusterSpec;
//!
//! let spec = ClusterSpec::new("vpc-052216022ab8b9270")
//!     .with_cluster_name("my-cluster")
//!     .with_worker_count(2);
//!
//! let backend = StaticFacts::for_vpc("vpc-052216022ab8b9270");
//! let graph = TopologyBuilder::new().build(&spec, &backend).unwrap();
//!
//! assert_eq!(graph.workers.len(), 2);
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod builder;
pub mod graph;
pub mod instance;
pub mod network;
pub mod outputs;
pub mod spec;
pub mod userdata;
pub mod validate;

pub use backend::{BackendError, NetworkFacts, ProvisioningBackend, StaticFacts};
pub use builder::{BuildError, TopologyBuilder};
pub use graph::{InstanceDescriptor, ResourceGraph, ResourceId};
pub use spec::{ClusterSpec, IngressRuleSpec, InstanceRoleSpec, NodeRole, VolumeSpec};
pub use validate::ValidationError;
