//! Published outputs of a resolved graph.
//!
//! Output values are attribute-reference tokens; the provisioning backend
//! substitutes the provider-assigned identifiers after realization.

use crate::graph::{Output, ResourceGraph};

/// Capitalize each `-`/`_`-delimited segment and concatenate, e.g.
/// `my-cluster` becomes `MyCluster`.
#[must_use]
pub fn pascal_case(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Named identifiers exported from the graph: the control-plane instance id,
/// one worker instance id per replica (1-indexed), and both security-group
/// ids under normalized cluster-name keys.
#[must_use]
pub fn export(graph: &ResourceGraph) -> Vec<Output> {
    let mut outputs = vec![Output {
        key: "CtrlPlaneInstanceId".to_string(),
        value: graph.control_plane.id.attr("instance_id"),
    }];

    for (index, worker) in graph.workers.iter().enumerate() {
        outputs.push(Output {
            key: format!("Worker{}InstanceId", index + 1),
            value: worker.id.attr("instance_id"),
        });
    }

    let cluster = pascal_case(&graph.cluster_name);
    outputs.push(Output {
        key: format!("{cluster}ControlPlaneSecurityGroup"),
        value: graph.control_plane_sg.id.attr("security_group_id"),
    });
    outputs.push(Output {
        key: format!("{cluster}WorkerSecurityGroup"),
        value: graph.worker_sg.id.attr("security_group_id"),
    });

    outputs
}
