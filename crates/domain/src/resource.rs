//! Typed compute/storage endpoints and the weighted graph connecting them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A typed scheduler endpoint: durable storage, the shared CPU pool, or a
/// specific GPU device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    /// Durable backing storage (the source of truth for segment files).
    Disk,
    /// The shared CPU pool.
    Cpu,
    /// A specific GPU device, identified by its device index.
    Gpu(u32),
}

impl Resource {
    /// Returns true if this resource is a GPU device.
    #[must_use]
    pub const fn is_gpu(self) -> bool {
        matches!(self, Self::Gpu(_))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disk => formatter.write_str("disk"),
            Self::Cpu => formatter.write_str("cpu"),
            Self::Gpu(id) => write!(formatter, "gpu:{id}"),
        }
    }
}

/// A weighted, directed IO edge between two resources, in megabytes/second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceEdge {
    /// Source endpoint.
    pub from: Resource,
    /// Destination endpoint.
    pub to: Resource,
    /// Modeled bandwidth in megabytes/second.
    pub bandwidth_mb_s: f64,
}

/// A connection graph of weighted IO edges between resources, used for
/// cost-based routing decisions by placement passes.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    edges: HashMap<(Resource, Resource), f64>,
}

impl ResourceGraph {
    /// Build an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or overwrite) a directed edge.
    pub fn add_edge(&mut self, from: Resource, to: Resource, bandwidth_mb_s: f64) {
        self.edges.insert((from, to), bandwidth_mb_s);
    }

    /// Look up the bandwidth of a directed edge, if known.
    #[must_use]
    pub fn bandwidth(&self, from: Resource, to: Resource) -> Option<f64> {
        self.edges.get(&(from, to)).copied()
    }

    /// Build the canonical graph: disk->cpu at 500 MB/s, cpu<->gpu over PCIe
    /// at 11,000 MB/s for each configured GPU.
    #[must_use]
    pub fn standard(gpu_ids: &[u32]) -> Self {
        let mut graph = Self::new();
        graph.add_edge(Resource::Disk, Resource::Cpu, 500.0);
        graph.add_edge(Resource::Cpu, Resource::Disk, 500.0);
        for &gpu_id in gpu_ids {
            graph.add_edge(Resource::Cpu, Resource::Gpu(gpu_id), 11_000.0);
            graph.add_edge(Resource::Gpu(gpu_id), Resource::Cpu, 11_000.0);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_graph_has_disk_cpu_edge() {
        let graph = ResourceGraph::standard(&[0, 1]);
        assert_eq!(graph.bandwidth(Resource::Disk, Resource::Cpu), Some(500.0));
        assert_eq!(
            graph.bandwidth(Resource::Cpu, Resource::Gpu(1)),
            Some(11_000.0)
        );
        assert!(graph.bandwidth(Resource::Gpu(0), Resource::Gpu(1)).is_none());
    }

    #[test]
    fn resource_display_and_kind() {
        assert_eq!(Resource::Gpu(3).to_string(), "gpu:3");
        assert!(Resource::Gpu(0).is_gpu());
        assert!(!Resource::Cpu.is_gpu());
    }
}
