use std::fmt;

pub type NodeId = usize;

/// A CPU belonging to a topology node.
///
/// `core` is the affinity handle used to pin the worker owning this CPU. It is
/// absent for fake topologies and on platforms where affinity cannot be
/// queried; workers then run unpinned.
#[derive(Debug, Clone)]
pub struct TopologyCpu {
    pub cpu_id: usize,
    pub core: Option<core_affinity::CoreId>,
}

#[derive(Debug, Clone)]
pub struct TopologyNode {
    pub cpus: Vec<TopologyCpu>,
}

/// The machine layout the scheduler builds its queues and workers from.
#[derive(Clone)]
pub struct Topology {
    nodes: Vec<TopologyNode>,
}

impl Topology {
    /// Detect the CPUs of this machine and group them into `num_nodes`
    /// locality domains of equal size.
    ///
    /// There is no portable NUMA enumeration, so node boundaries are assumed
    /// to split the CPU list into contiguous blocks, which matches how Linux
    /// numbers CPUs on the common NUMA layouts.
    pub fn detect_with_nodes(num_nodes: usize) -> Topology {
        let num_nodes = num_nodes.max(1);

        let cpus: Vec<TopologyCpu> = match core_affinity::get_core_ids() {
            Some(ids) => ids
                .into_iter()
                .enumerate()
                .map(|(cpu_id, core)| TopologyCpu {
                    cpu_id,
                    core: Some(core),
                })
                .collect(),
            None => (0..num_cpus::get())
                .map(|cpu_id| TopologyCpu { cpu_id, core: None })
                .collect(),
        };

        let per_node = (cpus.len() / num_nodes).max(1);
        let mut nodes: Vec<TopologyNode> = Vec::with_capacity(num_nodes);
        let mut iter = cpus.into_iter().peekable();
        while iter.peek().is_some() {
            if nodes.len() == num_nodes {
                // Remainder CPUs go to the last node.
                let last = nodes.last_mut().expect("at least one node");
                last.cpus.extend(iter.by_ref());
                break;
            }
            nodes.push(TopologyNode {
                cpus: iter.by_ref().take(per_node).collect(),
            });
        }

        Topology { nodes }
    }

    pub fn detect() -> Topology {
        Self::detect_with_nodes(1)
    }

    /// A synthetic topology with no CPU pinning. Used by tests to get a
    /// deterministic queue/worker layout independent of the host machine.
    pub fn fake(num_nodes: usize, cpus_per_node: usize) -> Topology {
        let mut cpu_id = 0;
        let nodes = (0..num_nodes.max(1))
            .map(|_| TopologyNode {
                cpus: (0..cpus_per_node.max(1))
                    .map(|_| {
                        let cpu = TopologyCpu { cpu_id, core: None };
                        cpu_id += 1;
                        cpu
                    })
                    .collect(),
            })
            .collect();
        Topology { nodes }
    }

    pub fn nodes(&self) -> &[TopologyNode] {
        &self.nodes
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_cpus(&self) -> usize {
        self.nodes.iter().map(|n| n.cpus.len()).sum()
    }
}

impl fmt::Debug for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topology")
            .field("num_nodes", &self.num_nodes())
            .field("num_cpus", &self.num_cpus())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_topology_layout() {
        let topology = Topology::fake(2, 3);
        assert_eq!(2, topology.num_nodes());
        assert_eq!(6, topology.num_cpus());
        assert_eq!(3, topology.nodes()[1].cpus.len());
        assert_eq!(5, topology.nodes()[1].cpus[2].cpu_id);
    }

    #[test]
    fn detect_covers_all_cpus() {
        let topology = Topology::detect_with_nodes(2);
        // A single-CPU host collapses to one node.
        assert!((1..=2).contains(&topology.num_nodes()));
        assert!(topology.num_cpus() >= 1);
    }
}
