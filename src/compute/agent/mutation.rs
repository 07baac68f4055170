//! Structural and parametric mutation operators.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::schema::{Activation, NodeKind};

use super::network::{Connection, Network, Node, init_value};

/// Standard deviation of the Gaussian bias perturbation.
const BIAS_SIGMA: f32 = 0.5;

/// Mutation operator applied to a [`Network`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    /// Split a connection with a new hidden node.
    AddNode,
    /// Connect two previously unconnected nodes.
    AddConnection,
    /// Shift one weight by `uniform(-1, 1)`.
    PerturbWeight,
    PerturbBias,
    ChangeActivation,
    /// Drop a connection whose endpoints keep another link.
    RemoveConnection,
    /// Remove a hidden node, bridging its predecessors to its successors.
    RemoveNode,
}

impl Mutation {
    pub const ALL: [Mutation; 7] = [
        Mutation::AddNode,
        Mutation::AddConnection,
        Mutation::PerturbWeight,
        Mutation::PerturbBias,
        Mutation::ChangeActivation,
        Mutation::RemoveConnection,
        Mutation::RemoveNode,
    ];
}

/// Operators applied, in order, when an agent spawns a child.
pub const SPAWN_MUTATIONS: [Mutation; 3] = [
    Mutation::AddNode,
    Mutation::PerturbWeight,
    Mutation::AddConnection,
];

impl Network {
    /// Apply `mutation`. Returns `false` when the network offers nothing to
    /// mutate, in which case it is left untouched.
    pub fn mutate<R: Rng + ?Sized>(&mut self, mutation: Mutation, rng: &mut R) -> bool {
        let applied = match mutation {
            Mutation::AddNode => self.add_node(rng),
            Mutation::AddConnection => self.add_connection(rng),
            Mutation::PerturbWeight => self.perturb_weight(rng),
            Mutation::PerturbBias => self.perturb_bias(rng),
            Mutation::ChangeActivation => self.change_activation(rng),
            Mutation::RemoveConnection => self.remove_connection(rng),
            Mutation::RemoveNode => self.remove_hidden_node(rng),
        };
        if applied {
            self.sort_connections();
        }
        applied
    }

    fn add_node<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let (from, to, weight) = if self.connections.is_empty() {
            if self.input_size == 0 {
                return false;
            }
            (rng.gen_range(0..self.input_size), self.output_index(), 1.0)
        } else {
            let c = self.connections.remove(rng.gen_range(0..self.connections.len()));
            (c.from, c.to, c.weight)
        };

        // from < at <= to, so the new node sits between its endpoints
        let at = (from + 1).max(self.input_size);
        self.insert_node(
            at,
            Node {
                kind: NodeKind::Hidden,
                bias: init_value(rng),
                activation: Activation::Logistic,
            },
        );
        self.connections.push(Connection {
            from,
            to: at,
            weight: 1.0,
        });
        self.connections.push(Connection {
            from: at,
            to: to + 1,
            weight,
        });
        true
    }

    fn add_connection<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let len = self.nodes.len();
        let candidates: Vec<(usize, usize)> = (0..len)
            .flat_map(|from| ((from + 1).max(self.input_size)..len).map(move |to| (from, to)))
            .filter(|&(from, to)| !self.is_connected(from, to))
            .collect();
        if candidates.is_empty() {
            return false;
        }

        let (from, to) = candidates[rng.gen_range(0..candidates.len())];
        self.connections.push(Connection {
            from,
            to,
            weight: init_value(rng),
        });
        true
    }

    fn perturb_weight<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.connections.is_empty() {
            return false;
        }
        let idx = rng.gen_range(0..self.connections.len());
        self.connections[idx].weight += rng.gen_range(-1.0..1.0);
        true
    }

    fn perturb_bias<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let idx = rng.gen_range(self.input_size..self.nodes.len());
        let noise: f32 = rng.sample(StandardNormal);
        self.nodes[idx].bias += noise * BIAS_SIGMA;
        true
    }

    fn change_activation<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let idx = rng.gen_range(self.input_size..self.nodes.len());
        let current = self.nodes[idx].activation;
        let choices: Vec<Activation> = Activation::ALL
            .into_iter()
            .filter(|&a| a != current)
            .collect();
        self.nodes[idx].activation = choices[rng.gen_range(0..choices.len())];
        true
    }

    fn remove_connection<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let mut out_degree = vec![0usize; self.nodes.len()];
        let mut in_degree = vec![0usize; self.nodes.len()];
        for c in &self.connections {
            out_degree[c.from] += 1;
            in_degree[c.to] += 1;
        }

        let removable: Vec<usize> = self
            .connections
            .iter()
            .enumerate()
            .filter(|(_, c)| out_degree[c.from] > 1 && in_degree[c.to] > 1)
            .map(|(i, _)| i)
            .collect();
        if removable.is_empty() {
            return false;
        }

        self.connections
            .remove(removable[rng.gen_range(0..removable.len())]);
        true
    }

    fn remove_hidden_node<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.hidden_count() == 0 {
            return false;
        }
        let node = rng.gen_range(self.input_size..self.output_index());

        let predecessors: Vec<(usize, f32)> = self
            .connections
            .iter()
            .filter(|c| c.to == node)
            .map(|c| (c.from, c.weight))
            .collect();
        let successors: Vec<usize> = self
            .connections
            .iter()
            .filter(|c| c.from == node)
            .map(|c| c.to)
            .collect();

        for &(from, weight) in &predecessors {
            for &to in &successors {
                // the list is unsorted while bridging, so no binary search here
                if !self.connections.iter().any(|c| c.from == from && c.to == to) {
                    self.connections.push(Connection { from, to, weight });
                }
            }
        }
        self.remove_node(node);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn assert_well_formed(net: &Network) {
        let len = net.node_count();
        assert_eq!(net.nodes()[len - 1].kind, NodeKind::Output);
        assert!(net.nodes()[..net.input_size()]
            .iter()
            .all(|n| n.kind == NodeKind::Input));
        for pair in net.connections().windows(2) {
            assert!((pair[0].from, pair[0].to) < (pair[1].from, pair[1].to));
        }
        for c in net.connections() {
            assert!(c.from < c.to, "{c:?}");
            assert!(c.to < len && c.to >= net.input_size());
        }
    }

    #[test]
    fn test_add_node_splits_connection() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut net = Network::perceptron(3, 2, &mut rng);
        let (nodes, connections) = (net.node_count(), net.connection_count());

        assert!(net.mutate(Mutation::AddNode, &mut rng));
        assert_eq!(net.node_count(), nodes + 1);
        assert_eq!(net.connection_count(), connections + 1);
        assert_well_formed(&net);
    }

    #[test]
    fn test_add_node_without_connections() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut net = Network::perceptron(2, 0, &mut rng);
        net.connections.clear();

        assert!(net.mutate(Mutation::AddNode, &mut rng));
        assert_eq!(net.hidden_count(), 1);
        assert_eq!(net.connection_count(), 2);
        assert_well_formed(&net);
    }

    #[test]
    fn test_add_connection_on_saturated_network() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut net = Network::perceptron(2, 0, &mut rng);
        let before = net.clone();
        assert!(!net.mutate(Mutation::AddConnection, &mut rng));
        assert_eq!(net, before);
    }

    #[test]
    fn test_add_connection_after_growth() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut net = Network::perceptron(3, 0, &mut rng);
        assert!(net.mutate(Mutation::AddNode, &mut rng));
        let connections = net.connection_count();
        assert!(net.mutate(Mutation::AddConnection, &mut rng));
        assert_eq!(net.connection_count(), connections + 1);
        assert_well_formed(&net);
    }

    #[test]
    fn test_change_activation_changes_something() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut net = Network::perceptron(1, 0, &mut rng);
        assert!(net.mutate(Mutation::ChangeActivation, &mut rng));
        assert_ne!(net.nodes()[1].activation, Activation::Logistic);
    }

    #[test]
    fn test_remove_node_bridges_paths() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut net = Network::perceptron(2, 1, &mut rng);
        assert!(net.mutate(Mutation::RemoveNode, &mut rng));
        assert_eq!(net.hidden_count(), 0);
        assert_eq!(net.connection_count(), 2);
        assert!(net.connections().iter().all(|c| c.to == 2));
        assert!(!net.mutate(Mutation::RemoveNode, &mut rng));
    }

    #[test]
    fn test_remove_connection_never_isolates_output() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut net = Network::perceptron(4, 3, &mut rng);
        for _ in 0..100 {
            net.mutate(Mutation::RemoveConnection, &mut rng);
        }
        let output = net.node_count() - 1;
        assert!(net.connections().iter().any(|c| c.to == output));
        assert_well_formed(&net);
    }

    #[test]
    fn test_spawn_mutations_grow_network() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut net = Network::perceptron(5, 4, &mut rng);
        let nodes = net.node_count();
        for mutation in SPAWN_MUTATIONS {
            net.mutate(mutation, &mut rng);
        }
        assert!(net.node_count() > nodes);
    }

    proptest! {
        #[test]
        fn prop_mutations_keep_network_well_formed(
            seed in any::<u64>(),
            ops in prop::collection::vec(0usize..Mutation::ALL.len(), 0..40),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut net = Network::perceptron(3, 2, &mut rng);
            for op in ops {
                net.mutate(Mutation::ALL[op], &mut rng);
            }
            assert_well_formed(&net);
            prop_assert!(net.activate(&[0.2, 0.4, 0.6]).is_finite());
        }
    }
}
