//! Growable feed-forward network.
//!
//! Nodes are stored in activation order: inputs first, then hidden nodes,
//! then the single output. Every connection runs from a lower to a higher
//! node index and the connection list is kept sorted by `(from, to)`, so one
//! ordered pass over the nodes activates the whole network.

use rand::Rng;

use crate::schema::{Activation, ConnectionSnapshot, NetworkSnapshot, NodeKind, NodeSnapshot};

/// Initial weights and biases are uniform in `[-INIT_RANGE, INIT_RANGE]`.
pub const INIT_RANGE: f32 = 0.1;

/// A node with its bias and squashing function.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub bias: f32,
    pub activation: Activation,
}

/// Directed weighted connection between two node indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub from: usize,
    pub to: usize,
    pub weight: f32,
}

/// Network mapping `input_size` scalars to one output.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub(super) input_size: usize,
    pub(super) nodes: Vec<Node>,
    pub(super) connections: Vec<Connection>,
}

impl Network {
    /// Fully connected `inputs -> hidden -> 1` perceptron.
    ///
    /// With `hidden == 0` the inputs are wired directly to the output.
    pub fn perceptron<R: Rng + ?Sized>(input_size: usize, hidden: usize, rng: &mut R) -> Self {
        let mut nodes = Vec::with_capacity(input_size + hidden + 1);
        nodes.extend((0..input_size).map(|_| Node {
            kind: NodeKind::Input,
            bias: 0.0,
            activation: Activation::Identity,
        }));
        nodes.extend((0..hidden).map(|_| Node {
            kind: NodeKind::Hidden,
            bias: init_value(rng),
            activation: Activation::Logistic,
        }));
        nodes.push(Node {
            kind: NodeKind::Output,
            bias: init_value(rng),
            activation: Activation::Logistic,
        });

        let output = nodes.len() - 1;
        let mut connections = Vec::new();
        if hidden == 0 {
            for from in 0..input_size {
                connections.push(Connection {
                    from,
                    to: output,
                    weight: init_value(rng),
                });
            }
        } else {
            for from in 0..input_size {
                for to in input_size..input_size + hidden {
                    connections.push(Connection {
                        from,
                        to,
                        weight: init_value(rng),
                    });
                }
            }
            for from in input_size..input_size + hidden {
                connections.push(Connection {
                    from,
                    to: output,
                    weight: init_value(rng),
                });
            }
        }

        let mut network = Self {
            input_size,
            nodes,
            connections,
        };
        network.sort_connections();
        network
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn hidden_count(&self) -> usize {
        self.nodes.len() - self.input_size - 1
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Hidden nodes plus connections; the size penalised during evolution.
    pub fn complexity(&self) -> usize {
        self.hidden_count() + self.connections.len()
    }

    #[inline]
    pub(super) fn output_index(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Feed `input` forward and return the output value.
    ///
    /// Inputs shorter than [`input_size`](Self::input_size) are left-padded
    /// with zeros; longer inputs contribute only their trailing values.
    pub fn activate(&self, input: &[f32]) -> f32 {
        let n = self.input_size;
        let tail = &input[input.len().saturating_sub(n)..];
        let mut values = vec![0.0f32; self.nodes.len()];
        values[n - tail.len()..n].copy_from_slice(tail);

        let mut sums: Vec<f32> = self.nodes.iter().map(|node| node.bias).collect();
        let mut next = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            if i >= n {
                values[i] = node.activation.apply(sums[i]);
            }
            while let Some(c) = self.connections.get(next)
                && c.from == i
            {
                sums[c.to] += c.weight * values[i];
                next += 1;
            }
        }

        values.last().copied().unwrap_or(0.0)
    }

    /// Structural view for renderers.
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            nodes: self
                .nodes
                .iter()
                .enumerate()
                .map(|(id, node)| NodeSnapshot {
                    id,
                    kind: node.kind,
                    bias: node.bias,
                    activation: node.activation,
                })
                .collect(),
            connections: self
                .connections
                .iter()
                .map(|c| ConnectionSnapshot {
                    from: c.from,
                    to: c.to,
                    weight: c.weight,
                })
                .collect(),
        }
    }

    pub(super) fn is_connected(&self, from: usize, to: usize) -> bool {
        self.connections
            .binary_search_by_key(&(from, to), |c| (c.from, c.to))
            .is_ok()
    }

    pub(super) fn sort_connections(&mut self) {
        self.connections.sort_by_key(|c| (c.from, c.to));
    }

    /// Insert a node at `at`, shifting every index at or above it.
    pub(super) fn insert_node(&mut self, at: usize, node: Node) {
        self.nodes.insert(at, node);
        for c in &mut self.connections {
            if c.from >= at {
                c.from += 1;
            }
            if c.to >= at {
                c.to += 1;
            }
        }
    }

    /// Remove node `at` and its connections, shifting higher indices down.
    pub(super) fn remove_node(&mut self, at: usize) {
        self.nodes.remove(at);
        self.connections.retain(|c| c.from != at && c.to != at);
        for c in &mut self.connections {
            if c.from > at {
                c.from -= 1;
            }
            if c.to > at {
                c.to -= 1;
            }
        }
    }
}

pub(super) fn init_value<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.gen_range(-INIT_RANGE..=INIT_RANGE)
}
