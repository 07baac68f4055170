//! Inspectable structure of an agent network.
//!
//! Snapshots are a read-only view used by renderers and exports. Nothing in
//! the crate reconstructs a network from one.

use serde::{Deserialize, Serialize};

/// Role of a node in an agent network.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Input,
    Hidden,
    Output,
}

/// Node squashing function.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Activation {
    #[default]
    Logistic,
    Tanh,
    Relu,
    Identity,
    Sine,
}

impl Activation {
    /// Every activation, in a fixed order.
    pub const ALL: [Activation; 5] = [
        Activation::Logistic,
        Activation::Tanh,
        Activation::Relu,
        Activation::Identity,
        Activation::Sine,
    ];

    /// Apply the function to a node's summed input.
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Logistic => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
            Activation::Identity => x,
            Activation::Sine => x.sin(),
        }
    }
}

/// A node as seen by a renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSnapshot {
    /// Position of the node in activation order.
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub bias: f32,
    pub activation: Activation,
}

/// A directed weighted connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSnapshot {
    pub from: usize,
    pub to: usize,
    pub weight: f32,
}

/// Structural snapshot of a network.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub connections: Vec<ConnectionSnapshot>,
}

impl NetworkSnapshot {
    /// Count nodes of the given kind.
    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logistic_range() {
        assert!((Activation::Logistic.apply(0.0) - 0.5).abs() < 1e-6);
        assert!(Activation::Logistic.apply(50.0) <= 1.0);
        assert!(Activation::Logistic.apply(-50.0) >= 0.0);
    }

    #[test]
    fn test_relu() {
        assert_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert_eq!(Activation::Relu.apply(3.0), 3.0);
    }

    #[test]
    fn test_snapshot_json_tags_node_type() {
        let snapshot = NetworkSnapshot {
            nodes: vec![NodeSnapshot {
                id: 0,
                kind: NodeKind::Input,
                bias: 0.0,
                activation: Activation::Logistic,
            }],
            connections: vec![],
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains(r#""type":"input""#));
        assert_eq!(snapshot.count(NodeKind::Input), 1);
        assert_eq!(snapshot.count(NodeKind::Output), 0);
    }
}
