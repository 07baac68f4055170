//! Three-column layout of a network snapshot for renderers.

use std::collections::HashMap;

use serde::Serialize;

use crate::schema::{NetworkSnapshot, NodeKind};

/// Conventional margin between the canvas edge and the outer columns.
pub const DEFAULT_PADDING: f32 = 40.0;

/// Sign of a connection weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Excitatory,
    Inhibitory,
}

impl Polarity {
    /// Positive weights excite; zero, negative and NaN weights inhibit.
    pub fn of(weight: f32) -> Self {
        if weight > 0.0 {
            Polarity::Excitatory
        } else {
            Polarity::Inhibitory
        }
    }
}

/// Stroke width for a connection: `1 + min(6, |w| * 6)`.
pub fn edge_thickness(weight: f32) -> f32 {
    let magnitude = if weight.is_finite() { weight.abs() } else { 0.0 };
    1.0 + (magnitude * 6.0).min(6.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedNode {
    pub id: usize,
    pub kind: NodeKind,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedEdge {
    pub from: usize,
    pub to: usize,
    pub start: (f32, f32),
    pub end: (f32, f32),
    pub thickness: f32,
    pub polarity: Polarity,
}

/// Positions of every node and edge of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkLayout {
    pub nodes: Vec<PlacedNode>,
    pub edges: Vec<PlacedEdge>,
}

impl NetworkLayout {
    /// Inputs at `x = padding`, hidden nodes at `width / 2`, outputs at
    /// `width - padding`. Within a column of `n` nodes the i-th sits at
    /// `y = (i + 1) * height / (n + 1)`. Connections naming unknown nodes are
    /// skipped.
    pub fn compute(snapshot: &NetworkSnapshot, width: f32, height: f32, padding: f32) -> Self {
        let column_x = |kind: NodeKind| match kind {
            NodeKind::Input => padding,
            NodeKind::Hidden => width / 2.0,
            NodeKind::Output => width - padding,
        };

        let mut nodes = Vec::with_capacity(snapshot.nodes.len());
        for kind in [NodeKind::Input, NodeKind::Hidden, NodeKind::Output] {
            let column: Vec<_> = snapshot.nodes.iter().filter(|n| n.kind == kind).collect();
            let step = height / (column.len() + 1) as f32;
            nodes.extend(column.iter().enumerate().map(|(i, n)| PlacedNode {
                id: n.id,
                kind,
                x: column_x(kind),
                y: (i + 1) as f32 * step,
            }));
        }

        let positions: HashMap<usize, (f32, f32)> =
            nodes.iter().map(|n| (n.id, (n.x, n.y))).collect();
        let edges = snapshot
            .connections
            .iter()
            .filter_map(|c| {
                let start = *positions.get(&c.from)?;
                let end = *positions.get(&c.to)?;
                Some(PlacedEdge {
                    from: c.from,
                    to: c.to,
                    start,
                    end,
                    thickness: edge_thickness(c.weight),
                    polarity: Polarity::of(c.weight),
                })
            })
            .collect();

        Self { nodes, edges }
    }

    /// Node placed for `id`, if any.
    pub fn node(&self, id: usize) -> Option<&PlacedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
