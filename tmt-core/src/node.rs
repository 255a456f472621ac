use serde::{Deserialize, Serialize};

/// A labeled clickable target. `x`/`y` hold abstract coordinates after
/// loading and drawing-surface pixels once the trial transform is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub order: u32,
    pub label: String,
    pub x: f32,
    pub y: f32,
}

impl Node {
    pub fn new(order: u32, label: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            order,
            label: label.into(),
            x,
            y,
        }
    }

    /// Nodes at or below `progress` have been clicked in sequence
    pub fn is_completed(&self, progress: u32) -> bool {
        self.order <= progress
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Read-only view of the running board handed to renderers.
/// `revision` changes whenever anything visible on the board changes.
#[derive(Debug, Clone, Copy)]
pub struct BoardView<'a> {
    pub nodes: &'a [Node],
    pub progress: u32,
    pub revision: u64,
    pub start_marker: Option<&'a str>,
}

impl BoardView<'_> {
    /// Nodes `1..=progress` in click order, the path drawn between them
    pub fn completed_path(&self) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .take_while(move |n| n.is_completed(self.progress))
    }
}
