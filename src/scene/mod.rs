//! # Scene Graph and Composition Engine
//!
//! The scene is one optional background image plus an ordered list of nodes
//! (z-order, bottom first). The [`Composer`] owns the scene and is the only
//! way to mutate it: it assigns node ids, tracks pending image decodes,
//! maintains the background cover invariant, owns the selection and
//! publishes [`SceneEvent`]s to subscribers.

mod composer;
mod element;

pub use composer::{Composer, SceneEvent, Viewport};
pub use element::{
    Bounds, CellId, CellProduct, Element, Fit, GridCellElement, GuideLine, ImageElement, Node,
    NodeId, Role, Shadow, TextAlign, TextElement, Transform,
};

/// The drawable state: background first, then nodes in z-order.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub background: Option<Node>,
    pub nodes: Vec<Node>,
}

impl Scene {
    /// Background first, then nodes.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.background.iter().chain(self.nodes.iter())
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.iter().find(|n| n.id == id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.background.as_ref().is_some_and(|b| b.id == id) {
            return self.background.as_mut();
        }
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn is_background(&self, id: NodeId) -> bool {
        self.background.as_ref().is_some_and(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + usize::from(self.background.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
