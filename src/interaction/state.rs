use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::layout::{Point, Viewport};
use crate::topology::TopologyTree;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InteractionMode {
    #[default]
    Idle,
    Hovering {
        node_id: String,
    },
    MenuOpen {
        node_id: String,
        anchor: Point,
    },
    /// Held only while a toggle is being laid out again.
    Collapsing {
        node_id: String,
    },
}

/// View state that outlives tree rebuilds. Everything is keyed by node id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub mode: InteractionMode,
    pub collapsed: BTreeMap<String, bool>,
    pub pointer: Option<Point>,
    pub viewport: Viewport,
    pub fullscreen: bool,
    pub focused_node_id: Option<String>,
    seeded: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl ViewState {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            mode: InteractionMode::Idle,
            collapsed: BTreeMap::new(),
            pointer: None,
            viewport,
            fullscreen: false,
            focused_node_id: None,
            seeded: false,
        }
    }

    pub fn hovered_node_id(&self) -> Option<&str> {
        match &self.mode {
            InteractionMode::Hovering { node_id } => Some(node_id),
            _ => None,
        }
    }

    pub fn open_menu(&self) -> Option<(&str, Point)> {
        match &self.mode {
            InteractionMode::MenuOpen { node_id, anchor } => Some((node_id, *anchor)),
            _ => None,
        }
    }

    /// Pointer position while hovering with no menu open.
    pub fn tooltip_anchor(&self) -> Option<Point> {
        match self.mode {
            InteractionMode::Hovering { .. } => self.pointer,
            _ => None,
        }
    }

    /// Carries remembered collapse flags onto a freshly built tree.
    ///
    /// The first tree seen keeps the builder's defaults. Later trees take the
    /// stored flag for every id that still exists; new ids keep their defaults.
    /// The store is then rebuilt from the tree so vanished ids are dropped.
    pub fn merge_collapse_state(&mut self, tree: &mut TopologyTree) {
        if self.seeded {
            tree.root.visit_mut(&mut |node| {
                if node.collapsed.is_some()
                    && let Some(flag) = self.collapsed.get(&node.id)
                {
                    node.collapsed = Some(*flag);
                }
            });
        }

        self.collapsed = tree
            .root
            .descendants()
            .into_iter()
            .filter_map(|node| node.collapsed.map(|flag| (node.id.clone(), flag)))
            .collect();
        self.seeded = true;
    }

    /// Flips one node in both the store and the tree. Returns the new flag, or
    /// `None` when the node is missing or cannot collapse.
    pub fn toggle_collapsed(&mut self, tree: &mut TopologyTree, node_id: &str) -> Option<bool> {
        let node = tree.root.find_mut(node_id)?;
        let flag = !node.collapsed?;
        node.collapsed = Some(flag);
        self.collapsed.insert(node_id.to_owned(), flag);
        Some(flag)
    }

    /// Drops hover and menu state that points at nodes no longer on screen.
    pub fn prune_mode(&mut self, tree: &TopologyTree) {
        let visible = tree.root.visible_node_ids();
        let target = match &self.mode {
            InteractionMode::Idle => return,
            InteractionMode::Hovering { node_id }
            | InteractionMode::MenuOpen { node_id, .. }
            | InteractionMode::Collapsing { node_id } => node_id,
        };
        if !visible.iter().any(|id| id == target) {
            self.mode = InteractionMode::Idle;
        }
    }
}
