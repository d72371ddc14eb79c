//! Event-driven controller that owns the tree and the view state.
//!
//! Every method runs one event to completion: state transition, optional
//! layout pass, then the caller asks for a fresh batch. Nothing blocks and
//! nothing here is shared across threads.

use tracing::{debug, info, warn};

pub mod state;

use self::state::{InteractionMode, ViewState};
use crate::dispatch::{DispatchPlan, plan_action};
use crate::layout::{
    FitTransform, LayoutConfig, Point, TopologyLayout, Viewport, compute_layout, fit_to_viewport,
};
use crate::menu::{self, MenuEntry};
use crate::render::commands::{DrawCommandBatch, HitRegion, HitTarget, hit_test};
use crate::render::{RenderInput, TopologyRenderer};
use crate::topology::snapshot::ClusterSnapshot;
use crate::topology::{NodeKind, TopologyModelBuilder, TopologyNode, TopologyTree};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionEvent {
    PointerMoved(Point),
    PointerLeft,
    Clicked(Point),
    /// Escape or an outside click that the host handled itself.
    Dismiss,
    Resized(Viewport),
    ToggleFullscreen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEffect {
    Redraw,
    Dispatch(DispatchPlan),
    FocusCompanion { node_id: String },
    FullscreenChanged(bool),
}

#[derive(Debug)]
pub struct TopologyController {
    builder: TopologyModelBuilder,
    layout_config: LayoutConfig,
    renderer: TopologyRenderer,
    current_cluster_id: Option<String>,
    tree: TopologyTree,
    layout: TopologyLayout,
    transform: FitTransform,
    view: ViewState,
    hit_regions: Option<Vec<HitRegion>>,
    applied_revision: Option<u64>,
    render_sequence: u64,
    layout_passes: u64,
}

impl TopologyController {
    pub fn new(
        builder: TopologyModelBuilder,
        layout_config: LayoutConfig,
        renderer: TopologyRenderer,
        current_cluster_id: Option<String>,
        viewport: Viewport,
    ) -> Self {
        let tree = builder.build(&[], current_cluster_id.as_deref());
        let layout = compute_layout(&tree, &layout_config);
        let transform = fit_to_viewport(&layout, viewport, &layout_config);
        Self {
            builder,
            layout_config,
            renderer,
            current_cluster_id,
            tree,
            layout,
            transform,
            view: ViewState::new(viewport),
            hit_regions: None,
            applied_revision: None,
            render_sequence: 0,
            layout_passes: 0,
        }
    }

    pub fn with_defaults(current_cluster_id: Option<String>, viewport: Viewport) -> Self {
        Self::new(
            TopologyModelBuilder::default(),
            LayoutConfig::default(),
            TopologyRenderer::default(),
            current_cluster_id,
            viewport,
        )
    }

    pub fn tree(&self) -> &TopologyTree {
        &self.tree
    }

    pub fn layout(&self) -> &TopologyLayout {
        &self.layout
    }

    pub fn transform(&self) -> FitTransform {
        self.transform
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn applied_revision(&self) -> Option<u64> {
        self.applied_revision
    }

    pub fn layout_passes(&self) -> u64 {
        self.layout_passes
    }

    /// Rebuilds the tree from a snapshot and carries the view state over.
    /// Returns `false` when `revision` is not newer than the applied one.
    pub fn apply_snapshot(&mut self, clusters: &[ClusterSnapshot], revision: Option<u64>) -> bool {
        if let (Some(revision), Some(applied)) = (revision, self.applied_revision)
            && revision <= applied
        {
            warn!(revision, applied, "ignoring stale topology snapshot");
            return false;
        }

        let mut tree = self
            .builder
            .build(clusters, self.current_cluster_id.as_deref());
        self.view.merge_collapse_state(&mut tree);
        self.tree = tree;
        if revision.is_some() {
            self.applied_revision = revision;
        }
        self.relayout();
        self.view.prune_mode(&self.tree);

        info!(
            cluster_count = self.tree.root.children.len(),
            node_count = self.layout.nodes.len(),
            revision = revision.unwrap_or(0),
            "topology rebuilt"
        );
        true
    }

    pub fn handle_event(&mut self, event: InteractionEvent) -> Vec<ControllerEffect> {
        match event {
            InteractionEvent::PointerMoved(point) => self.pointer_moved(point),
            InteractionEvent::PointerLeft => {
                self.view.pointer = None;
                if self.view.hovered_node_id().is_some() {
                    self.set_mode(InteractionMode::Idle);
                    return vec![ControllerEffect::Redraw];
                }
                Vec::new()
            }
            InteractionEvent::Clicked(point) => self.clicked(point),
            InteractionEvent::Dismiss => {
                if self.view.open_menu().is_some() {
                    self.set_mode(InteractionMode::Idle);
                    return vec![ControllerEffect::Redraw];
                }
                Vec::new()
            }
            InteractionEvent::Resized(viewport) => {
                self.resize(viewport);
                vec![ControllerEffect::Redraw]
            }
            InteractionEvent::ToggleFullscreen => {
                let fullscreen = self.toggle_fullscreen();
                vec![
                    ControllerEffect::FullscreenChanged(fullscreen),
                    ControllerEffect::Redraw,
                ]
            }
        }
    }

    fn pointer_moved(&mut self, point: Point) -> Vec<ControllerEffect> {
        self.view.pointer = Some(point);
        if matches!(
            self.view.mode,
            InteractionMode::MenuOpen { .. } | InteractionMode::Collapsing { .. }
        ) {
            return Vec::new();
        }

        let target = hit_test(self.hit_regions(), point).cloned();
        let hovered = target
            .as_ref()
            .map(HitTarget::node_id)
            .and_then(|node_id| self.tree.find(node_id))
            .filter(|node| matches!(node.kind, NodeKind::Zone | NodeKind::Server))
            .map(|node| node.id.clone());

        match hovered {
            Some(node_id) => {
                // The tooltip tracks the pointer, so every move inside a node redraws.
                self.view.mode = InteractionMode::Hovering { node_id };
                vec![ControllerEffect::Redraw]
            }
            None if self.view.hovered_node_id().is_some() => {
                self.set_mode(InteractionMode::Idle);
                vec![ControllerEffect::Redraw]
            }
            None => Vec::new(),
        }
    }

    fn clicked(&mut self, point: Point) -> Vec<ControllerEffect> {
        let target = hit_test(self.hit_regions(), point).cloned();
        match target {
            Some(HitTarget::MenuItem { node_id, key }) => {
                self.set_mode(InteractionMode::Idle);
                let plan = match self.tree.find(&node_id) {
                    Some(node) => plan_action(key, node, &self.tree),
                    None => DispatchPlan::Ignore,
                };
                debug!(node_id = %node_id, action = key.as_str(), "menu item chosen");
                if plan == DispatchPlan::Ignore {
                    vec![ControllerEffect::Redraw]
                } else {
                    vec![ControllerEffect::Redraw, ControllerEffect::Dispatch(plan)]
                }
            }
            Some(HitTarget::MenuPanel { .. }) => Vec::new(),
            Some(HitTarget::MoreActions { node_id }) => {
                debug!(node_id = %node_id, "opening action menu");
                self.set_mode(InteractionMode::MenuOpen {
                    node_id,
                    anchor: point,
                });
                vec![ControllerEffect::Redraw]
            }
            Some(HitTarget::CollapseToggle { node_id }) => {
                if self.toggle_collapse(&node_id) {
                    vec![ControllerEffect::Redraw]
                } else {
                    Vec::new()
                }
            }
            Some(HitTarget::NodeBox { .. }) | None => {
                if self.view.open_menu().is_some() {
                    self.set_mode(InteractionMode::Idle);
                    return vec![ControllerEffect::Redraw];
                }
                Vec::new()
            }
        }
    }

    /// Flips a collapsible node and lays the tree out again. An open menu on
    /// a node that stays visible is kept open.
    pub fn toggle_collapse(&mut self, node_id: &str) -> bool {
        let pinned = self.pin_menu(&self.view.mode);
        let previous = std::mem::replace(
            &mut self.view.mode,
            InteractionMode::Collapsing {
                node_id: node_id.to_owned(),
            },
        );

        let Some(collapsed) = self.view.toggle_collapsed(&mut self.tree, node_id) else {
            self.view.mode = previous;
            return false;
        };
        debug!(node_id, collapsed, "toggled node");
        self.relayout();

        self.view.mode = match previous {
            InteractionMode::MenuOpen { node_id, anchor } => InteractionMode::MenuOpen {
                anchor: self.pinned_anchor(pinned.as_ref()).unwrap_or(anchor),
                node_id,
            },
            _ => InteractionMode::Idle,
        };
        self.view.prune_mode(&self.tree);
        true
    }

    /// Records the node the host should bring into focus in its list view,
    /// expanding collapsed ancestors so the node is on screen.
    pub fn focus_node(&mut self, node_id: &str) -> Option<ControllerEffect> {
        let path = ancestor_ids(&self.tree, node_id)?;
        let mut expanded = false;
        for ancestor in &path {
            if self
                .tree
                .find(ancestor)
                .is_some_and(|node| node.is_collapsed())
            {
                self.view.toggle_collapsed(&mut self.tree, ancestor);
                expanded = true;
            }
        }
        if expanded {
            self.relayout();
        }

        self.view.focused_node_id = Some(node_id.to_owned());
        Some(ControllerEffect::FocusCompanion {
            node_id: node_id.to_owned(),
        })
    }

    pub fn toggle_fullscreen(&mut self) -> bool {
        self.view.fullscreen = !self.view.fullscreen;
        self.refit();
        self.view.fullscreen
    }

    /// Geometry only: the tree and layout are left as they are.
    pub fn resize(&mut self, viewport: Viewport) {
        self.view.viewport = viewport;
        self.refit();
    }

    /// Fresh menu for `node_id`; never cached.
    pub fn resolve_menu(&self, node_id: &str) -> Option<Vec<MenuEntry>> {
        let node = self.tree.find(node_id)?;
        Some(menu::resolve(
            node,
            node.kind == NodeKind::Cluster && self.tree.is_current_cluster(node_id),
        ))
    }

    pub fn render(&mut self) -> DrawCommandBatch {
        self.render_sequence = self.render_sequence.saturating_add(1);
        let batch = self.compose(self.render_sequence);
        self.hit_regions = Some(batch.hit_regions.clone());
        batch
    }

    fn compose(&self, sequence: u64) -> DrawCommandBatch {
        self.renderer.render(RenderInput {
            tree: &self.tree,
            layout: &self.layout,
            transform: self.transform,
            view: &self.view,
            sequence,
        })
    }

    fn hit_regions(&mut self) -> &[HitRegion] {
        if self.hit_regions.is_none() {
            self.hit_regions = Some(self.compose(self.render_sequence).hit_regions);
        }
        self.hit_regions.as_deref().unwrap_or_default()
    }

    fn set_mode(&mut self, mode: InteractionMode) {
        self.view.mode = mode;
        self.hit_regions = None;
    }

    fn relayout(&mut self) {
        let pinned = self.pin_menu(&self.view.mode);
        self.layout = compute_layout(&self.tree, &self.layout_config);
        self.layout_passes = self.layout_passes.saturating_add(1);
        self.refit_with(pinned);
    }

    fn refit(&mut self) {
        let pinned = self.pin_menu(&self.view.mode);
        self.refit_with(pinned);
    }

    fn refit_with(&mut self, pinned: Option<PinnedMenu>) {
        self.transform = fit_to_viewport(&self.layout, self.view.viewport, &self.layout_config);
        self.hit_regions = None;
        if let Some(anchor) = self.pinned_anchor(pinned.as_ref())
            && let InteractionMode::MenuOpen {
                anchor: current, ..
            } = &mut self.view.mode
        {
            *current = anchor;
        }
    }

    /// Records where an open menu sits relative to its node, in layout units.
    fn pin_menu(&self, mode: &InteractionMode) -> Option<PinnedMenu> {
        let InteractionMode::MenuOpen { node_id, anchor } = mode else {
            return None;
        };
        let node_anchor = self.layout.anchor_of(node_id)?;
        let point = self.transform.invert(*anchor);
        Some(PinnedMenu {
            node_id: node_id.clone(),
            offset: Point::new(point.x - node_anchor.x, point.y - node_anchor.y),
        })
    }

    /// Screen anchor that keeps a pinned menu on its node under the current
    /// layout and transform.
    fn pinned_anchor(&self, pinned: Option<&PinnedMenu>) -> Option<Point> {
        let pinned = pinned?;
        let node_anchor = self.layout.anchor_of(&pinned.node_id)?;
        Some(
            self.transform
                .apply(node_anchor.offset(pinned.offset.x, pinned.offset.y)),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PinnedMenu {
    node_id: String,
    offset: Point,
}

/// Ids from the root down to the parent of `node_id`.
fn ancestor_ids(tree: &TopologyTree, node_id: &str) -> Option<Vec<String>> {
    fn walk(node: &TopologyNode, target: &str, path: &mut Vec<String>) -> bool {
        if node.id == target {
            return true;
        }
        path.push(node.id.clone());
        if node.children.iter().any(|child| walk(child, target, path)) {
            return true;
        }
        path.pop();
        false
    }

    let mut path = Vec::new();
    walk(&tree.root, node_id, &mut path).then_some(path)
}

#[cfg(test)]
mod tests {
    use crate::dispatch::DispatchPlan;
    use crate::layout::{Point, Viewport};
    use crate::render::commands::{DrawCommandBatch, HitTarget};
    use crate::test_support::{cluster_fixture, standby_fixture};
    use crate::topology::NodeKind;

    use super::state::InteractionMode;
    use super::{ControllerEffect, InteractionEvent, TopologyController};

    #[test]
    fn ten_server_zone_starts_collapsed_and_expands_on_toggle() {
        let mut controller = controller(&[10]);
        assert_eq!(controller.tree().find("zone1").and_then(|node| node.collapsed), Some(true));
        assert_eq!(controller.layout().nodes.len(), 3);

        let toggle = center_of(&controller.render(), |target| {
            matches!(target, HitTarget::CollapseToggle { node_id } if node_id == "zone1")
        });
        let effects = controller.handle_event(InteractionEvent::Clicked(toggle));

        assert_eq!(effects, vec![ControllerEffect::Redraw]);
        assert_eq!(controller.tree().find("zone1").and_then(|node| node.collapsed), Some(false));
        assert_eq!(controller.layout().count_kind(NodeKind::Server), 10);
        assert_eq!(controller.layout().nodes.len(), 13);
    }

    #[test]
    fn toggling_twice_restores_visible_nodes() {
        let mut controller = controller(&[2, 2]);
        let before = controller.tree().root.visible_node_ids();

        assert!(controller.toggle_collapse("zone2"));
        assert_ne!(controller.tree().root.visible_node_ids(), before);
        assert!(controller.toggle_collapse("zone2"));
        assert_eq!(controller.tree().root.visible_node_ids(), before);
        assert!(!controller.toggle_collapse("server:c1-z1-s1"));
    }

    #[test]
    fn refresh_keeps_user_collapse_choices() {
        let mut controller = controller(&[10]);
        controller.toggle_collapse("zone1");
        let before = controller.tree().root.visible_node_ids();

        assert!(controller.apply_snapshot(&[cluster_fixture("c1", &[10])], Some(2)));
        assert_eq!(controller.tree().root.visible_node_ids(), before);
    }

    #[test]
    fn stale_revisions_are_ignored() {
        let mut controller = controller(&[1]);
        assert!(!controller.apply_snapshot(&[cluster_fixture("c1", &[5])], Some(1)));
        assert_eq!(controller.layout().count_kind(NodeKind::Server), 1);
        assert!(controller.apply_snapshot(&[cluster_fixture("c1", &[5])], Some(3)));
        assert!(!controller.apply_snapshot(&[cluster_fixture("c1", &[2])], Some(2)));
        assert_eq!(controller.applied_revision(), Some(3));
        assert_eq!(controller.layout().count_kind(NodeKind::Server), 5);
    }

    #[test]
    fn hovering_zone_shows_tooltip_but_cluster_does_not() {
        let mut controller = controller(&[2]);
        let batch = controller.render();

        let cluster = center_of(&batch, |target| {
            matches!(target, HitTarget::NodeBox { node_id } if node_id == "c1")
        });
        assert!(controller.handle_event(InteractionEvent::PointerMoved(cluster)).is_empty());
        assert_eq!(controller.view().mode, InteractionMode::Idle);

        let zone = center_of(&batch, |target| {
            matches!(target, HitTarget::NodeBox { node_id } if node_id == "zone1")
        });
        controller.handle_event(InteractionEvent::PointerMoved(zone));
        assert_eq!(controller.view().hovered_node_id(), Some("zone1"));
        assert!(controller.render().find("tooltip:panel").is_some());

        controller.handle_event(InteractionEvent::PointerLeft);
        assert_eq!(controller.view().mode, InteractionMode::Idle);
    }

    #[test]
    fn menu_open_suppresses_hover_and_survives_unrelated_toggle() {
        let mut controller = controller(&[2, 2]);
        let batch = controller.render();
        let more = center_of(&batch, |target| {
            matches!(target, HitTarget::MoreActions { node_id } if node_id == "zone1")
        });
        controller.handle_event(InteractionEvent::Clicked(more));
        assert!(matches!(
            controller.view().mode,
            InteractionMode::MenuOpen { ref node_id, .. } if node_id == "zone1"
        ));

        let zone2 = center_of(&batch, |target| {
            matches!(target, HitTarget::NodeBox { node_id } if node_id == "zone2")
        });
        assert!(controller.handle_event(InteractionEvent::PointerMoved(zone2)).is_empty());
        assert!(controller.render().find("tooltip:panel").is_none());

        assert!(controller.toggle_collapse("zone2"));
        assert!(controller.view().open_menu().is_some());
        assert!(controller.render().find("menu:panel").is_some());

        controller.handle_event(InteractionEvent::Dismiss);
        assert_eq!(controller.view().mode, InteractionMode::Idle);
    }

    #[test]
    fn open_menu_follows_its_node_through_relayout_and_resize() {
        let mut controller = controller(&[2, 2, 2]);
        let more = center_of(&controller.render(), |target| {
            matches!(target, HitTarget::MoreActions { node_id } if node_id == "zone3")
        });
        controller.handle_event(InteractionEvent::Clicked(more));

        assert!(controller.toggle_collapse("zone1"));
        let moved = center_of(&controller.render(), |target| {
            matches!(target, HitTarget::MoreActions { node_id } if node_id == "zone3")
        });
        assert_ne!(moved, more, "zone3 should move when zone1 collapses");
        let (_, anchor) = controller.view().open_menu().expect("menu should stay open");
        assert!((anchor.x - moved.x).abs() < 0.01 && (anchor.y - moved.y).abs() < 0.01);

        controller.resize(Viewport {
            width: 700.0,
            height: 500.0,
        });
        let resized = center_of(&controller.render(), |target| {
            matches!(target, HitTarget::MoreActions { node_id } if node_id == "zone3")
        });
        let (_, anchor) = controller.view().open_menu().expect("menu should stay open");
        assert!((anchor.x - resized.x).abs() < 0.01 && (anchor.y - resized.y).abs() < 0.01);
    }

    #[test]
    fn choosing_a_menu_item_closes_menu_and_plans_dispatch() {
        let mut controller = controller(&[2]);
        let more = center_of(&controller.render(), |target| {
            matches!(target, HitTarget::MoreActions { node_id } if node_id == "zone1")
        });
        controller.handle_event(InteractionEvent::Clicked(more));

        let restart = center_of(&controller.render(), |target| {
            matches!(target, HitTarget::MenuItem { node_id, .. } if node_id == "zone1")
        });
        let effects = controller.handle_event(InteractionEvent::Clicked(restart));

        assert_eq!(controller.view().mode, InteractionMode::Idle);
        let Some(ControllerEffect::Dispatch(DispatchPlan::ConfirmThenExecute { request, .. })) =
            effects.last()
        else {
            panic!("menu click should plan a dispatch, got {effects:?}");
        };
        assert_eq!(request.target_id, "zone1");
        // Dispatch never touches the model.
        assert_eq!(
            controller.tree().find("zone1").and_then(|node| node.status.as_deref()),
            Some("RUNNING")
        );
    }

    #[test]
    fn clicking_empty_space_closes_menu() {
        let mut controller = controller(&[1]);
        let more = center_of(&controller.render(), |target| {
            matches!(target, HitTarget::MoreActions { node_id } if node_id == "c1")
        });
        controller.handle_event(InteractionEvent::Clicked(more));
        assert!(controller.view().open_menu().is_some());

        let effects = controller.handle_event(InteractionEvent::Clicked(Point::new(1.0, 799.0)));
        assert_eq!(effects, vec![ControllerEffect::Redraw]);
        assert!(controller.view().open_menu().is_none());
    }

    #[test]
    fn resize_and_fullscreen_refit_without_layout_pass() {
        let mut controller = controller(&[3, 3]);
        let passes = controller.layout_passes();
        let before = controller.transform();

        controller.handle_event(InteractionEvent::Resized(Viewport {
            width: 600.0,
            height: 400.0,
        }));
        assert_ne!(controller.transform(), before);
        let effects = controller.handle_event(InteractionEvent::ToggleFullscreen);
        assert_eq!(effects[0], ControllerEffect::FullscreenChanged(true));
        assert_eq!(controller.layout_passes(), passes);
    }

    #[test]
    fn focus_node_reveals_hidden_node() {
        let mut controller =
            TopologyController::with_defaults(Some("c1".to_owned()), Viewport::default());
        controller.apply_snapshot(
            &[cluster_fixture("c1", &[1]), standby_fixture("c2", &[2])],
            Some(1),
        );
        assert!(!controller.tree().root.visible_node_ids().contains(&"c2/zone1".to_owned()));

        let effect = controller.focus_node("server:c2/c2-z1-s2");
        assert_eq!(
            effect,
            Some(ControllerEffect::FocusCompanion {
                node_id: "server:c2/c2-z1-s2".to_owned()
            })
        );
        assert!(
            controller
                .tree()
                .root
                .visible_node_ids()
                .contains(&"server:c2/c2-z1-s2".to_owned())
        );
        assert_eq!(controller.focus_node("missing"), None);
    }

    #[test]
    fn empty_snapshot_is_a_valid_view() {
        let mut controller = TopologyController::with_defaults(None, Viewport::default());
        assert!(controller.apply_snapshot(&[], Some(1)));
        let batch = controller.render();
        assert!(batch.diagram.is_empty());
        assert!(batch.hit_regions.is_empty());
    }

    fn controller(servers_per_zone: &[usize]) -> TopologyController {
        let mut controller =
            TopologyController::with_defaults(Some("c1".to_owned()), Viewport::default());
        controller.apply_snapshot(&[cluster_fixture("c1", servers_per_zone)], Some(1));
        controller
    }

    fn center_of(batch: &DrawCommandBatch, predicate: impl Fn(&HitTarget) -> bool) -> Point {
        let region = batch
            .hit_regions
            .iter()
            .find(|region| predicate(&region.target))
            .expect("hit region should exist");
        Point::new(
            (region.bounds.min_x + region.bounds.max_x) / 2.0,
            (region.bounds.min_y + region.bounds.max_y) / 2.0,
        )
    }
}
