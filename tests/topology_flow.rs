use cluster_topology::dispatch::DispatchPlan;
use cluster_topology::interaction::{ControllerEffect, InteractionEvent, TopologyController};
use cluster_topology::layout::{LayoutConfig, Point, Viewport, compute_layout};
use cluster_topology::menu::{self, ActionKey, MenuEntry};
use cluster_topology::render::commands::{DrawCommand, DrawCommandBatch, HitTarget};
use cluster_topology::render::text::{estimated_width, truncate_label};
use cluster_topology::test_support::{cluster_fixture, standby_fixture};
use cluster_topology::topology::{NodeKind, ROOT_NODE_ID, TopologyModelBuilder};

#[test]
fn builder_mirrors_snapshot_counts() {
    let clusters = vec![cluster_fixture("c1", &[3, 2]), standby_fixture("c2", &[4])];
    let tree = TopologyModelBuilder::default().build(&clusters, Some("c1"));

    assert_eq!(tree.root.id, ROOT_NODE_ID);
    assert_eq!(tree.root.children.len(), 2);
    assert_eq!(tree.root.count_kind(NodeKind::Root), 1);
    assert_eq!(tree.root.count_kind(NodeKind::Server), 9);
}

#[test]
fn oversized_single_zone_starts_collapsed_and_expands_on_toggle() {
    let mut controller = TopologyController::with_defaults(None, Viewport::default());
    controller.apply_snapshot(&[cluster_fixture("c1", &[10])], Some(1));

    let zone = controller.tree().find("zone1").expect("zone should exist");
    assert_eq!(zone.collapsed, Some(true));
    let cluster = controller.tree().find("c1").expect("cluster should exist");
    assert_eq!(cluster.collapsed, Some(false));
    assert_eq!(controller.layout().count_kind(NodeKind::Server), 0);

    assert!(controller.toggle_collapse("zone1"));

    assert_eq!(
        controller.tree().find("zone1").and_then(|zone| zone.collapsed),
        Some(false)
    );
    let layout = controller.layout();
    assert_eq!(layout.nodes.len(), 13);
    assert_eq!(layout.count_kind(NodeKind::Server), 10);
    assert_eq!(layout.count_kind(NodeKind::Zone), 1);
    assert_eq!(layout.count_kind(NodeKind::Cluster), 1);
    assert_eq!(layout.count_kind(NodeKind::Root), 1);
}

#[test]
fn toggling_twice_restores_the_rendered_node_set() {
    let mut controller = TopologyController::with_defaults(None, Viewport::default());
    controller.apply_snapshot(&[cluster_fixture("c1", &[3, 3])], Some(1));
    let before = controller.render();

    controller.toggle_collapse("zone2");
    controller.toggle_collapse("zone2");
    let after = controller.render();

    let ids = |batch: &DrawCommandBatch| {
        batch
            .diagram
            .iter()
            .map(|command| command.id().to_owned())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&before), ids(&after));
}

#[test]
fn refresh_preserves_visible_nodes() {
    let clusters = vec![cluster_fixture("c1", &[2, 2, 2])];
    let mut controller = TopologyController::with_defaults(None, Viewport::default());
    controller.apply_snapshot(&clusters, Some(1));
    controller.toggle_collapse("zone3");
    let visible = controller.tree().root.visible_node_ids();

    assert!(controller.apply_snapshot(&clusters, Some(2)));

    assert_eq!(controller.tree().root.visible_node_ids(), visible);
    assert!(!controller.apply_snapshot(&clusters, Some(2)));
}

#[test]
fn menus_never_start_or_end_with_dividers_and_are_never_empty() {
    let mut stopped = cluster_fixture("c1", &[1]);
    stopped.status = Some("STOPPED".to_owned());
    let mut unknown = cluster_fixture("c2", &[1]);
    unknown.status = Some("UPGRADING".to_owned());

    for (cluster, current) in [
        (cluster_fixture("c1", &[2]), "c1"),
        (stopped, "c1"),
        (unknown, "c2"),
        (standby_fixture("c3", &[1]), "other"),
    ] {
        let tree = TopologyModelBuilder::default()
            .build(std::slice::from_ref(&cluster), Some(current));
        for node in tree.root.descendants() {
            let entries = menu::resolve(node, tree.is_current_cluster(&node.id));
            assert!(!entries.is_empty(), "menu for {} should not be empty", node.id);
            assert!(!entries.first().is_some_and(MenuEntry::is_divider));
            assert!(!entries.last().is_some_and(MenuEntry::is_divider));
        }
    }
}

#[test]
fn stopped_cluster_menu_matches_rule_order() {
    let mut cluster = cluster_fixture("c1", &[1]);
    cluster.status = Some("STOPPED".to_owned());
    let tree = TopologyModelBuilder::default().build(&[cluster], None);
    let node = tree.find("c1").expect("cluster should exist");

    let raw = menu::raw_cluster_entries(node, true);
    assert_eq!(raw.len(), 4);
    assert!(raw[1].is_divider());

    let keys = menu::resolve(node, true)
        .iter()
        .filter_map(MenuEntry::item)
        .map(|item| item.key)
        .collect::<Vec<_>>();
    assert_eq!(keys, vec![ActionKey::Upgrade, ActionKey::Start, ActionKey::Delete]);
}

#[test]
fn server_operations_outside_the_allow_list_are_disabled() {
    let entries = menu::restrict_operations(
        &[
            ActionKey::Restart,
            ActionKey::StopProcess,
            ActionKey::StopService,
            ActionKey::Delete,
        ],
        &[ActionKey::Restart, ActionKey::StopProcess, ActionKey::StopService],
    );
    let items = entries.iter().filter_map(MenuEntry::item).collect::<Vec<_>>();

    assert_eq!(items.len(), 4);
    assert!(items[..3].iter().all(|item| item.enabled));
    assert_eq!(items[3].key, ActionKey::Delete);
    assert!(!items[3].enabled);
}

#[test]
fn truncated_labels_fit_their_budget() {
    let samples = [
        "",
        "z",
        "zone-with-a-rather-long-name-for-display",
        "区域一号机房的服务器组",
        "10.0.12.101:2882",
    ];
    for text in samples {
        for budget in [0.0_f32, 7.0, 21.0, 50.0, 140.0, 400.0] {
            let label = truncate_label(text, budget, 7.0);
            assert!(
                estimated_width(&label, 7.0) <= budget,
                "`{label}` should fit in {budget}px"
            );
            if estimated_width(text, 7.0) <= budget {
                assert_eq!(label, text);
            }
        }
    }
}

#[test]
fn clicking_through_the_menu_produces_a_dispatch_plan() {
    let mut controller = TopologyController::with_defaults(None, Viewport::default());
    controller.apply_snapshot(&[cluster_fixture("c1", &[2])], Some(1));
    let batch = controller.render();

    let more = batch
        .hit_regions
        .iter()
        .find(|region| {
            matches!(&region.target, HitTarget::MoreActions { node_id } if node_id == "zone1")
        })
        .expect("zone should expose a more-actions target");
    let center = Point::new(
        (more.bounds.min_x + more.bounds.max_x) / 2.0,
        (more.bounds.min_y + more.bounds.max_y) / 2.0,
    );
    controller.handle_event(InteractionEvent::Clicked(center));
    let batch = controller.render();
    assert!(batch.find("menu:panel").is_some());

    let restart = batch
        .hit_regions
        .iter()
        .find(|region| {
            matches!(&region.target, HitTarget::MenuItem { key, .. } if *key == ActionKey::Restart)
        })
        .expect("restart should be clickable");
    let effects = controller.handle_event(InteractionEvent::Clicked(Point::new(
        restart.bounds.min_x + 4.0,
        restart.bounds.min_y + 4.0,
    )));

    let plan = effects
        .into_iter()
        .find_map(|effect| match effect {
            ControllerEffect::Dispatch(plan) => Some(plan),
            _ => None,
        })
        .expect("menu click should produce a plan");
    match plan {
        DispatchPlan::ConfirmThenExecute { request, .. } => {
            assert_eq!(request.action_key, ActionKey::Restart);
            assert_eq!(request.target_kind, NodeKind::Zone);
            assert_eq!(request.target_id, "zone1");
            assert_eq!(request.cluster_id, "c1");
        }
        other => panic!("restart should ask for confirmation, got {other:?}"),
    }
    assert!(controller.view().open_menu().is_none());
}

#[test]
fn empty_snapshot_renders_an_empty_root() {
    let tree = TopologyModelBuilder::default().build(&[], None);
    let layout = compute_layout(&tree, &LayoutConfig::default());
    assert!(tree.is_empty());
    assert_eq!(layout.nodes.len(), 1);

    let mut controller = TopologyController::with_defaults(None, Viewport::default());
    controller.apply_snapshot(&[], Some(1));
    let batch = controller.render();
    assert!(
        batch
            .diagram
            .iter()
            .all(|command| !matches!(command, DrawCommand::Rect { .. }))
    );
}
