use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use eframe::egui;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{info, warn};

use crate::config::TopologySettings;
use crate::dispatch::client::HttpTaskExecutor;
use crate::dispatch::{
    ActionRequest, CommandDispatcher, DialogKind, DispatchOutcome, DispatchPlan, Notification,
    NotificationLevel,
};
use crate::interaction::{ControllerEffect, InteractionEvent, TopologyController};
use crate::layout::{LayoutConfig, Point, Viewport};
use crate::render::TopologyRenderer;
use crate::render::commands::DrawCommandBatch;
use crate::topology::snapshot::SnapshotFetcher;
use crate::topology::watch::{
    SnapshotRefreshEvent, SnapshotWatchConfig, SnapshotWatchHandle, spawn_snapshot_watch_worker,
};
use crate::topology::{TopologyModelBuilder, TopologyNode};

pub mod painter;

use self::painter::paint_batch;

const APP_TITLE: &str = "Cluster topology";
const MAX_NOTIFICATIONS: usize = 6;
const NOTIFICATION_TTL: Duration = Duration::from_secs(6);
const ERROR_COLOR: egui::Color32 = egui::Color32::from_rgb(173, 33, 33);
const SUCCESS_COLOR: egui::Color32 = egui::Color32::from_rgb(26, 103, 64);

#[derive(Debug)]
enum ViewerCommand {
    Execute(ActionRequest),
    Shutdown,
}

#[derive(Debug)]
enum ViewerEvent {
    Dispatched(DispatchOutcome),
}

pub fn run_viewer(settings: &TopologySettings) -> Result<()> {
    let runtime_handle = Handle::try_current().context("viewer requires a tokio runtime")?;

    let fetcher = SnapshotFetcher::new(
        settings.snapshot_source.clone(),
        settings.request_timeout_ms,
        settings.fetch_max_retries,
    );
    let watch_config = SnapshotWatchConfig {
        poll_interval: Duration::from_millis(settings.refresh_interval_ms),
        debounce_interval: Duration::from_millis(settings.refresh_debounce_ms),
    };
    let (watch_handle, refresh_rx) =
        spawn_snapshot_watch_worker(&runtime_handle, fetcher, watch_config);

    let (command_tx, command_rx) = unbounded_channel::<ViewerCommand>();
    let (event_tx, event_rx) = unbounded_channel::<ViewerEvent>();
    let dispatcher = CommandDispatcher::new(HttpTaskExecutor::new(
        settings.task_api_url.clone(),
        settings.request_timeout_ms,
    ));
    spawn_dispatch_worker(
        &runtime_handle,
        dispatcher,
        command_rx,
        event_tx,
        watch_handle.clone(),
    );

    let controller = TopologyController::new(
        TopologyModelBuilder::new(settings.auto_expand_threshold),
        LayoutConfig::default(),
        TopologyRenderer::default(),
        settings.current_cluster_id.clone(),
        Viewport::default(),
    );

    info!(
        source = %settings.snapshot_source.describe(),
        task_api_url = %settings.task_api_url,
        refresh_interval_ms = settings.refresh_interval_ms,
        "starting topology viewer"
    );

    eframe::run_native(
        APP_TITLE,
        eframe::NativeOptions::default(),
        Box::new(move |_cc| {
            Ok(Box::new(TopologyViewerApp::new(
                controller,
                command_tx,
                event_rx,
                refresh_rx,
                watch_handle,
            )))
        }),
    )
    .map_err(|error| anyhow::anyhow!("viewer UI exited with error: {error}"))
}

fn spawn_dispatch_worker(
    handle: &Handle,
    dispatcher: CommandDispatcher<HttpTaskExecutor>,
    mut command_rx: UnboundedReceiver<ViewerCommand>,
    event_tx: UnboundedSender<ViewerEvent>,
    watch_handle: SnapshotWatchHandle,
) {
    let _task = handle.spawn(async move {
        while let Some(command) = command_rx.recv().await {
            match command {
                ViewerCommand::Execute(request) => {
                    let outcome = dispatcher.execute(request).await;
                    if outcome.refresh_requested {
                        watch_handle.request_refresh();
                    }
                    if event_tx.send(ViewerEvent::Dispatched(outcome)).is_err() {
                        break;
                    }
                }
                ViewerCommand::Shutdown => break,
            }
        }
    });
}

#[derive(Debug, Clone, PartialEq)]
enum PendingAction {
    Confirm {
        message: String,
        request: ActionRequest,
    },
    Dialog {
        dialog: DialogKind,
        request: ActionRequest,
        values: BTreeMap<String, String>,
        error: Option<String>,
    },
}

#[derive(Debug)]
enum PendingDecision {
    Cancel,
    Submit(ActionRequest),
}

#[derive(Debug, Clone)]
struct TimedNotification {
    notification: Notification,
    shown_at: Instant,
}

struct TopologyViewerApp {
    controller: TopologyController,
    command_tx: UnboundedSender<ViewerCommand>,
    event_rx: UnboundedReceiver<ViewerEvent>,
    refresh_rx: UnboundedReceiver<SnapshotRefreshEvent>,
    watch_handle: SnapshotWatchHandle,
    batch: Option<DrawCommandBatch>,
    dirty: bool,
    last_pointer: Option<Point>,
    pending: Option<PendingAction>,
    notifications: Vec<TimedNotification>,
    status_line: String,
    companion_scroll_target: Option<String>,
    dispatch_disconnected: bool,
    watch_disconnected: bool,
}

impl TopologyViewerApp {
    fn new(
        controller: TopologyController,
        command_tx: UnboundedSender<ViewerCommand>,
        event_rx: UnboundedReceiver<ViewerEvent>,
        refresh_rx: UnboundedReceiver<SnapshotRefreshEvent>,
        watch_handle: SnapshotWatchHandle,
    ) -> Self {
        Self {
            controller,
            command_tx,
            event_rx,
            refresh_rx,
            watch_handle,
            batch: None,
            dirty: true,
            last_pointer: None,
            pending: None,
            notifications: Vec::new(),
            status_line: "Waiting for the first snapshot...".to_owned(),
            companion_scroll_target: None,
            dispatch_disconnected: false,
            watch_disconnected: false,
        }
    }

    fn drain_refresh_events(&mut self) {
        loop {
            match self.refresh_rx.try_recv() {
                Ok(SnapshotRefreshEvent::Updated(update)) => {
                    if self
                        .controller
                        .apply_snapshot(&update.clusters, Some(update.revision))
                    {
                        self.dirty = true;
                        self.status_line = format!(
                            "Snapshot rev {} ({} visible nodes, trigger: {})",
                            update.revision,
                            self.controller.layout().nodes.len(),
                            update.trigger.label()
                        );
                    }
                }
                Ok(SnapshotRefreshEvent::Failed { trigger, error }) => {
                    self.status_line =
                        format!("Refresh failed (trigger: {}): {error}", trigger.label());
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.watch_disconnected {
                        warn!("snapshot watch worker disconnected");
                        self.push_notification(
                            NotificationLevel::Error,
                            "Snapshot refresh stopped; restart the viewer to resume.",
                        );
                    }
                    self.watch_disconnected = true;
                    break;
                }
            }
        }
    }

    fn drain_dispatch_events(&mut self) {
        loop {
            match self.event_rx.try_recv() {
                Ok(ViewerEvent::Dispatched(outcome)) => {
                    self.notifications.push(TimedNotification {
                        notification: outcome.notification,
                        shown_at: Instant::now(),
                    });
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.dispatch_disconnected {
                        warn!("dispatch worker disconnected");
                        self.push_notification(
                            NotificationLevel::Error,
                            "Command worker disconnected; actions are unavailable.",
                        );
                    }
                    self.dispatch_disconnected = true;
                    break;
                }
            }
        }
        expire_notifications(&mut self.notifications, Instant::now());
    }

    fn push_notification(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push(TimedNotification {
            notification: Notification {
                level,
                message: message.into(),
            },
            shown_at: Instant::now(),
        });
        expire_notifications(&mut self.notifications, Instant::now());
    }

    fn forward(&mut self, ctx: &egui::Context, event: InteractionEvent) {
        let effects = self.controller.handle_event(event);
        self.apply_effects(ctx, effects);
    }

    fn apply_effects(&mut self, ctx: &egui::Context, effects: Vec<ControllerEffect>) {
        for effect in effects {
            match effect {
                ControllerEffect::Redraw => self.dirty = true,
                ControllerEffect::Dispatch(plan) => self.begin_dispatch(plan),
                ControllerEffect::FocusCompanion { node_id } => {
                    self.dirty = true;
                    self.companion_scroll_target = Some(node_id);
                }
                ControllerEffect::FullscreenChanged(fullscreen) => {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(fullscreen));
                }
            }
        }
    }

    fn begin_dispatch(&mut self, plan: DispatchPlan) {
        self.pending = match plan {
            DispatchPlan::Ignore => return,
            DispatchPlan::ConfirmThenExecute { message, request } => {
                Some(PendingAction::Confirm { message, request })
            }
            DispatchPlan::OpenDialog { dialog, request } => Some(PendingAction::Dialog {
                dialog,
                request,
                values: BTreeMap::new(),
                error: None,
            }),
        };
    }

    fn submit(&mut self, request: ActionRequest) {
        if let Err(error) = self.command_tx.send(ViewerCommand::Execute(request)) {
            self.dispatch_disconnected = true;
            self.push_notification(
                NotificationLevel::Error,
                format!("Failed to hand the action to the command worker: {error}"),
            );
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let (escape, fullscreen) = ctx.input(|input| {
            (
                input.key_pressed(egui::Key::Escape),
                input.key_pressed(egui::Key::F11),
            )
        });
        if escape {
            if self.pending.is_some() {
                self.pending = None;
            } else {
                self.forward(ctx, InteractionEvent::Dismiss);
            }
        }
        if fullscreen {
            self.forward(ctx, InteractionEvent::ToggleFullscreen);
        }
    }

    fn render_toolbar(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        ui.horizontal(|ui| {
            let refresh_enabled = !self.watch_disconnected;
            if ui
                .add_enabled(refresh_enabled, egui::Button::new("Refresh"))
                .clicked()
            {
                self.watch_handle.request_refresh();
            }
            let label = if self.controller.view().fullscreen {
                "Exit fullscreen"
            } else {
                "Fullscreen"
            };
            if ui.button(label).clicked() {
                self.forward(&ctx, InteractionEvent::ToggleFullscreen);
            }
            ui.separator();
            ui.label(&self.status_line);
        });
    }

    fn render_companion_pane(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        ui.heading("Topology");
        ui.separator();

        let scroll_target = self.companion_scroll_target.take();
        let focused = self.controller.view().focused_node_id.clone();
        let mut focus_request = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            let clusters = &self.controller.tree().root.children;
            if clusters.is_empty() {
                ui.label("No clusters yet.");
            }
            for cluster in clusters {
                companion_rows(
                    ui,
                    cluster,
                    0,
                    focused.as_deref(),
                    scroll_target.as_deref(),
                    &mut focus_request,
                );
            }
        });

        if let Some(node_id) = focus_request
            && let Some(effect) = self.controller.focus_node(&node_id)
        {
            self.apply_effects(&ctx, vec![effect]);
        }
    }

    fn render_canvas(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click());
        let rect = response.rect;

        let viewport = Viewport {
            width: rect.width(),
            height: rect.height(),
        };
        if viewport != self.controller.view().viewport {
            self.forward(&ctx, InteractionEvent::Resized(viewport));
        }

        let to_local = |pos: egui::Pos2| Point::new(pos.x - rect.min.x, pos.y - rect.min.y);
        match response.hover_pos() {
            Some(pos) => {
                let point = to_local(pos);
                if self.last_pointer != Some(point) {
                    self.last_pointer = Some(point);
                    self.forward(&ctx, InteractionEvent::PointerMoved(point));
                }
            }
            None => {
                if self.last_pointer.take().is_some() {
                    self.forward(&ctx, InteractionEvent::PointerLeft);
                }
            }
        }
        if response.clicked()
            && let Some(pos) = response.interact_pointer_pos()
        {
            self.forward(&ctx, InteractionEvent::Clicked(to_local(pos)));
        }

        if self.dirty || self.batch.is_none() {
            self.batch = Some(self.controller.render());
            self.dirty = false;
        }
        if let Some(batch) = &self.batch {
            paint_batch(&painter, rect, batch);
        }
    }

    fn render_pending_action(&mut self, ctx: &egui::Context) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };

        let mut decision = None;
        match pending {
            PendingAction::Confirm { message, request } => {
                modal_window("Confirm action").show(ctx, |ui| {
                    ui.label(message.as_str());
                    ui.add_space(8.0);
                    ui.horizontal(|ui| {
                        if ui.button("Confirm").clicked() {
                            decision = Some(PendingDecision::Submit(request.clone()));
                        }
                        if ui.button("Cancel").clicked() {
                            decision = Some(PendingDecision::Cancel);
                        }
                    });
                });
            }
            PendingAction::Dialog {
                dialog,
                request,
                values,
                error,
            } => {
                let dialog = *dialog;
                modal_window(dialog.title()).show(ctx, |ui| {
                    for field in dialog.fields() {
                        ui.label(field.label);
                        let value = values.entry(field.key.to_owned()).or_default();
                        ui.add(egui::TextEdit::singleline(value).password(field.secret));
                    }
                    if let Some(error) = error.as_deref() {
                        ui.colored_label(ERROR_COLOR, error);
                    }
                    ui.add_space(8.0);
                    ui.horizontal(|ui| {
                        if ui.button("Submit").clicked() {
                            match dialog.payload(values) {
                                Ok(payload) => {
                                    let mut request = request.clone();
                                    request.confirmation_payload = Some(payload);
                                    decision = Some(PendingDecision::Submit(request));
                                }
                                Err(message) => *error = Some(message),
                            }
                        }
                        if ui.button("Cancel").clicked() {
                            decision = Some(PendingDecision::Cancel);
                        }
                    });
                });
            }
        }

        match decision {
            Some(PendingDecision::Submit(request)) => {
                self.pending = None;
                self.submit(request);
            }
            Some(PendingDecision::Cancel) => self.pending = None,
            None => {}
        }
    }

    fn render_notifications(&self, ui: &mut egui::Ui) {
        if self.notifications.is_empty() {
            ui.label("No recent actions.");
            return;
        }
        for entry in self.notifications.iter().rev() {
            let color = match entry.notification.level {
                NotificationLevel::Success => SUCCESS_COLOR,
                NotificationLevel::Error => ERROR_COLOR,
            };
            ui.colored_label(color, &entry.notification.message);
        }
    }
}

fn modal_window(title: &str) -> egui::Window<'static> {
    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
}

fn companion_rows(
    ui: &mut egui::Ui,
    node: &TopologyNode,
    depth: usize,
    focused: Option<&str>,
    scroll_target: Option<&str>,
    focus_request: &mut Option<String>,
) {
    let response = ui.selectable_label(
        focused == Some(node.id.as_str()),
        companion_label(node, depth),
    );
    if scroll_target == Some(node.id.as_str()) {
        response.scroll_to_me(Some(egui::Align::Center));
    }
    if response.clicked() {
        *focus_request = Some(node.id.clone());
    }
    for child in &node.children {
        companion_rows(ui, child, depth + 1, focused, scroll_target, focus_request);
    }
}

fn companion_label(node: &TopologyNode, depth: usize) -> String {
    format!(
        "{}{} [{}]",
        "    ".repeat(depth),
        node.display_name,
        node.status.as_deref().unwrap_or("-")
    )
}

/// Drops notifications older than the TTL and keeps only the newest few.
fn expire_notifications(notifications: &mut Vec<TimedNotification>, now: Instant) {
    notifications.retain(|entry| now.saturating_duration_since(entry.shown_at) < NOTIFICATION_TTL);
    if notifications.len() > MAX_NOTIFICATIONS {
        let extra = notifications.len() - MAX_NOTIFICATIONS;
        notifications.drain(0..extra);
    }
}

impl Drop for TopologyViewerApp {
    fn drop(&mut self) {
        let _ = self.command_tx.send(ViewerCommand::Shutdown);
        self.watch_handle.shutdown();
    }
}

impl eframe::App for TopologyViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_refresh_events();
        self.drain_dispatch_events();
        self.handle_keys(ctx);

        egui::TopBottomPanel::top("topology_toolbar").show(ctx, |ui| self.render_toolbar(ui));
        egui::TopBottomPanel::bottom("topology_notifications")
            .resizable(false)
            .show(ctx, |ui| self.render_notifications(ui));
        if !self.controller.view().fullscreen {
            egui::SidePanel::left("topology_companion")
                .resizable(true)
                .default_width(260.0)
                .show(ctx, |ui| self.render_companion_pane(ui));
        }
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.render_canvas(ui));
        self.render_pending_action(ctx);

        ctx.request_repaint_after(Duration::from_millis(120));
    }
}
