use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use cluster_topology::config::TopologySettings;
use cluster_topology::interaction::TopologyController;
use cluster_topology::layout::{LayoutConfig, Viewport};
use cluster_topology::render::TopologyRenderer;
use cluster_topology::server::{MenuResponse, RenderResponse, run_http_server};
use cluster_topology::topology::TopologyModelBuilder;
use cluster_topology::topology::snapshot::{ClusterSnapshot, SnapshotFetcher, SnapshotSource};
use cluster_topology::viewer::run_viewer;

const DEFAULT_LOG_FILTER: &str = "info,cluster_topology=debug";
const DEFAULT_FILE_LOG_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "cluster-topology.log";

#[derive(Debug, Parser)]
#[command(
    name = "cluster-topology",
    about = "Lay out, render and operate database cluster topologies"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Lay out a snapshot and print the layout and draw batch as JSON.
    Render {
        /// Snapshot file or http(s) URL. Overrides TOPOLOGY_SNAPSHOT_SOURCE.
        #[arg(long)]
        snapshot: Option<String>,
        /// Id of the current cluster. Overrides TOPOLOGY_CURRENT_CLUSTER.
        #[arg(long)]
        cluster: Option<String>,
        #[arg(long, default_value_t = 1200.0)]
        width: f32,
        #[arg(long, default_value_t = 800.0)]
        height: f32,
        /// Node id to expand; repeatable.
        #[arg(long = "expand")]
        expand: Vec<String>,
        /// Node id to collapse; repeatable.
        #[arg(long = "collapse")]
        collapse: Vec<String>,
        #[arg(long)]
        pretty: bool,
    },
    /// Print the action menu of one node as JSON.
    Menu {
        #[arg(long)]
        snapshot: Option<String>,
        #[arg(long)]
        cluster: Option<String>,
        #[arg(long)]
        node: String,
        #[arg(long)]
        pretty: bool,
    },
    /// Serve the headless render API.
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: String,
    },
    /// Open the desktop viewer.
    View {
        #[arg(long)]
        snapshot: Option<String>,
        #[arg(long)]
        cluster: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_tracing()?;

    let cli = Cli::parse();
    let mut settings = TopologySettings::from_env().context("failed to load configuration")?;

    match cli.command {
        Commands::Render {
            snapshot,
            cluster,
            width,
            height,
            expand,
            collapse,
            pretty,
        } => {
            apply_overrides(&mut settings, snapshot, cluster);
            let clusters = load_snapshot(&settings).await?;
            let response = render_snapshot(
                &settings,
                &clusters,
                Viewport { width, height },
                &expand,
                &collapse,
            )?;
            print_json(&response, pretty)?;
        }
        Commands::Menu {
            snapshot,
            cluster,
            node,
            pretty,
        } => {
            apply_overrides(&mut settings, snapshot, cluster);
            let clusters = load_snapshot(&settings).await?;
            let response = resolve_menu(&settings, &clusters, node)?;
            print_json(&response, pretty)?;
        }
        Commands::Serve { bind } => run_http_server(&settings, &bind).await?,
        Commands::View { snapshot, cluster } => {
            apply_overrides(&mut settings, snapshot, cluster);
            tokio::task::block_in_place(|| run_viewer(&settings))?;
        }
    }

    Ok(())
}

fn apply_overrides(
    settings: &mut TopologySettings,
    snapshot: Option<String>,
    cluster: Option<String>,
) {
    if let Some(snapshot) = snapshot {
        settings.snapshot_source = SnapshotSource::parse(&snapshot);
    }
    if cluster.is_some() {
        settings.current_cluster_id = cluster;
    }
}

async fn load_snapshot(settings: &TopologySettings) -> Result<Vec<ClusterSnapshot>> {
    let fetcher = SnapshotFetcher::new(
        settings.snapshot_source.clone(),
        settings.request_timeout_ms,
        settings.fetch_max_retries,
    );
    let clusters = fetcher.fetch().await.with_context(|| {
        format!(
            "failed to load snapshot from {}",
            settings.snapshot_source.describe()
        )
    })?;
    info!(
        source = %settings.snapshot_source.describe(),
        cluster_count = clusters.len(),
        "loaded snapshot"
    );
    Ok(clusters)
}

fn controller_for(settings: &TopologySettings, viewport: Viewport) -> TopologyController {
    TopologyController::new(
        TopologyModelBuilder::new(settings.auto_expand_threshold),
        LayoutConfig::default(),
        TopologyRenderer::default(),
        settings.current_cluster_id.clone(),
        viewport,
    )
}

fn render_snapshot(
    settings: &TopologySettings,
    clusters: &[ClusterSnapshot],
    viewport: Viewport,
    expand: &[String],
    collapse: &[String],
) -> Result<RenderResponse> {
    let mut controller = controller_for(settings, viewport);
    controller.apply_snapshot(clusters, None);

    for node_id in expand {
        set_collapsed(&mut controller, node_id, false)?;
    }
    for node_id in collapse {
        set_collapsed(&mut controller, node_id, true)?;
    }

    Ok(RenderResponse {
        current_cluster_id: controller.tree().current_cluster_id.clone(),
        batch: controller.render(),
        layout: controller.layout().clone(),
    })
}

fn set_collapsed(
    controller: &mut TopologyController,
    node_id: &str,
    collapsed: bool,
) -> Result<()> {
    let current = controller
        .tree()
        .find(node_id)
        .ok_or_else(|| anyhow!("unknown node `{node_id}`"))?
        .collapsed;
    match current {
        None => bail!("node `{node_id}` cannot be collapsed"),
        Some(current) if current != collapsed => {
            controller.toggle_collapse(node_id);
        }
        Some(_) => {}
    }
    Ok(())
}

fn resolve_menu(
    settings: &TopologySettings,
    clusters: &[ClusterSnapshot],
    node_id: String,
) -> Result<MenuResponse> {
    let mut controller = controller_for(settings, Viewport::default());
    controller.apply_snapshot(clusters, None);

    let kind = controller
        .tree()
        .find(&node_id)
        .map(|node| node.kind)
        .ok_or_else(|| anyhow!("unknown node `{node_id}`"))?;
    let entries = controller
        .resolve_menu(&node_id)
        .ok_or_else(|| anyhow!("unknown node `{node_id}`"))?;

    Ok(MenuResponse {
        node_id,
        kind,
        entries,
    })
}

fn print_json(value: &impl Serialize, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("failed to serialize output")?;
    println!("{rendered}");
    Ok(())
}

/// Console logs go to stderr so stdout stays machine-readable. When
/// `TOPOLOGY_LOG_DIR` is set a daily-rolling file log is added; the returned
/// guard flushes it on drop.
fn init_tracing() -> Result<Option<WorkerGuard>> {
    // TOPOLOGY_LOG_DIR may live in .env.
    let _ = dotenvy::dotenv();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(env_filter);

    let Some(log_dir) = std::env::var_os("TOPOLOGY_LOG_DIR").filter(|dir| !dir.is_empty()) else {
        tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .map_err(|error| anyhow!("failed to initialize tracing subscriber: {error}"))?;
        return Ok(None);
    };

    let file_filter = EnvFilter::try_from_env("TOPOLOGY_FILE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILE_LOG_FILTER));
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize tracing subscriber: {error}"))?;
    Ok(Some(guard))
}
