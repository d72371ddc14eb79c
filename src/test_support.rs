use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::topology::snapshot::{
    ClusterRole, ClusterSnapshot, ServerSnapshot, TenantSnapshot, ZoneSnapshot,
};

pub fn temp_path(prefix: &str) -> PathBuf {
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "cluster_topology_{prefix}_{}_{}",
        std::process::id(),
        now_ns
    ))
}

pub fn remove_dir_if_exists(path: &Path) {
    let _ = std::fs::remove_dir_all(path);
}

/// A running primary cluster with one zone per entry of `servers_per_zone`.
/// Zones are named `zone1..`, servers get ids `{cluster}-z{zone}-s{server}`.
pub fn cluster_fixture(cluster_id: &str, servers_per_zone: &[usize]) -> ClusterSnapshot {
    ClusterSnapshot {
        id: cluster_id.to_owned(),
        name: format!("{cluster_id}-name"),
        status: Some("RUNNING".to_owned()),
        ob_version: Some("4.2.1.0".to_owned()),
        role: ClusterRole::Primary,
        auto_detect_enabled: false,
        zones: servers_per_zone
            .iter()
            .enumerate()
            .map(|(zone_index, server_count)| {
                zone_fixture(cluster_id, zone_index + 1, *server_count)
            })
            .collect(),
        tenants: vec![TenantSnapshot {
            name: "sys".to_owned(),
            status: Some("RUNNING".to_owned()),
        }],
    }
}

pub fn standby_fixture(cluster_id: &str, servers_per_zone: &[usize]) -> ClusterSnapshot {
    ClusterSnapshot {
        role: ClusterRole::Standby,
        ..cluster_fixture(cluster_id, servers_per_zone)
    }
}

fn zone_fixture(cluster_id: &str, zone_number: usize, server_count: usize) -> ZoneSnapshot {
    ZoneSnapshot {
        name: format!("zone{zone_number}"),
        region_name: Some("region-a".to_owned()),
        status: Some("RUNNING".to_owned()),
        root_server: None,
        cpu_count: Some(16),
        memory_size: Some("64G".to_owned()),
        unit_count: Some(2),
        connection_count: Some(12),
        qps: Some(340.5),
        servers: (1..=server_count)
            .map(|server_number| ServerSnapshot {
                id: format!("{cluster_id}-z{zone_number}-s{server_number}"),
                ip: format!("10.0.{zone_number}.{server_number}"),
                port: 2882,
                sql_port: Some(2881),
                status: Some("RUNNING".to_owned()),
                connection_count: Some(4),
                qps: Some(120.0),
            })
            .collect(),
    }
}
