//! Replica selection.
//!
//! The selector holds the full replica set as announced metadata and picks
//! a target per call: a sticky pick when the identity already has a replica
//! in the group, a uniform-random pick over the freshest replicas when not.

use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::{group_for_server, RouteHint};
use crate::core::config::TopologyConfig;

/// One announced replica. `max_version_in_group` is recomputed on every
/// update so the fresh-pick filter is a plain equality check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub id: u32,
    pub group_id: u32,
    pub cur_version: u32,
    pub max_version_in_group: u32,
    pub address: String,
    pub room_status: u8,
}

/// Outcome of a pick: where to connect and which replica id it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub address: String,
    pub id: u32,
}

#[derive(Default)]
pub struct Selector {
    servers: RwLock<Arc<Vec<ServerInfo>>>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the replica set from announcement metadata, keyed by
    /// address. The whole set is swapped atomically; an empty map is
    /// ignored so a registry hiccup cannot blank out routing.
    pub fn update_servers(&self, servers: &HashMap<String, String>) {
        if servers.is_empty() {
            warn!("ignoring empty replica set update");
            return;
        }

        let mut parsed: Vec<ServerInfo> = servers
            .iter()
            .filter_map(|(address, metadata)| parse_server_metadata(address, metadata))
            .collect();

        let mut group_max: HashMap<u32, u32> = HashMap::new();
        for server in &parsed {
            let max = group_max.entry(server.group_id).or_insert(0);
            if server.cur_version > *max {
                *max = server.cur_version;
            }
        }
        for server in &mut parsed {
            server.max_version_in_group = group_max[&server.group_id];
        }

        *self.servers.write() = Arc::new(parsed);
    }

    /// Pick a replica for `hint`. A nonzero `hint.id` is honored exactly,
    /// regardless of version, so an in-flight identity never migrates; a
    /// zero id picks uniformly among the group's freshest replicas.
    pub fn select(&self, hint: &RouteHint) -> Option<Selection> {
        let servers = self.servers.read().clone();

        if hint.id != 0 {
            return servers.iter().find(|s| s.id == hint.id).map(|s| Selection {
                address: s.address.clone(),
                id: s.id,
            });
        }

        let fresh: Vec<&ServerInfo> = servers
            .iter()
            .filter(|s| s.group_id == hint.group_id && s.cur_version == s.max_version_in_group)
            .collect();
        if fresh.is_empty() {
            return None;
        }
        let pick = fresh[rand::rng().random_range(0..fresh.len())];
        Some(Selection {
            address: pick.address.clone(),
            id: pick.id,
        })
    }

    pub fn len(&self) -> usize {
        self.servers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Render the metadata string a process announces about itself.
pub fn metadata_string(id: u32, group_id: u32, version: u32) -> String {
    format!("id={id}&groupId={group_id}&version={version}")
}

/// Build an announcement map from static topology config, deriving each
/// replica's group from its id.
pub fn topology_map(topology: &TopologyConfig) -> HashMap<String, String> {
    topology
        .replicas
        .iter()
        .map(|r| {
            (
                r.address.clone(),
                metadata_string(r.id, group_for_server(r.id), r.version),
            )
        })
        .collect()
}

fn parse_server_metadata(address: &str, metadata: &str) -> Option<ServerInfo> {
    let mut info = ServerInfo {
        id: 0,
        group_id: 0,
        cur_version: 0,
        max_version_in_group: 0,
        address: address.to_string(),
        room_status: 0,
    };
    for pair in metadata.split('&') {
        let (key, value) = pair.split_once('=')?;
        match key {
            "id" => info.id = value.parse().ok()?,
            "groupId" => info.group_id = value.parse().ok()?,
            "version" => info.cur_version = value.parse().ok()?,
            "roomStatus" => info.room_status = value.parse().ok()?,
            _ => {}
        }
    }
    if info.id == 0 || info.group_id == 0 {
        warn!(address, metadata, "skipping replica with malformed metadata");
        return None;
    }
    Some(info)
}
