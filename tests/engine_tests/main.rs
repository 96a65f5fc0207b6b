//! Engine test suite

mod observer_tests;

use std::path::Path;
use std::sync::Arc;

use driftkv::cluster::Role;
use driftkv::engine::Engine;
use driftkv::fault::FaultInjector;
use driftkv::replication::Topology;
use driftkv::wal::NodeId;
use driftkv::Config;
use tempfile::TempDir;

pub fn config(dir: &Path, node_id: NodeId) -> Config {
    Config::builder().data_dir(dir).node_id(node_id).build()
}

pub fn masterless_config(dir: &Path, node_id: NodeId) -> Config {
    Config::builder()
        .data_dir(dir)
        .node_id(node_id)
        .topology(Topology::Masterless)
        .role(Role::Peer)
        .build()
}

pub fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config(temp_dir.path(), 1)).unwrap();
    (temp_dir, engine)
}

pub fn open_with_faults(dir: &Path, faults: Arc<dyn FaultInjector>) -> Engine {
    Engine::open_with_faults(config(dir, 1), faults).unwrap()
}
