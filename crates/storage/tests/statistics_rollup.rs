#![forbid(unsafe_code)]

use mt_storage::{ROOT_NODE, SqliteStore};
use std::path::PathBuf;
use std::time::Duration;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("mt_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn spread_mtime() {
    std::thread::sleep(Duration::from_millis(5));
}

fn rollup(store: &SqliteStore, node: i64, cluster: i64) -> (i64, i64) {
    let stats = store
        .statistics_get(node, cluster)
        .expect("stats")
        .expect("rollup row");
    (stats.population, stats.size)
}

#[test]
fn rollup_walks_to_the_root() {
    let mut store = SqliteStore::open(temp_dir("rollup_walks_to_the_root")).expect("open store");

    let a = store.node_create(ROOT_NODE, "a/").expect("create a");
    let b = store.node_create(a, "a/b").expect("create b");

    store
        .version_create(b, "hb", 10, None, "alice", 0)
        .expect("version at b");

    // Size climbs the whole chain; population lands on the parent only.
    assert_eq!(rollup(&store, b, 0), (0, 10));
    assert_eq!(rollup(&store, a, 0), (1, 10));
    assert_eq!(rollup(&store, ROOT_NODE, 0), (0, 10));

    store
        .version_create(a, "ha", 5, None, "alice", 0)
        .expect("version at a");

    assert_eq!(rollup(&store, b, 0), (0, 10));
    assert_eq!(rollup(&store, a, 0), (1, 15));
    assert_eq!(rollup(&store, ROOT_NODE, 0), (1, 15));
}

#[test]
fn population_counts_direct_child_versions_only() {
    let mut store = SqliteStore::open(temp_dir("population_counts_direct_child_versions_only"))
        .expect("open store");

    let a = store.node_create(ROOT_NODE, "a/").expect("create a");
    let b = store.node_create(a, "a/b").expect("create b");

    store
        .version_create(b, "h1", 1, None, "alice", 0)
        .expect("version at b");
    store
        .version_create(b, "h2", 2, None, "alice", 0)
        .expect("version at b");

    assert_eq!(rollup(&store, a, 0), (2, 3));
    assert_eq!(rollup(&store, ROOT_NODE, 0), (0, 3));
}

#[test]
fn purge_removes_versions_and_prunes_the_node() {
    let mut store = SqliteStore::open(temp_dir("purge_removes_versions_and_prunes_the_node"))
        .expect("open store");

    let node = store.node_create(ROOT_NODE, "c").expect("create node");
    store
        .version_create(node, "h1", 1, None, "alice", 0)
        .expect("create version");
    store
        .version_create(node, "h2", 2, None, "alice", 0)
        .expect("create version");
    store
        .version_create(node, "h3", 3, None, "alice", 0)
        .expect("create version");
    assert_eq!(rollup(&store, ROOT_NODE, 0), (3, 6));

    let mut hashes = store
        .version_purge(node, f64::INFINITY, 0)
        .expect("purge versions");
    hashes.sort();
    assert_eq!(hashes, vec!["h1", "h2", "h3"]);

    // Nothing is left of the node, so the purge took it too.
    assert!(
        store
            .node_get_properties(node)
            .expect("node lookup")
            .is_none()
    );
    assert!(store.statistics_get(node, 0).expect("stats").is_none());
    assert_eq!(rollup(&store, ROOT_NODE, 0), (0, 0));
}

#[test]
fn purge_honors_the_inclusive_cutoff() {
    let mut store =
        SqliteStore::open(temp_dir("purge_honors_the_inclusive_cutoff")).expect("open store");

    let node = store.node_create(ROOT_NODE, "c").expect("create node");
    let (_, old_mtime) = store
        .version_create(node, "h-old", 2, None, "alice", 0)
        .expect("create old version");
    spread_mtime();
    let (newer, _) = store
        .version_create(node, "h-new", 3, None, "alice", 0)
        .expect("create new version");

    let hashes = store
        .version_purge(node, old_mtime, 0)
        .expect("purge versions");
    assert_eq!(hashes, vec!["h-old"]);

    let current = store
        .version_lookup(node, f64::INFINITY, 0)
        .expect("lookup current")
        .expect("current exists");
    assert_eq!(current.serial, newer);
    assert_eq!(rollup(&store, ROOT_NODE, 0), (1, 3));
}

#[test]
fn purge_is_scoped_to_one_cluster() {
    let mut store =
        SqliteStore::open(temp_dir("purge_is_scoped_to_one_cluster")).expect("open store");

    let node = store.node_create(ROOT_NODE, "c").expect("create node");
    store
        .version_create(node, "h-live", 2, None, "alice", 0)
        .expect("create live version");
    store
        .version_create(node, "h-history", 3, None, "alice", 1)
        .expect("create history version");

    let hashes = store
        .version_purge(node, f64::INFINITY, 0)
        .expect("purge live versions");
    assert_eq!(hashes, vec!["h-live"]);

    // The history version keeps the node alive.
    assert!(
        store
            .node_get_properties(node)
            .expect("node lookup")
            .is_some()
    );
    assert!(
        store
            .version_lookup(node, f64::INFINITY, 1)
            .expect("lookup history")
            .is_some()
    );
    assert_eq!(rollup(&store, ROOT_NODE, 1), (1, 3));
}

#[test]
fn purge_children_charges_the_parent_once() {
    let mut store =
        SqliteStore::open(temp_dir("purge_children_charges_the_parent_once")).expect("open store");

    let d = store.node_create(ROOT_NODE, "d/").expect("create d");
    let e = store.node_create(d, "d/e").expect("create e");
    let f = store.node_create(d, "d/f").expect("create f");

    store
        .version_create(d, "hd", 5, None, "alice", 0)
        .expect("version at d");
    store
        .version_create(e, "he", 4, None, "alice", 0)
        .expect("version at e");
    store
        .version_create(f, "hf", 6, None, "alice", 0)
        .expect("version at f");

    assert_eq!(rollup(&store, d, 0), (2, 15));
    assert_eq!(rollup(&store, ROOT_NODE, 0), (1, 15));

    let mut hashes = store
        .version_purge_children(d, f64::INFINITY, 0)
        .expect("purge children");
    hashes.sort();
    assert_eq!(hashes, vec!["he", "hf"]);

    // The children are gone, the parent and its own version are not.
    assert!(store.node_get_properties(e).expect("lookup e").is_none());
    assert!(store.node_get_properties(f).expect("lookup f").is_none());
    assert_eq!(store.node_count_children(d).expect("count children"), 0);
    assert!(
        store
            .version_lookup(d, f64::INFINITY, 0)
            .expect("lookup own version")
            .is_some()
    );

    assert_eq!(rollup(&store, d, 0), (0, 5));
    assert_eq!(rollup(&store, ROOT_NODE, 0), (1, 5));
}

#[test]
fn purge_keeps_a_node_with_children() {
    let mut store =
        SqliteStore::open(temp_dir("purge_keeps_a_node_with_children")).expect("open store");

    let node = store.node_create(ROOT_NODE, "c/").expect("create node");
    store.node_create(node, "c/leaf").expect("create child");
    store
        .version_create(node, "h", 2, None, "alice", 0)
        .expect("create version");

    let hashes = store
        .version_purge(node, f64::INFINITY, 0)
        .expect("purge versions");
    assert_eq!(hashes, vec!["h"]);

    // Versionless now, but the child keeps it in the tree.
    assert!(
        store
            .node_get_properties(node)
            .expect("node lookup")
            .is_some()
    );
    assert_eq!(rollup(&store, ROOT_NODE, 0), (0, 0));
}

#[test]
fn purge_children_keeps_children_with_descendants() {
    let mut store = SqliteStore::open(temp_dir("purge_children_keeps_children_with_descendants"))
        .expect("open store");

    let d = store.node_create(ROOT_NODE, "d/").expect("create d");
    let e = store.node_create(d, "d/e").expect("create e");
    let g = store.node_create(e, "d/e/g").expect("create grandchild");
    store
        .version_create(e, "he", 4, None, "alice", 0)
        .expect("version at e");

    let hashes = store
        .version_purge_children(d, f64::INFINITY, 0)
        .expect("purge children");
    assert_eq!(hashes, vec!["he"]);

    assert!(store.node_get_properties(e).expect("lookup e").is_some());
    assert!(store.node_get_properties(g).expect("lookup g").is_some());
    assert_eq!(rollup(&store, e, 0), (0, 0));
    assert_eq!(rollup(&store, d, 0), (0, 0));
    assert_eq!(rollup(&store, ROOT_NODE, 0), (0, 0));
}

#[test]
fn purge_children_with_no_candidates_is_empty() {
    let mut store = SqliteStore::open(temp_dir("purge_children_with_no_candidates_is_empty"))
        .expect("open store");

    let node = store.node_create(ROOT_NODE, "d/").expect("create node");
    let hashes = store
        .version_purge_children(node, f64::INFINITY, 0)
        .expect("purge children");
    assert!(hashes.is_empty());
    assert!(store.statistics_get(ROOT_NODE, 0).expect("stats").is_none());
}

#[test]
fn latest_summary_covers_the_subtree() {
    let mut store =
        SqliteStore::open(temp_dir("latest_summary_covers_the_subtree")).expect("open store");

    let g = store.node_create(ROOT_NODE, "g/").expect("create g");
    let h = store.node_create(g, "g/h").expect("create h");
    let i = store.node_create(g, "g/i").expect("create i");
    let j = store.node_create(h, "g/h/j").expect("create j");

    store
        .version_create(g, "hg", 2, None, "alice", 0)
        .expect("version at g");
    store
        .version_create(h, "hh", 3, None, "alice", 0)
        .expect("version at h");
    store
        .version_create(i, "hi", 4, None, "alice", 0)
        .expect("version at i");
    let (_, last_mtime) = store
        .version_create(j, "hj", 5, None, "alice", 0)
        .expect("version at j");

    let summary = store
        .statistics_latest(g, f64::INFINITY, 2)
        .expect("summary")
        .expect("summary exists");
    // Count is direct children; size spans the subtree below the node.
    assert_eq!(summary.count, 2);
    assert_eq!(summary.size, 12);
    assert_eq!(summary.mtime, last_mtime);
}

#[test]
fn latest_summary_of_a_leaf_is_zeroed() {
    let mut store =
        SqliteStore::open(temp_dir("latest_summary_of_a_leaf_is_zeroed")).expect("open store");

    let node = store.node_create(ROOT_NODE, "solo").expect("create node");
    let (_, mtime) = store
        .version_create(node, "h", 9, None, "alice", 0)
        .expect("create version");

    let summary = store
        .statistics_latest(node, f64::INFINITY, 2)
        .expect("summary")
        .expect("summary exists");
    assert_eq!(summary.count, 0);
    assert_eq!(summary.size, 0);
    assert_eq!(summary.mtime, mtime);
}

#[test]
fn latest_summary_requires_a_current_version() {
    let mut store = SqliteStore::open(temp_dir("latest_summary_requires_a_current_version"))
        .expect("open store");

    let bare = store.node_create(ROOT_NODE, "bare/").expect("create node");
    let child = store.node_create(bare, "bare/x").expect("create child");
    store
        .version_create(child, "h", 1, None, "alice", 0)
        .expect("version at child");

    // Child versions do not stand in for the node's own.
    assert!(
        store
            .statistics_latest(bare, f64::INFINITY, 2)
            .expect("summary")
            .is_none()
    );
    assert!(
        store
            .statistics_latest(9999, f64::INFINITY, 2)
            .expect("summary of missing node")
            .is_none()
    );
}

#[test]
fn latest_summary_hides_tombstoned_nodes() {
    let mut store = SqliteStore::open(temp_dir("latest_summary_hides_tombstoned_nodes"))
        .expect("open store");

    let node = store.node_create(ROOT_NODE, "t").expect("create node");
    let (_, live_mtime) = store
        .version_create(node, "h-live", 4, None, "alice", 0)
        .expect("create live version");
    spread_mtime();
    let (_, dead_mtime) = store
        .version_create(node, "h-dead", 0, None, "alice", 2)
        .expect("create tombstone");

    assert!(
        store
            .statistics_latest(node, f64::INFINITY, 2)
            .expect("summary")
            .is_none()
    );

    // As of a time before the tombstone, the live version is current again.
    let summary = store
        .statistics_latest(node, dead_mtime, 2)
        .expect("summary")
        .expect("summary exists");
    assert_eq!(summary.count, 0);
    assert_eq!(summary.mtime, live_mtime);
}
