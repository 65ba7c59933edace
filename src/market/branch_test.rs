use super::*;
use crate::config::{MarketOptions, SettingsHandle};
use crate::http::mock::MockTransport;
use tempfile::TempDir;

const PACKAGE: &str = "STranslate.Plugin.Translate.X";
const MANIFEST: &str = r#"{"PluginID": "x", "Name": "X", "Version": "2.0.0"}"#;

fn manifest_url(branch: &str) -> String {
    format!(
        "https://fastly.jsdelivr.net/gh/A/{0}@{1}/{0}/plugin.json",
        PACKAGE, branch
    )
}

fn resolver(transport: Arc<MockTransport>, cache: Arc<BranchCache>) -> BranchResolver {
    let urls = SourceUrlBuilder::new(SettingsHandle::default(), &MarketOptions::default());
    BranchResolver::new(transport, urls, cache)
}

// ========================================
// BranchCache tests
// ========================================

#[test]
fn test_cache_key_is_case_insensitive() {
    let cache = BranchCache::new();
    cache.insert("Author", "Pkg", "master");
    assert_eq!(cache.get("author", "pkg").as_deref(), Some("master"));
    assert_eq!(cache.remove("AUTHOR", "PKG").as_deref(), Some("master"));
    assert!(cache.is_empty());
}

#[test]
fn test_cache_save_and_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cache").join("branches.json");

    let cache = BranchCache::new();
    cache.insert("A", "P1", "main");
    cache.insert("B", "P2", "master");
    cache.save(&path).unwrap();

    let loaded = BranchCache::load(&path).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.get("b", "p2").as_deref(), Some("master"));
}

#[test]
fn test_cache_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let cache = BranchCache::load(&temp_dir.path().join("none.json")).unwrap();
    assert!(cache.is_empty());
}

// ========================================
// resolve tests
// ========================================

#[tokio::test]
async fn test_resolve_main() {
    let transport = Arc::new(MockTransport::new());
    transport.add_json(&manifest_url("main"), MANIFEST);
    let cache = Arc::new(BranchCache::new());

    let resolution = resolver(transport.clone(), cache.clone())
        .resolve("A", PACKAGE)
        .await;

    assert!(resolution.found_manifest());
    assert_eq!(resolution.branch, "main");
    assert_eq!(cache.get("A", PACKAGE).as_deref(), Some("main"));
    assert_eq!(transport.call_count(&manifest_url("master")), 0);
}

#[tokio::test]
async fn test_resolve_master_only_is_cached() {
    let transport = Arc::new(MockTransport::new());
    transport.add_not_found(&manifest_url("main"));
    transport.add_json(&manifest_url("master"), MANIFEST);
    let resolver = resolver(transport.clone(), Arc::new(BranchCache::new()));

    let first = resolver.resolve("A", PACKAGE).await;
    assert_eq!(first.branch, "master");
    assert_eq!(first.manifest.unwrap().version, "2.0.0");

    let second = resolver.resolve("A", PACKAGE).await;
    assert_eq!(second.branch, "master");
    assert!(second.found_manifest());

    // 2 回目は main を探索しない
    assert_eq!(transport.call_count(&manifest_url("main")), 1);
    assert_eq!(transport.call_count(&manifest_url("master")), 2);
}

#[tokio::test]
async fn test_resolve_non_404_on_main_aborts() {
    let transport = Arc::new(MockTransport::new());
    transport.add_status(&manifest_url("main"), 500);
    transport.add_json(&manifest_url("master"), MANIFEST);
    let cache = Arc::new(BranchCache::new());

    let resolution = resolver(transport.clone(), cache.clone())
        .resolve("A", PACKAGE)
        .await;

    assert!(!resolution.found_manifest());
    assert_eq!(transport.call_count(&manifest_url("master")), 0);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_resolve_not_found_anywhere() {
    let transport = Arc::new(MockTransport::new());
    let cache = Arc::new(BranchCache::new());

    let resolution = resolver(transport.clone(), cache.clone())
        .resolve("A", PACKAGE)
        .await;

    assert!(!resolution.found_manifest());
    assert!(cache.is_empty());
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn test_cached_branch_404_is_evicted_and_reprobed() {
    let transport = Arc::new(MockTransport::new());
    transport.add_json(&manifest_url("main"), MANIFEST);
    let cache = Arc::new(BranchCache::new());
    cache.insert("A", PACKAGE, "master");

    let resolution = resolver(transport.clone(), cache.clone())
        .resolve("A", PACKAGE)
        .await;

    assert_eq!(resolution.branch, "main");
    assert_eq!(cache.get("A", PACKAGE).as_deref(), Some("main"));
    assert_eq!(transport.call_count(&manifest_url("master")), 1);
}

#[tokio::test]
async fn test_cached_branch_transient_failure_keeps_entry_and_probes() {
    let transport = Arc::new(MockTransport::new());
    transport.add_status(&manifest_url("master"), 503);
    transport.add_not_found(&manifest_url("main"));
    let cache = Arc::new(BranchCache::new());
    cache.insert("A", PACKAGE, "master");

    let resolution = resolver(transport.clone(), cache.clone())
        .resolve("A", PACKAGE)
        .await;

    // キャッシュ分岐 → main(404) → master(503) で打ち切り
    assert!(!resolution.found_manifest());
    assert_eq!(transport.call_count(&manifest_url("master")), 2);
    assert_eq!(cache.get("A", PACKAGE).as_deref(), Some("master"));
}
