use super::*;
use proptest::prelude::*;

fn version() -> impl Strategy<Value = String> {
    prop::collection::vec(0u32..20, 1..4).prop_map(|parts| {
        parts
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(".")
    })
}

/// (リモートバージョン, ローカルバージョン) の組
fn plugins() -> impl Strategy<Value = Vec<(String, Option<String>)>> {
    prop::collection::vec((version(), prop::option::of(version())), 0..12)
}

fn build(plugins: &[(String, Option<String>)]) -> (Catalog, LocalInstallSet) {
    let mut catalog = Catalog::new();
    let mut local = LocalInstallSet::new();
    let entries = plugins
        .iter()
        .enumerate()
        .map(|(i, (remote, installed))| {
            let id = format!("P{}", i);
            if let Some(v) = installed {
                local.insert(id.clone(), v.clone());
            }
            CatalogEntry {
                plugin_id: id.clone(),
                name: id.clone(),
                author: "STranslate".to_string(),
                category: PluginCategory::Translate,
                version: remote.clone(),
                description: String::new(),
                homepage: String::new(),
                icon_url: String::new(),
                download_url: String::new(),
                package_name: format!("STranslate.Plugin.Translate.{}", id),
            }
        })
        .collect();
    catalog.replace(entries);
    (catalog, local)
}

proptest! {
    /// 未インストールのエントリは更新可能にならない
    #[test]
    fn prop_not_installed_never_upgradable(plugins in plugins()) {
        let (catalog, local) = build(&plugins);
        catalog.reconcile(&local);
        for entry in catalog.entries() {
            let status = entry.status();
            prop_assert!(status.installed || !status.can_upgrade);
        }
    }

    /// 同じ入力での再実行は結果を変えない
    #[test]
    fn prop_reconcile_idempotent(plugins in plugins()) {
        let (catalog, local) = build(&plugins);
        catalog.reconcile(&local);
        let first: Vec<_> = catalog.entries().iter().map(|e| e.status()).collect();
        catalog.reconcile(&local);
        let second: Vec<_> = catalog.entries().iter().map(|e| e.status()).collect();
        prop_assert_eq!(first, second);
    }
}
