//! コマンド共通の実行環境
//!
//! 設定・HTTPトランスポート・ブランチキャッシュ・インストーラを組み立て、
//! カタログを読み込んでローカルの状態と突き合わせる。

use indicatif::{ProgressBar, ProgressStyle};
use plugin_market::config::{HttpConfig, MarketOptions, MarketSettings, SettingsHandle};
use plugin_market::env::EnvVar;
use plugin_market::http::{HttpTransport, ReqwestTransport};
use plugin_market::install::{PluginInstaller, RegistryInstaller};
use plugin_market::market::{BranchCache, Catalog, CatalogFetcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const BRANCH_CACHE_FILE: &str = "branches.json";

pub struct MarketContext {
    pub options: MarketOptions,
    pub transport: Arc<dyn HttpTransport>,
    pub fetcher: CatalogFetcher,
    pub installer: Arc<RegistryInstaller>,
    cache_path: PathBuf,
}

impl MarketContext {
    pub fn open() -> Result<Self, String> {
        let settings = MarketSettings::load(&MarketSettings::default_path())
            .map_err(|e| format!("Failed to load settings: {}", e))?;
        let settings = SettingsHandle::new(settings);
        let options = MarketOptions::default();
        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::new(&HttpConfig::default()));

        let cache_path = EnvVar::data_dir().join(BRANCH_CACHE_FILE);
        let cache = BranchCache::load(&cache_path).unwrap_or_else(|e| {
            warn!(error = %e, "ignoring unreadable branch cache");
            BranchCache::new()
        });

        let fetcher = CatalogFetcher::new(
            transport.clone(),
            settings,
            options.clone(),
            Arc::new(cache),
        );

        Ok(Self {
            options,
            transport,
            fetcher,
            installer: Arc::new(RegistryInstaller::with_defaults()),
            cache_path,
        })
    }

    /// ダウンロードの一時置き場
    pub fn staging_dir(&self) -> PathBuf {
        std::env::temp_dir().join("pmarket")
    }

    /// カタログを読み込み、インストール状態を反映する
    pub async fn load_catalog(&self) -> Result<Catalog, String> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Fetching plugin list...");
        spinner.enable_steady_tick(Duration::from_millis(100));

        let identifiers = match self.fetcher.fetch_identifiers().await {
            Ok(ids) => ids,
            Err(e) => {
                spinner.finish_and_clear();
                return Err(format!("Failed to load plugin catalog: {}", e));
            }
        };

        let total = identifiers.len();
        let mut catalog = Catalog::new();
        self.fetcher
            .fetch(&identifiers, |batch| {
                catalog.extend(batch);
                spinner.set_message(format!("Loading plugins... {}/{}", catalog.len(), total));
            })
            .await;
        spinner.finish_and_clear();

        let local = self
            .installer
            .installed_plugins()
            .await
            .map_err(|e| format!("Failed to read installed plugins: {}", e))?;
        catalog.reconcile(&local);

        if let Err(e) = self.fetcher.branch_cache().save(&self.cache_path) {
            warn!(error = %e, "failed to save branch cache");
        }

        Ok(catalog)
    }
}
