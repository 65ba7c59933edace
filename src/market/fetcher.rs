//! カタログ取得
//!
//! プラグイン識別子の一覧から、同時実行数を制限しつつ各プラグインの
//! メタデータを解決し、一定件数ずつ呼び出し側へ渡す。

use crate::config::{MarketOptions, SettingsHandle};
use crate::error::{MarketError, Result};
use crate::http::{fetch_json, HttpTransport};
use crate::market::branch::{BranchCache, BranchResolver};
use crate::market::entry::{CatalogEntry, PluginCategory};
use crate::market::manifest::LocalizedOverlay;
use crate::market::source::SourceUrlBuilder;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// マーケット側のバージョンが空のときの既定値
const DEFAULT_VERSION: &str = "1.0.0";

/// パッケージ名に必要な最小セグメント数（`STranslate.Plugin.{Category}.{Name}`）
const MIN_PACKAGE_SEGMENTS: usize = 4;

/// プラグイン識別子
///
/// `Author/STranslate.Plugin.Translate.Name` または作者省略形。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginIdentifier {
    pub author: String,
    pub package: String,
    pub category: PluginCategory,
}

impl PluginIdentifier {
    pub fn parse(raw: &str, default_author: &str) -> Result<Self> {
        let raw = raw.trim();
        let (author, package) = match raw.split_once('/') {
            Some((author, package)) => (author.trim(), package.trim()),
            None => (default_author, raw),
        };
        let author = if author.is_empty() { default_author } else { author };

        let segments: Vec<&str> = package.split('.').collect();
        if segments.len() < MIN_PACKAGE_SEGMENTS {
            return Err(MarketError::InvalidIdentifier(raw.to_string()));
        }

        let category = segments[2]
            .parse::<PluginCategory>()
            .map_err(|_| MarketError::InvalidIdentifier(raw.to_string()))?;

        Ok(Self {
            author: author.to_string(),
            package: package.to_string(),
            category,
        })
    }
}

/// カタログ読み込みの結果
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Vec<CatalogEntry>),
    /// 識別子一覧が空
    Empty,
    /// 識別子一覧そのものが取得できなかった
    Failed(MarketError),
}

struct FetcherInner {
    transport: Arc<dyn HttpTransport>,
    urls: SourceUrlBuilder,
    resolver: BranchResolver,
    settings: SettingsHandle,
    options: MarketOptions,
}

/// カタログフェッチャー
#[derive(Clone)]
pub struct CatalogFetcher {
    inner: Arc<FetcherInner>,
}

impl CatalogFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        settings: SettingsHandle,
        options: MarketOptions,
        cache: Arc<BranchCache>,
    ) -> Self {
        let urls = SourceUrlBuilder::new(settings.clone(), &options);
        let resolver = BranchResolver::new(transport.clone(), urls.clone(), cache);
        Self {
            inner: Arc::new(FetcherInner {
                transport,
                urls,
                resolver,
                settings,
                options,
            }),
        }
    }

    pub fn urls(&self) -> &SourceUrlBuilder {
        &self.inner.urls
    }

    pub fn branch_cache(&self) -> &Arc<BranchCache> {
        self.inner.resolver.cache()
    }

    /// 識別子一覧を取得する
    pub async fn fetch_identifiers(&self) -> Result<Vec<String>> {
        let url = self.inner.urls.build_list_url();
        fetch_json(self.inner.transport.as_ref(), &url).await
    }

    /// 1 件分のエントリを解決する（失敗時は None）
    pub async fn fetch_entry(&self, raw: &str) -> Option<CatalogEntry> {
        self.inner.fetch_entry(raw).await
    }

    /// 識別子を並列に解決し、`batch_size` 件ずつ `on_batch` に渡す
    ///
    /// 個々の失敗は結果から除かれるだけで、全体は中断しない。
    /// 出力順は入力順と一致しない。戻り値は渡した件数。
    pub async fn fetch<F>(&self, identifiers: &[String], mut on_batch: F) -> usize
    where
        F: FnMut(Vec<CatalogEntry>),
    {
        let limiter = Arc::new(Semaphore::new(self.inner.options.max_concurrency.max(1)));
        let batch_size = self.inner.options.batch_size.max(1);

        let mut tasks = JoinSet::new();
        for raw in identifiers {
            let inner = self.inner.clone();
            let limiter = limiter.clone();
            let raw = raw.clone();
            tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await.ok()?;
                inner.fetch_entry(&raw).await
            });
        }

        let mut emitted = 0;
        let mut batch = Vec::with_capacity(batch_size);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(entry)) => batch.push(entry),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "catalog task failed"),
            }
            if batch.len() >= batch_size {
                emitted += batch.len();
                on_batch(std::mem::replace(&mut batch, Vec::with_capacity(batch_size)));
                tokio::task::yield_now().await;
            }
        }
        if !batch.is_empty() {
            emitted += batch.len();
            on_batch(batch);
        }

        emitted
    }

    /// 全件をまとめて取得
    pub async fn fetch_all(&self, identifiers: &[String]) -> Vec<CatalogEntry> {
        let mut entries = Vec::with_capacity(identifiers.len());
        self.fetch(identifiers, |batch| entries.extend(batch)).await;
        entries
    }

    /// 一覧の取得からエントリ解決までを行う
    pub async fn load(&self) -> LoadOutcome {
        let identifiers = match self.fetch_identifiers().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "failed to fetch plugin list");
                return LoadOutcome::Failed(e);
            }
        };
        if identifiers.is_empty() {
            return LoadOutcome::Empty;
        }

        let entries = self.fetch_all(&identifiers).await;
        info!(
            requested = identifiers.len(),
            loaded = entries.len(),
            "catalog loaded"
        );
        LoadOutcome::Loaded(entries)
    }
}

impl FetcherInner {
    async fn fetch_entry(&self, raw: &str) -> Option<CatalogEntry> {
        let id = match PluginIdentifier::parse(raw, &self.options.default_author) {
            Ok(id) => id,
            Err(e) => {
                debug!(identifier = raw, error = %e, "skipping identifier");
                return None;
            }
        };

        let resolution = self.resolver.resolve(&id.author, &id.package).await;
        let Some(manifest) = resolution.manifest else {
            debug!(identifier = raw, "plugin.json not found");
            return None;
        };
        let branch = resolution.branch;

        let overlay = self.fetch_overlay(&id, &branch).await;
        let fallback_name = non_empty(&manifest.name).unwrap_or(&id.package);
        let (name, description) =
            LocalizedOverlay::merge(overlay.as_ref(), fallback_name, &manifest.description);

        let version = non_empty(&manifest.version)
            .unwrap_or(DEFAULT_VERSION)
            .to_string();
        let homepage = non_empty(&manifest.website)
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://github.com/{}/{}", id.author, id.package));
        let icon_url = self.urls.build_content_url(
            &id.author,
            &id.package,
            &branch,
            &format!("{}/icon.png", id.package),
        );
        let download_url = self
            .urls
            .build_download_url(&id.author, &id.package, &version);

        Some(CatalogEntry {
            plugin_id: non_empty(&manifest.plugin_id)
                .unwrap_or(&id.package)
                .to_string(),
            name,
            author: non_empty(&manifest.author).unwrap_or(&id.author).to_string(),
            category: id.category,
            version,
            description,
            homepage,
            icon_url,
            download_url,
            package_name: id.package,
        })
    }

    /// ローカライズ情報（取得失敗は None）
    async fn fetch_overlay(&self, id: &PluginIdentifier, branch: &str) -> Option<LocalizedOverlay> {
        let language = self.settings.snapshot().language;
        let path = format!("{}/Languages/{}.json", id.package, language);
        let url = self
            .urls
            .build_content_url(&id.author, &id.package, branch, &path);
        match fetch_json(self.transport.as_ref(), &url).await {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                debug!(url = %url, error = %e, "localized overlay unavailable");
                None
            }
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
#[path = "fetcher_test.rs"]
mod tests;
