//! ブランチ解決
//!
//! プラグインリポジトリの既定ブランチは main / master のどちらかなので、
//! plugin.json がどちらにあるかを探索し、結果を `BranchCache` に記憶する。

use crate::error::{MarketError, Result};
use crate::http::{fetch_json, HttpTransport};
use crate::market::manifest::RemoteManifest;
use crate::market::source::SourceUrlBuilder;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::debug;

/// 探索順のブランチ候補
pub const CANDIDATE_BRANCHES: [&str; 2] = ["main", "master"];

/// `author/package` → ブランチ名
///
/// 複数の取得タスクから同時に読み書きされる。キーは大文字小文字を区別しない。
#[derive(Debug, Default)]
pub struct BranchCache {
    map: DashMap<String, String>,
}

impl BranchCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(author: &str, package: &str) -> String {
        format!("{}/{}", author, package).to_lowercase()
    }

    pub fn get(&self, author: &str, package: &str) -> Option<String> {
        self.map
            .get(&Self::key(author, package))
            .map(|branch| branch.value().clone())
    }

    pub fn insert(&self, author: &str, package: &str, branch: &str) {
        self.map.insert(Self::key(author, package), branch.to_string());
    }

    pub fn remove(&self, author: &str, package: &str) -> Option<String> {
        self.map
            .remove(&Self::key(author, package))
            .map(|(_, branch)| branch)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// JSONファイルから読み込む（存在しなければ空）
    pub fn load(path: &Path) -> Result<Self> {
        let entries: BTreeMap<String, String> = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(MarketError::Io(e)),
        };
        let cache = Self::new();
        for (key, branch) in entries {
            cache.map.insert(key.to_lowercase(), branch);
        }
        Ok(cache)
    }

    /// JSONファイルへ保存（アトミック書き込み）
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        let entries: BTreeMap<String, String> = self
            .map
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let content = serde_json::to_string_pretty(&entries)?;

        let mut temp_file = NamedTempFile::new_in(parent)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file
            .persist(path)
            .map_err(|e| MarketError::Config(format!("Failed to persist branch cache: {}", e)))?;
        Ok(())
    }
}

/// ブランチ解決の結果
#[derive(Debug, Clone)]
pub struct BranchResolution {
    pub branch: String,
    /// 見つかった plugin.json（見つからなければ None）
    pub manifest: Option<RemoteManifest>,
}

impl BranchResolution {
    fn found(branch: &str, manifest: RemoteManifest) -> Self {
        Self {
            branch: branch.to_string(),
            manifest: Some(manifest),
        }
    }

    fn missing(branch: &str) -> Self {
        Self {
            branch: branch.to_string(),
            manifest: None,
        }
    }

    pub fn found_manifest(&self) -> bool {
        self.manifest.is_some()
    }
}

/// ブランチリゾルバ
pub struct BranchResolver {
    transport: Arc<dyn HttpTransport>,
    urls: SourceUrlBuilder,
    cache: Arc<BranchCache>,
}

impl BranchResolver {
    pub fn new(transport: Arc<dyn HttpTransport>, urls: SourceUrlBuilder, cache: Arc<BranchCache>) -> Self {
        Self {
            transport,
            urls,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<BranchCache> {
        &self.cache
    }

    /// plugin.json の置き場所
    pub fn manifest_path(package: &str) -> String {
        format!("{}/plugin.json", package)
    }

    async fn fetch_manifest(&self, author: &str, package: &str, branch: &str) -> Result<RemoteManifest> {
        let url = self
            .urls
            .build_content_url(author, package, branch, &Self::manifest_path(package));
        fetch_json(self.transport.as_ref(), &url).await
    }

    /// plugin.json を持つブランチを解決する
    ///
    /// 1. キャッシュ済みブランチを試す。404 ならキャッシュから除去、その他の失敗はそのまま探索へ
    /// 2. main → master の順に探索。404 以外の失敗ではそこで打ち切る
    pub async fn resolve(&self, author: &str, package: &str) -> BranchResolution {
        if let Some(cached) = self.cache.get(author, package) {
            match self.fetch_manifest(author, package, &cached).await {
                Ok(manifest) => return BranchResolution::found(&cached, manifest),
                Err(e) if e.is_not_found() => {
                    debug!(author, package, branch = %cached, "cached branch gone, re-probing");
                    self.cache.remove(author, package);
                }
                Err(e) => {
                    debug!(author, package, branch = %cached, error = %e, "cached branch failed, re-probing");
                }
            }
        }

        let last = CANDIDATE_BRANCHES.len() - 1;
        for (i, branch) in CANDIDATE_BRANCHES.iter().enumerate() {
            match self.fetch_manifest(author, package, branch).await {
                Ok(manifest) => {
                    self.cache.insert(author, package, branch);
                    return BranchResolution::found(branch, manifest);
                }
                Err(e) if e.is_not_found() && i < last => {
                    debug!(author, package, branch, "not found, trying next branch");
                }
                Err(e) => {
                    debug!(author, package, branch, error = %e, "branch resolution aborted");
                    return BranchResolution::missing(branch);
                }
            }
        }

        BranchResolution::missing(CANDIDATE_BRANCHES[0])
    }
}

#[cfg(test)]
#[path = "branch_test.rs"]
mod tests;
