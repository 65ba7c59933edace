//! カタログとインストール状態の突き合わせ

use crate::market::entry::{CatalogEntry, MarketEntry, PluginCategory};
use crate::version::is_upgrade_available;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// ローカルにインストール済みのプラグイン（ID → バージョン）
///
/// 突き合わせ時点のスナップショットとして扱う。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalInstallSet {
    plugins: HashMap<String, String>,
}

impl LocalInstallSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, plugin_id: impl Into<String>, version: impl Into<String>) {
        self.plugins.insert(plugin_id.into(), version.into());
    }

    pub fn remove(&mut self, plugin_id: &str) -> Option<String> {
        self.plugins.remove(plugin_id)
    }

    pub fn version_of(&self, plugin_id: &str) -> Option<&str> {
        self.plugins.get(plugin_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LocalInstallSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            plugins: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// 各エントリのインストール状態をローカル情報から再計算する
///
/// installed / installed_version / can_upgrade だけを書き換え、
/// ダウンロード中・再起動待ちの状態には触れない。何度実行しても結果は同じ。
pub fn reconcile(entries: &[Arc<MarketEntry>], local: &LocalInstallSet) {
    for entry in entries {
        let remote_version = &entry.info().version;
        let local_version = local.version_of(entry.plugin_id());
        entry.update_status(|status| match local_version {
            Some(version) => {
                status.installed = true;
                status.installed_version = Some(version.to_string());
                status.can_upgrade = is_upgrade_available(version, remote_version);
            }
            None => {
                status.installed = false;
                status.installed_version = None;
                status.can_upgrade = false;
            }
        });
    }
}

/// 種別ごとの件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub total: usize,
    pub translate: usize,
    pub ocr: usize,
    pub tts: usize,
    pub vocabulary: usize,
}

impl CategoryCounts {
    pub fn get(&self, category: PluginCategory) -> usize {
        match category {
            PluginCategory::Translate => self.translate,
            PluginCategory::Ocr => self.ocr,
            PluginCategory::Tts => self.tts,
            PluginCategory::Vocabulary => self.vocabulary,
        }
    }

    fn add(&mut self, category: PluginCategory) {
        self.total += 1;
        match category {
            PluginCategory::Translate => self.translate += 1,
            PluginCategory::Ocr => self.ocr += 1,
            PluginCategory::Tts => self.tts += 1,
            PluginCategory::Vocabulary => self.vocabulary += 1,
        }
    }
}

/// 種別フィルタ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(PluginCategory),
}

impl CategoryFilter {
    pub fn matches(&self, category: PluginCategory) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => *c == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        s.parse::<PluginCategory>().map(CategoryFilter::Only)
    }
}

/// 読み込み済みカタログ
///
/// 再読み込みのたびにエントリを丸ごと作り直す。
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<Arc<MarketEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全エントリを置き換える
    pub fn replace(&mut self, entries: Vec<CatalogEntry>) {
        self.entries = entries
            .into_iter()
            .map(|e| Arc::new(MarketEntry::new(e)))
            .collect();
    }

    /// バッチ単位で追加する
    pub fn extend(&mut self, batch: Vec<CatalogEntry>) {
        self.entries
            .extend(batch.into_iter().map(|e| Arc::new(MarketEntry::new(e))));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[Arc<MarketEntry>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, plugin_id: &str) -> Option<Arc<MarketEntry>> {
        self.entries
            .iter()
            .find(|e| e.plugin_id() == plugin_id)
            .cloned()
    }

    /// プラグインIDまたはパッケージ名で検索（大文字小文字を区別しない）
    pub fn lookup(&self, key: &str) -> Option<Arc<MarketEntry>> {
        self.entries
            .iter()
            .find(|e| {
                e.plugin_id().eq_ignore_ascii_case(key)
                    || e.info().package_name.eq_ignore_ascii_case(key)
            })
            .cloned()
    }

    pub fn reconcile(&self, local: &LocalInstallSet) {
        reconcile(&self.entries, local);
    }

    pub fn counts(&self) -> CategoryCounts {
        let mut counts = CategoryCounts::default();
        for entry in &self.entries {
            counts.add(entry.info().category);
        }
        counts
    }

    /// 種別と文字列で絞り込む
    ///
    /// 文字列は名前・作者・説明に対する大文字小文字を無視した部分一致。空なら全件。
    pub fn filter(&self, category: CategoryFilter, text: &str) -> Vec<Arc<MarketEntry>> {
        let needle = text.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|e| category.matches(e.info().category))
            .filter(|e| {
                if needle.is_empty() {
                    return true;
                }
                let info = e.info();
                [&info.name, &info.author, &info.description]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;

#[cfg(test)]
#[path = "catalog_proptests.rs"]
mod proptests;
