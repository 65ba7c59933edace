//! HTTP設定・マーケット設定

use crate::env::EnvVar;
use crate::error::{MarketError, Result};
use crate::market::source::{CdnSource, DownloadProxy};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tempfile::NamedTempFile;

/// 設定ファイル名
const SETTINGS_FILE: &str = "settings.toml";

/// HTTP設定
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// タイムアウト（秒）
    pub timeout: Option<Duration>,
    /// User-Agent
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            user_agent: "pmarket".to_string(),
        }
    }
}

impl HttpConfig {
    /// reqwest::Client を構築
    pub fn build_client(&self) -> Client {
        let mut builder = Client::builder().user_agent(&self.user_agent);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        builder.build().unwrap_or_else(|_| Client::new())
    }
}

/// マーケット設定（永続化対象）
///
/// メタデータ取得用のCDNソースと、ダウンロード用プロキシは独立して選択する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MarketSettings {
    /// メタデータ・アイコン・一覧取得に使うCDN
    pub cdn_source: CdnSource,
    /// `cdn_source = custom` 時のテンプレート
    pub custom_cdn_template: String,
    /// パッケージダウンロード時のプロキシ
    pub download_proxy: DownloadProxy,
    /// `download_proxy = custom` 時のテンプレート
    pub custom_proxy_template: String,
    /// ローカライズ情報の言語（Languages/{language}.json）
    pub language: String,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            cdn_source: CdnSource::JsDelivr,
            custom_cdn_template: String::new(),
            download_proxy: DownloadProxy::Direct,
            custom_proxy_template: String::new(),
            language: "zh-cn".to_string(),
        }
    }
}

impl MarketSettings {
    /// 設定ファイルを読み込む（存在しなければデフォルト）
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(MarketError::Io(e)),
        }
    }

    /// 設定ファイルを保存（アトミック書き込み）
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        let content = toml::to_string_pretty(self)
            .map_err(|e| MarketError::Config(format!("Failed to serialize settings: {}", e)))?;

        let mut temp_file = NamedTempFile::new_in(parent)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.flush()?;
        temp_file
            .persist(path)
            .map_err(|e| MarketError::Config(format!("Failed to persist settings: {}", e)))?;

        Ok(())
    }

    /// デフォルトの設定ファイルパス
    pub fn default_path() -> PathBuf {
        EnvVar::data_dir().join(SETTINGS_FILE)
    }

    /// CDN関連の設定が異なるか
    pub fn cdn_differs(&self, other: &MarketSettings) -> bool {
        self.cdn_source != other.cdn_source || self.custom_cdn_template != other.custom_cdn_template
    }
}

/// 共有設定ハンドル
///
/// URL構築のたびに最新値を読む。キャッシュはしない。
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<MarketSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: MarketSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// 現在の設定のスナップショット
    pub fn snapshot(&self) -> MarketSettings {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 設定を置き換え、CDN設定が変化したかを返す
    ///
    /// CDN が変わった場合、呼び出し側はカタログを再読み込みする。
    pub fn apply(&self, settings: MarketSettings) -> bool {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let changed = guard.cdn_differs(&settings);
        *guard = settings;
        changed
    }
}

/// カタログ取得・ダウンロードの実行パラメータ
#[derive(Debug, Clone)]
pub struct MarketOptions {
    /// カタログ取得の同時実行数
    pub max_concurrency: usize,
    /// 呼び出し側へ渡すバッチサイズ
    pub batch_size: usize,
    /// 同時ダウンロード数の上限
    pub max_active_downloads: usize,
    /// 識別子に作者がない場合の既定作者
    pub default_author: String,
    /// プラグイン一覧を置くリポジトリ
    pub list_repo: String,
    pub list_branch: String,
    pub list_path: String,
}

impl Default for MarketOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 6,
            batch_size: 12,
            max_active_downloads: 3,
            default_author: "STranslate".to_string(),
            list_repo: "STranslate-doc".to_string(),
            list_branch: "main".to_string(),
            list_path: "vitepress/plugins.json".to_string(),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
