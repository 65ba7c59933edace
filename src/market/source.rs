//! ソースURL構築
//!
//! メタデータ・アイコン・一覧は選択されたCDN経由で取得し、
//! パッケージのダウンロードは常に GitHub Releases を起点に、必要ならプロキシで書き換える。

use crate::config::{MarketOptions, SettingsHandle};
use crate::error::MarketError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const JSDELIVR_TEMPLATE: &str = "https://fastly.jsdelivr.net/gh/{author}/{repo}@{branch}/{path}";
const GITHUB_RAW_TEMPLATE: &str = "https://raw.githubusercontent.com/{author}/{repo}/{branch}/{path}";
const DOWNLOAD_HOST: &str = "https://github.com";
const GH_PROXY_MIRROR: &str = "https://mirror.ghproxy.com";
const GH_PROXY_NET: &str = "https://ghproxy.net";

/// メタデータ取得用CDNソース
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CdnSource {
    #[default]
    #[serde(rename = "jsdelivr")]
    JsDelivr,
    #[serde(rename = "github_raw")]
    GitHubRaw,
    #[serde(rename = "custom")]
    Custom,
}

impl CdnSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CdnSource::JsDelivr => "jsdelivr",
            CdnSource::GitHubRaw => "github_raw",
            CdnSource::Custom => "custom",
        }
    }
}

impl std::fmt::Display for CdnSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CdnSource {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jsdelivr" => Ok(CdnSource::JsDelivr),
            "github_raw" | "githubraw" | "raw" => Ok(CdnSource::GitHubRaw),
            "custom" => Ok(CdnSource::Custom),
            _ => Err(MarketError::Config(format!("Unknown CDN source: {}", s))),
        }
    }
}

/// ダウンロードプロキシ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadProxy {
    /// GitHub 直接
    #[default]
    Direct,
    GhProxyMirror,
    GhProxyNet,
    Custom,
}

impl DownloadProxy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadProxy::Direct => "direct",
            DownloadProxy::GhProxyMirror => "gh_proxy_mirror",
            DownloadProxy::GhProxyNet => "gh_proxy_net",
            DownloadProxy::Custom => "custom",
        }
    }
}

impl std::fmt::Display for DownloadProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DownloadProxy {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" | "github" => Ok(DownloadProxy::Direct),
            "gh_proxy_mirror" | "mirror" => Ok(DownloadProxy::GhProxyMirror),
            "gh_proxy_net" | "ghproxy" => Ok(DownloadProxy::GhProxyNet),
            "custom" => Ok(DownloadProxy::Custom),
            _ => Err(MarketError::Config(format!("Unknown download proxy: {}", s))),
        }
    }
}

/// `{author}` `{repo}` `{branch}` `{path}` をそのまま置換
fn fill_template(template: &str, author: &str, repo: &str, branch: &str, path: &str) -> String {
    template
        .replace("{author}", author)
        .replace("{repo}", repo)
        .replace("{branch}", branch)
        .replace("{path}", path)
}

/// ソースURLビルダー
///
/// 設定は構築のたびに `SettingsHandle` から読む。
#[derive(Debug, Clone)]
pub struct SourceUrlBuilder {
    settings: SettingsHandle,
    list_author: String,
    list_repo: String,
    list_branch: String,
    list_path: String,
}

impl SourceUrlBuilder {
    pub fn new(settings: SettingsHandle, options: &MarketOptions) -> Self {
        Self {
            settings,
            list_author: options.default_author.clone(),
            list_repo: options.list_repo.clone(),
            list_branch: options.list_branch.clone(),
            list_path: options.list_path.clone(),
        }
    }

    /// 現在選択中のCDNテンプレート
    fn cdn_template(&self) -> String {
        let settings = self.settings.snapshot();
        match settings.cdn_source {
            CdnSource::JsDelivr => JSDELIVR_TEMPLATE.to_string(),
            CdnSource::GitHubRaw => GITHUB_RAW_TEMPLATE.to_string(),
            CdnSource::Custom if settings.custom_cdn_template.trim().is_empty() => {
                JSDELIVR_TEMPLATE.to_string()
            }
            CdnSource::Custom => settings.custom_cdn_template.trim().to_string(),
        }
    }

    /// リポジトリ内ファイルのURL（メタデータ・アイコン・ローカライズ情報）
    pub fn build_content_url(&self, author: &str, repo: &str, branch: &str, path: &str) -> String {
        fill_template(&self.cdn_template(), author, repo, branch, path)
    }

    /// プラグイン識別子一覧のURL
    pub fn build_list_url(&self) -> String {
        self.build_content_url(
            &self.list_author,
            &self.list_repo,
            &self.list_branch,
            &self.list_path,
        )
    }

    /// 正規のダウンロードURL（CDN選択に依存しない）
    pub fn build_download_url(&self, author: &str, package: &str, version: &str) -> String {
        format!(
            "{}/{}/{}/releases/download/v{}/{}.spkg",
            DOWNLOAD_HOST, author, package, version, package
        )
    }

    /// ダウンロード直前にプロキシを適用
    ///
    /// カスタムテンプレートに `{url}` があれば置換、なければ前置する。
    pub fn apply_download_proxy(&self, url: &str) -> String {
        let settings = self.settings.snapshot();
        match settings.download_proxy {
            DownloadProxy::Direct => url.to_string(),
            DownloadProxy::GhProxyMirror => format!("{}/{}", GH_PROXY_MIRROR, url),
            DownloadProxy::GhProxyNet => format!("{}/{}", GH_PROXY_NET, url),
            DownloadProxy::Custom => {
                let template = settings.custom_proxy_template.trim();
                if template.is_empty() {
                    url.to_string()
                } else if template.contains("{url}") {
                    template.replace("{url}", url)
                } else {
                    format!("{}/{}", template.trim_end_matches('/'), url)
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;
