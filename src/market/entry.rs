//! カタログエントリとインストール状態

use crate::http::DownloadProgress;
use serde::Serialize;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError, RwLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// プラグイン種別（パッケージ名の 3 番目のセグメント）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PluginCategory {
    Translate,
    Ocr,
    Tts,
    Vocabulary,
}

impl PluginCategory {
    pub const ALL: [PluginCategory; 4] = [
        PluginCategory::Translate,
        PluginCategory::Ocr,
        PluginCategory::Tts,
        PluginCategory::Vocabulary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginCategory::Translate => "Translate",
            PluginCategory::Ocr => "Ocr",
            PluginCategory::Tts => "Tts",
            PluginCategory::Vocabulary => "Vocabulary",
        }
    }
}

impl std::fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PluginCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PluginCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown plugin category: {}", s))
    }
}

/// リモートカタログの 1 プラグイン分の情報
///
/// カタログ再読み込みのたびに作り直され、生成後は変更されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub plugin_id: String,
    pub name: String,
    pub author: String,
    pub category: PluginCategory,
    /// マーケット側のバージョン
    pub version: String,
    pub description: String,
    pub homepage: String,
    pub icon_url: String,
    /// 正規のダウンロードURL（プロキシ適用前）
    pub download_url: String,
    /// `STranslate.Plugin.Translate.Name` 形式
    pub package_name: String,
}

/// 操作ボタンの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionStatus {
    Downloading,
    PendingRestart,
    Download,
    Upgrade,
    Installed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Downloading => "Downloading",
            ActionStatus::PendingRestart => "PendingRestart",
            ActionStatus::Download => "Download",
            ActionStatus::Upgrade => "Upgrade",
            ActionStatus::Installed => "Installed",
        }
    }

    /// ユーザー操作を受け付けるか
    pub fn is_actionable(&self) -> bool {
        matches!(self, ActionStatus::Download | ActionStatus::Upgrade)
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// インストール状態
///
/// installed / installed_version / can_upgrade は突き合わせ処理が、
/// それ以外はダウンロード処理が書き換える。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstallStatus {
    pub installed: bool,
    pub installed_version: Option<String>,
    pub can_upgrade: bool,
    pub is_downloading: bool,
    /// 0.0 - 100.0
    pub download_progress: f64,
    pub download_status: Option<String>,
    pub pending_restart: bool,
}

impl InstallStatus {
    /// 状態を優先順に評価する
    ///
    /// Downloading > PendingRestart > Download > Upgrade > Installed
    pub fn action_status(&self) -> ActionStatus {
        if self.is_downloading {
            ActionStatus::Downloading
        } else if self.pending_restart {
            ActionStatus::PendingRestart
        } else if !self.installed {
            ActionStatus::Download
        } else if self.can_upgrade {
            ActionStatus::Upgrade
        } else {
            ActionStatus::Installed
        }
    }

    /// 最新版がインストール済みか
    pub fn is_up_to_date(&self) -> bool {
        self.installed && !self.can_upgrade
    }
}

/// カタログエントリ + 可変なインストール状態
///
/// エントリごとに独立したロックを持つため、異なるエントリへの同時書き込みは干渉しない。
#[derive(Debug)]
pub struct MarketEntry {
    info: CatalogEntry,
    status: RwLock<InstallStatus>,
    cancel: Mutex<Option<CancellationToken>>,
    progress: watch::Sender<DownloadProgress>,
}

impl MarketEntry {
    pub fn new(info: CatalogEntry) -> Self {
        let (progress, _) = watch::channel(DownloadProgress::default());
        Self {
            info,
            status: RwLock::new(InstallStatus::default()),
            cancel: Mutex::new(None),
            progress,
        }
    }

    pub fn info(&self) -> &CatalogEntry {
        &self.info
    }

    pub fn plugin_id(&self) -> &str {
        &self.info.plugin_id
    }

    /// 状態のスナップショット
    pub fn status(&self) -> InstallStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn action_status(&self) -> ActionStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .action_status()
    }

    /// 状態を書き換える
    pub fn update_status<R>(&self, f: impl FnOnce(&mut InstallStatus) -> R) -> R {
        let mut guard = self.status.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// 進捗の購読
    pub fn subscribe_progress(&self) -> watch::Receiver<DownloadProgress> {
        self.progress.subscribe()
    }

    /// ダウンロード開始を試みる
    ///
    /// ダウンロード中、または最新版がインストール済みなら None。
    /// 開始できた場合は新しいキャンセルトークンを発行し、古いものは破棄する。
    /// トークンを格納し終えるまで `cancel` のロックを保持する。
    pub(crate) fn try_begin_download(&self) -> Option<CancellationToken> {
        let mut cancel = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        let started = self.update_status(|s| {
            if s.is_downloading || s.is_up_to_date() {
                return false;
            }
            s.is_downloading = true;
            s.download_progress = 0.0;
            s.download_status = Some("0%".to_string());
            true
        });
        if !started {
            return None;
        }

        let token = CancellationToken::new();
        if let Some(stale) = cancel.replace(token.clone()) {
            stale.cancel();
        }
        drop(cancel);
        self.progress.send_replace(DownloadProgress::default());
        Some(token)
    }

    /// 進捗を反映
    pub(crate) fn report_progress(&self, progress: DownloadProgress) {
        self.update_status(|s| {
            s.download_progress = progress.percentage;
            s.download_status = Some(progress.status_text());
        });
        self.progress.send_replace(progress);
    }

    /// ダウンロード処理の終了（成否を問わず Idle に戻す）
    pub(crate) fn end_download(&self) {
        self.update_status(|s| {
            s.is_downloading = false;
            s.download_status = None;
        });
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// ダウンロードをキャンセル
    ///
    /// トークンが存在し、まだキャンセルされていない場合のみ発火する。
    pub fn cancel_download(&self) -> bool {
        let guard = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "entry_test.rs"]
mod tests;
