//! ダウンロード・インストール
//!
//! パッケージの展開・登録と、ユーザーへの確認はホスト側が実装する。
//! このモジュールはそれらを呼び出す順序と、結果としての状態遷移を受け持つ。

#[cfg(test)]
pub mod mock;
pub mod orchestrator;
pub mod registry;

pub use orchestrator::{InstallOrchestrator, InstallOutcome};
pub use registry::RegistryInstaller;

use crate::error::Result;
use crate::http::BoxFuture;
use crate::market::LocalInstallSet;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// インストール済みプラグインの情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    pub plugin_id: String,
    pub name: String,
    pub version: String,
}

/// インストーラが返す生の結果
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub succeeded: bool,
    pub message: String,
    /// 既存の古いインストールが見つかった
    pub requires_upgrade: bool,
    pub existing: Option<InstalledPlugin>,
    pub new_plugin: Option<InstalledPlugin>,
}

/// 分類済みのインストール結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallResult {
    Succeeded,
    RequiresUpgrade { existing: InstalledPlugin },
    Failed(String),
}

impl InstallReport {
    pub fn succeeded(plugin: InstalledPlugin) -> Self {
        Self {
            succeeded: true,
            new_plugin: Some(plugin),
            ..Default::default()
        }
    }

    pub fn requires_upgrade(existing: InstalledPlugin, new_plugin: InstalledPlugin) -> Self {
        Self {
            succeeded: false,
            requires_upgrade: true,
            existing: Some(existing),
            new_plugin: Some(new_plugin),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// 更新確認が必要か → 失敗か → 成功か の順で分類する
    pub fn classify(self) -> InstallResult {
        match self.existing {
            Some(existing) if self.requires_upgrade => InstallResult::RequiresUpgrade { existing },
            _ if !self.succeeded => InstallResult::Failed(self.message),
            _ => InstallResult::Succeeded,
        }
    }
}

/// パッケージのインストーラ trait
pub trait PluginInstaller: Send + Sync {
    /// パッケージをインストール
    fn install_package<'a>(&'a self, package: &'a Path) -> BoxFuture<'a, Result<InstallReport>>;

    /// 既存インストールをパッケージで置き換える
    fn upgrade_package<'a>(
        &'a self,
        existing: &'a InstalledPlugin,
        package: &'a Path,
    ) -> BoxFuture<'a, Result<bool>>;

    /// 現在のインストール状況
    fn installed_plugins(&self) -> BoxFuture<'_, Result<LocalInstallSet>>;
}

/// ユーザー確認 trait
pub trait InstallPrompt: Send + Sync {
    /// 既存プラグインを更新してよいか
    fn confirm_upgrade<'a>(
        &'a self,
        existing: &'a InstalledPlugin,
        new_version: &'a str,
    ) -> BoxFuture<'a, bool>;

    /// すぐに再起動してよいか
    fn confirm_restart(&self) -> BoxFuture<'_, bool>;

    /// 再起動を要求（戻りを待たない）
    fn request_restart(&self);
}

/// 通知の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Warning,
    Error,
}

/// ダウンロード・インストールの終了通知
///
/// 1 回の処理につき最大 1 件発行される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub plugin_id: String,
    pub message: String,
}

impl Notice {
    pub fn success(plugin_id: &str, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            plugin_id: plugin_id.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(plugin_id: &str, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Warning,
            plugin_id: plugin_id.to_string(),
            message: message.into(),
        }
    }

    pub fn error(plugin_id: &str, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            plugin_id: plugin_id.to_string(),
            message: message.into(),
        }
    }
}
