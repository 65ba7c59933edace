//! テスト用モックインストーラ・確認ダイアログ

use super::*;
use crate::error::MarketError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

/// テスト用モックインストーラ
///
/// `install_package` は設定済みのレポートを返し、成功ならインストール状況に反映する。
pub struct MockInstaller {
    installed: RwLock<LocalInstallSet>,
    report: Mutex<InstallReport>,
    upgrade_succeeds: AtomicBool,
    packages: Mutex<Vec<PathBuf>>,
}

impl MockInstaller {
    pub fn new() -> Self {
        Self {
            installed: RwLock::new(LocalInstallSet::new()),
            report: Mutex::new(InstallReport::failed("no report configured")),
            upgrade_succeeds: AtomicBool::new(true),
            packages: Mutex::new(Vec::new()),
        }
    }

    /// インストール済みとして登録
    pub fn add_installed(&self, plugin_id: &str, version: &str) {
        self.installed.write().unwrap().insert(plugin_id, version);
    }

    /// 次回以降の install_package の結果を設定
    pub fn set_report(&self, report: InstallReport) {
        *self.report.lock().unwrap() = report;
    }

    pub fn set_upgrade_succeeds(&self, succeeds: bool) {
        self.upgrade_succeeds.store(succeeds, Ordering::SeqCst);
    }

    /// install_package に渡されたパス
    pub fn packages(&self) -> Vec<PathBuf> {
        self.packages.lock().unwrap().clone()
    }

    pub fn installed_version(&self, plugin_id: &str) -> Option<String> {
        self.installed
            .read()
            .unwrap()
            .version_of(plugin_id)
            .map(str::to_string)
    }
}

impl Default for MockInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginInstaller for MockInstaller {
    fn install_package<'a>(&'a self, package: &'a Path) -> BoxFuture<'a, Result<InstallReport>> {
        Box::pin(async move {
            if !package.exists() {
                return Err(MarketError::InstallFailed(format!(
                    "package not found: {}",
                    package.display()
                )));
            }
            self.packages.lock().unwrap().push(package.to_path_buf());

            let report = self.report.lock().unwrap().clone();
            if report.succeeded {
                if let Some(plugin) = &report.new_plugin {
                    self.add_installed(&plugin.plugin_id, &plugin.version);
                }
            }
            Ok(report)
        })
    }

    fn upgrade_package<'a>(
        &'a self,
        existing: &'a InstalledPlugin,
        _package: &'a Path,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            if !self.upgrade_succeeds.load(Ordering::SeqCst) {
                return Ok(false);
            }
            let new_version = self
                .report
                .lock()
                .unwrap()
                .new_plugin
                .as_ref()
                .map(|p| p.version.clone())
                .unwrap_or_else(|| existing.version.clone());
            self.add_installed(&existing.plugin_id, &new_version);
            Ok(true)
        })
    }

    fn installed_plugins(&self) -> BoxFuture<'_, Result<LocalInstallSet>> {
        Box::pin(async move { Ok(self.installed.read().unwrap().clone()) })
    }
}

/// 決められた答えを返す確認ダイアログ
pub struct ScriptedPrompt {
    upgrade_answer: bool,
    restart_answer: bool,
    upgrade_asked: AtomicUsize,
    restart_asked: AtomicUsize,
    restart_requested: AtomicBool,
}

impl ScriptedPrompt {
    pub fn new(upgrade_answer: bool, restart_answer: bool) -> Self {
        Self {
            upgrade_answer,
            restart_answer,
            upgrade_asked: AtomicUsize::new(0),
            restart_asked: AtomicUsize::new(0),
            restart_requested: AtomicBool::new(false),
        }
    }

    pub fn upgrade_asked(&self) -> usize {
        self.upgrade_asked.load(Ordering::SeqCst)
    }

    pub fn restart_asked(&self) -> usize {
        self.restart_asked.load(Ordering::SeqCst)
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested.load(Ordering::SeqCst)
    }
}

impl InstallPrompt for ScriptedPrompt {
    fn confirm_upgrade<'a>(
        &'a self,
        _existing: &'a InstalledPlugin,
        _new_version: &'a str,
    ) -> BoxFuture<'a, bool> {
        self.upgrade_asked.fetch_add(1, Ordering::SeqCst);
        let answer = self.upgrade_answer;
        Box::pin(async move { answer })
    }

    fn confirm_restart(&self) -> BoxFuture<'_, bool> {
        self.restart_asked.fetch_add(1, Ordering::SeqCst);
        let answer = self.restart_answer;
        Box::pin(async move { answer })
    }

    fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
    }
}
