//! ダウンロード・インストールの進行管理
//!
//! エントリごとの状態遷移:
//!
//! ```text
//!   Idle ──start()──▶ Downloading ──▶ Installing ──▶ { Installed | PendingRestart }
//!                        │                │
//!                        ├─ cancel ───────┼──▶ Cancelled
//!                        └─ error ────────┴──▶ Failed
//!                                                   └──▶ Idle
//! ```
//!
//! キャンセルはダウンロード中のみ有効。インストールが始まった後の要求は無視される。

use super::{InstallPrompt, InstallResult, InstalledPlugin, Notice, PluginInstaller};
use crate::config::MarketOptions;
use crate::error::{MarketError, Result};
use crate::http::{DownloadProgress, DownloadRequest, HttpTransport};
use crate::market::{Catalog, MarketEntry, SourceUrlBuilder};
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// ダウンロードした一時ファイルの拡張子
const STAGING_EXTENSION: &str = "zip";
/// インストーラに渡すパッケージの拡張子
const PACKAGE_EXTENSION: &str = "spkg";

/// 1 回の start() の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// ダウンロード中、または最新版がインストール済み
    Rejected,
    Installed,
    Upgraded { restart_requested: bool },
    /// 更新確認で拒否された
    UpgradeDeclined,
    Cancelled,
    Failed(String),
}

/// ダウンロード・インストールオーケストレーター
pub struct InstallOrchestrator {
    transport: Arc<dyn HttpTransport>,
    installer: Arc<dyn PluginInstaller>,
    prompt: Arc<dyn InstallPrompt>,
    urls: SourceUrlBuilder,
    catalog: Arc<RwLock<Catalog>>,
    staging_dir: PathBuf,
    downloads: Arc<Semaphore>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl InstallOrchestrator {
    /// 通知の受信側と一緒に生成する
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        installer: Arc<dyn PluginInstaller>,
        prompt: Arc<dyn InstallPrompt>,
        urls: SourceUrlBuilder,
        catalog: Arc<RwLock<Catalog>>,
        staging_dir: PathBuf,
        options: &MarketOptions,
    ) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notices, receiver) = mpsc::unbounded_channel();
        let orchestrator = Self {
            transport,
            installer,
            prompt,
            urls,
            catalog,
            staging_dir,
            downloads: Arc::new(Semaphore::new(options.max_active_downloads.max(1))),
            notices,
        };
        (orchestrator, receiver)
    }

    /// ダウンロードからインストールまでを実行する
    pub async fn start(&self, entry: &Arc<MarketEntry>) -> InstallOutcome {
        let Some(token) = entry.try_begin_download() else {
            debug!(plugin = entry.plugin_id(), "start rejected");
            return InstallOutcome::Rejected;
        };

        let outcome = self.run(entry, token).await;
        entry.end_download();
        info!(plugin = entry.plugin_id(), ?outcome, "install finished");
        outcome
    }

    /// 複数エントリをまとめて開始する
    ///
    /// 同時に転送するのは `max_active_downloads` 件まで。
    pub async fn start_many(&self, entries: &[Arc<MarketEntry>]) -> Vec<(String, InstallOutcome)> {
        join_all(entries.iter().map(|entry| async move {
            (entry.plugin_id().to_string(), self.start(entry).await)
        }))
        .await
    }

    /// ダウンロードをキャンセル
    pub fn cancel(&self, entry: &MarketEntry) -> bool {
        entry.cancel_download()
    }

    async fn run(&self, entry: &Arc<MarketEntry>, token: CancellationToken) -> InstallOutcome {
        let id = entry.plugin_id();

        let downloaded = match self.download(entry, token).await {
            Ok(path) => path,
            Err(e) if e.is_cancelled() => {
                self.notify(Notice::warning(id, "Download cancelled"));
                return InstallOutcome::Cancelled;
            }
            Err(e) => {
                self.notify(Notice::error(id, format!("Download failed: {}", e)));
                return InstallOutcome::Failed(e.to_string());
            }
        };

        let package = match stage_package(&downloaded).await {
            Ok(path) => path,
            Err(e) => {
                remove_quietly(&downloaded).await;
                self.notify(Notice::error(id, format!("Install failed: {}", e)));
                return InstallOutcome::Failed(e.to_string());
            }
        };

        let outcome = self.install(entry, &package).await;
        remove_quietly(&package).await;
        outcome
    }

    async fn download(&self, entry: &Arc<MarketEntry>, token: CancellationToken) -> Result<PathBuf> {
        // キャンセル済みなら空きが出ていても転送を始めない
        let _permit = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(MarketError::Cancelled),
            permit = self.downloads.clone().acquire_owned() => {
                permit.map_err(|_| MarketError::Cancelled)?
            }
        };

        let info = entry.info();
        let request = DownloadRequest {
            url: self.urls.apply_download_proxy(&info.download_url),
            dest_dir: self.staging_dir.clone(),
            dest_name: format!("{}.{}", info.package_name, STAGING_EXTENSION),
        };

        let (progress, mut receiver) = watch::channel(DownloadProgress::default());
        let target = entry.clone();
        let forwarder = tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let progress = *receiver.borrow_and_update();
                target.report_progress(progress);
            }
        });

        let result = self.transport.download_file(&request, progress, token).await;
        if let Err(e) = forwarder.await {
            debug!(error = %e, "progress forwarder stopped");
        }
        result
    }

    async fn install(&self, entry: &MarketEntry, package: &Path) -> InstallOutcome {
        let id = entry.plugin_id();

        let report = match self.installer.install_package(package).await {
            Ok(report) => report,
            Err(e) => {
                self.notify(Notice::error(id, format!("Install failed: {}", e)));
                return InstallOutcome::Failed(e.to_string());
            }
        };

        match report.classify() {
            InstallResult::Succeeded => {
                let version = entry.info().version.clone();
                entry.update_status(|s| {
                    s.installed = true;
                    s.installed_version = Some(version);
                    s.can_upgrade = false;
                });
                self.reconcile().await;
                self.notify(Notice::success(id, "Installed"));
                InstallOutcome::Installed
            }
            InstallResult::RequiresUpgrade { existing } => {
                self.upgrade(entry, &existing, package).await
            }
            InstallResult::Failed(message) => {
                self.notify(Notice::error(id, format!("Install failed: {}", message)));
                InstallOutcome::Failed(message)
            }
        }
    }

    async fn upgrade(&self, entry: &MarketEntry, existing: &InstalledPlugin, package: &Path) -> InstallOutcome {
        let id = entry.plugin_id();

        if !self
            .prompt
            .confirm_upgrade(existing, &entry.info().version)
            .await
        {
            debug!(plugin = id, "upgrade declined");
            return InstallOutcome::UpgradeDeclined;
        }

        match self.installer.upgrade_package(existing, package).await {
            Ok(true) => {}
            Ok(false) => {
                self.notify(Notice::error(id, "Upgrade failed"));
                return InstallOutcome::Failed("upgrade failed".to_string());
            }
            Err(e) => {
                self.notify(Notice::error(id, format!("Upgrade failed: {}", e)));
                return InstallOutcome::Failed(e.to_string());
            }
        }

        self.notify(Notice::success(
            id,
            format!("Upgraded {} -> {}", existing.version, entry.info().version),
        ));
        self.reconcile().await;

        if self.prompt.confirm_restart().await {
            self.prompt.request_restart();
            InstallOutcome::Upgraded {
                restart_requested: true,
            }
        } else {
            entry.update_status(|s| s.pending_restart = true);
            InstallOutcome::Upgraded {
                restart_requested: false,
            }
        }
    }

    /// インストーラの現在状態でカタログ全体を突き合わせる
    pub async fn reconcile(&self) {
        match self.installer.installed_plugins().await {
            Ok(local) => self
                .catalog
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .reconcile(&local),
            Err(e) => warn!(error = %e, "failed to read installed plugins"),
        }
    }

    fn notify(&self, notice: Notice) {
        // 受信側がいなくても処理は続ける
        let _ = self.notices.send(notice);
    }
}

/// `{package}.zip` を `{package}.spkg` に置き換える
///
/// 既存のファイルは先に削除する。削除と改名の間で中断した場合はダウンロードからやり直す。
async fn stage_package(downloaded: &Path) -> Result<PathBuf> {
    let package = downloaded.with_extension(PACKAGE_EXTENSION);
    if tokio::fs::try_exists(&package).await? {
        tokio::fs::remove_file(&package).await?;
    }
    tokio::fs::rename(downloaded, &package).await?;
    Ok(package)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "failed to remove staged package");
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
