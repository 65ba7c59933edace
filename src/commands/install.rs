//! pmarket install コマンド
//!
//! カタログから指定プラグインを探し、並列にダウンロードしてインストールする。

use super::context::MarketContext;
use crate::output::{notice_line, tally, CommandSummary};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use plugin_market::http::BoxFuture;
use plugin_market::install::{InstallOrchestrator, InstallOutcome, InstallPrompt, InstalledPlugin};
use plugin_market::market::MarketEntry;
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;

#[derive(Debug, Parser)]
#[command(after_help = "IDENTIFIERS:\n  Plugin ID or package name, e.g. STranslate.Plugin.Translate.DeepL")]
pub struct Args {
    /// Plugin IDs or package names
    #[arg(required = true)]
    pub plugins: Vec<String>,

    /// Answer yes to upgrade and restart confirmations
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub async fn run(args: Args) -> Result<(), String> {
    let context = MarketContext::open()?;
    let catalog = context.load_catalog().await?;

    let mut targets = Vec::new();
    for key in &args.plugins {
        let entry = catalog
            .lookup(key)
            .ok_or_else(|| format!("Plugin not found in catalog: {}", key))?;
        if !entry.action_status().is_actionable() {
            println!(
                "{} {} is already up to date ({})",
                "•".yellow(),
                entry.info().name,
                entry.info().version
            );
            continue;
        }
        targets.push(entry);
    }
    if targets.is_empty() {
        return Ok(());
    }

    let progress = MultiProgress::new();
    let prompt = Arc::new(TerminalPrompt {
        assume_yes: args.yes,
        progress: progress.clone(),
    });
    let (orchestrator, mut notices) = InstallOrchestrator::new(
        context.transport.clone(),
        context.installer.clone(),
        prompt,
        context.fetcher.urls().clone(),
        Arc::new(RwLock::new(catalog)),
        context.staging_dir(),
        &context.options,
    );

    let printer = {
        let progress = progress.clone();
        tokio::spawn(async move {
            while let Some(notice) = notices.recv().await {
                let _ = progress.println(notice_line(&notice));
            }
        })
    };
    let bars: Vec<(ProgressBar, JoinHandle<()>)> = targets
        .iter()
        .map(|entry| track_progress(&progress, entry))
        .collect();
    let interrupt = {
        let targets = targets.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                for entry in &targets {
                    entry.cancel_download();
                }
            }
        })
    };

    let results = orchestrator.start_many(&targets).await;

    interrupt.abort();
    for (bar, updater) in bars {
        updater.abort();
        bar.finish_and_clear();
    }
    drop(orchestrator);
    if let Err(e) = printer.await {
        tracing::debug!(error = %e, "notice printer stopped");
    }

    let outcomes: Vec<InstallOutcome> = results.into_iter().map(|(_, outcome)| outcome).collect();
    let (success, failure) = tally(&outcomes);
    let summary = CommandSummary::format(success, failure);
    println!("{} {}", summary.prefix, summary.message);

    if failure > 0 {
        Err(format!("{} plugin(s) failed to install", failure))
    } else {
        Ok(())
    }
}

/// エントリの進捗をプログレスバーへ反映する
fn track_progress(progress: &MultiProgress, entry: &Arc<MarketEntry>) -> (ProgressBar, JoinHandle<()>) {
    let bar = progress.add(ProgressBar::new(100));
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:30.cyan/blue}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar.set_prefix(entry.info().name.clone());
    bar.set_message("waiting");

    let mut receiver = entry.subscribe_progress();
    let updater = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let current = *receiver.borrow_and_update();
                bar.set_position(current.percentage as u64);
                bar.set_message(current.status_text());
            }
        })
    };
    (bar, updater)
}

/// inquire による確認
struct TerminalPrompt {
    assume_yes: bool,
    progress: MultiProgress,
}

impl TerminalPrompt {
    fn confirm(&self, message: String, default: bool) -> BoxFuture<'_, bool> {
        let assume_yes = self.assume_yes;
        let progress = self.progress.clone();
        Box::pin(async move {
            if assume_yes {
                return true;
            }
            tokio::task::spawn_blocking(move || {
                progress.suspend(|| {
                    Confirm::new(&message)
                        .with_default(default)
                        .prompt()
                        .unwrap_or(false)
                })
            })
            .await
            .unwrap_or(false)
        })
    }
}

impl InstallPrompt for TerminalPrompt {
    fn confirm_upgrade<'a>(
        &'a self,
        existing: &'a InstalledPlugin,
        new_version: &'a str,
    ) -> BoxFuture<'a, bool> {
        self.confirm(
            format!(
                "{} {} is installed. Upgrade to {}?",
                existing.name, existing.version, new_version
            ),
            true,
        )
    }

    fn confirm_restart(&self) -> BoxFuture<'_, bool> {
        self.confirm("Restart now to load the upgraded plugin?".to_string(), false)
    }

    fn request_restart(&self) {
        let _ = self.progress.println(format!(
            "{} Restart the host application to finish the upgrade",
            "!".yellow()
        ));
    }
}
