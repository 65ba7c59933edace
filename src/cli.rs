use clap::{Parser, Subcommand};

use crate::commands::{config, install, list};

#[derive(Debug, Parser)]
#[command(name = "pmarket")]
#[command(about = "Plugin market CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// マーケットのプラグイン一覧
    #[command(
        long_about = "Fetch the plugin catalog and show each plugin with its install status."
    )]
    List(list::Args),

    /// プラグインのダウンロードとインストール
    #[command(
        long_about = "Download plugins from the catalog and install or upgrade them. Press Ctrl-C to cancel running downloads."
    )]
    Install(install::Args),

    /// CDN・ダウンロードプロキシ設定
    #[command(
        long_about = "Show or change the CDN source used for metadata and the proxy used for package downloads."
    )]
    Config(config::Args),
}
