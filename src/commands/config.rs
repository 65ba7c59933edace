use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use owo_colors::OwoColorize;
use plugin_market::config::{MarketSettings, SettingsHandle};
use plugin_market::market::{CdnSource, DownloadProxy};

#[derive(Debug, Parser)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show current settings
    #[command(long_about = "Display the CDN source, download proxy and language in use.")]
    Show,

    /// Change settings
    #[command(
        long_about = "Update settings. Changing the CDN source makes the next catalog load use the new source.",
        after_help = "CDN SOURCES:\n  jsdelivr, github_raw, custom\n\nDOWNLOAD PROXIES:\n  direct, gh_proxy_mirror, gh_proxy_net, custom\n\nTEMPLATES:\n  CDN:   {author} {repo} {branch} {path}\n  Proxy: {url}"
    )]
    Set {
        /// CDN source for metadata, icons and the plugin list
        #[arg(long)]
        cdn: Option<CdnSource>,

        /// URL template used when the CDN source is custom
        #[arg(long)]
        cdn_template: Option<String>,

        /// Proxy for package downloads
        #[arg(long)]
        proxy: Option<DownloadProxy>,

        /// URL template used when the download proxy is custom
        #[arg(long)]
        proxy_template: Option<String>,

        /// Language for localized plugin names (e.g. zh-cn, en)
        #[arg(long)]
        language: Option<String>,
    },

    /// Print the settings file path
    Path,
}

pub async fn run(args: Args) -> Result<(), String> {
    match args.command {
        Command::Show => run_show(),
        Command::Set {
            cdn,
            cdn_template,
            proxy,
            proxy_template,
            language,
        } => run_set(SettingsChange {
            cdn,
            cdn_template,
            proxy,
            proxy_template,
            language,
        }),
        Command::Path => {
            println!("{}", MarketSettings::default_path().display());
            Ok(())
        }
    }
}

fn load() -> Result<MarketSettings, String> {
    MarketSettings::load(&MarketSettings::default_path())
        .map_err(|e| format!("Failed to load settings: {}", e))
}

fn run_show() -> Result<(), String> {
    let settings = load()?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["Key", "Value"]);
    table.add_row(vec!["cdn_source".to_string(), settings.cdn_source.to_string()]);
    table.add_row(vec!["custom_cdn_template".to_string(), or_unset(&settings.custom_cdn_template)]);
    table.add_row(vec!["download_proxy".to_string(), settings.download_proxy.to_string()]);
    table.add_row(vec![
        "custom_proxy_template".to_string(),
        or_unset(&settings.custom_proxy_template),
    ]);
    table.add_row(vec!["language".to_string(), settings.language.clone()]);
    println!("{table}");
    Ok(())
}

fn or_unset(value: &str) -> String {
    if value.is_empty() {
        "(unset)".to_string()
    } else {
        value.to_string()
    }
}

struct SettingsChange {
    cdn: Option<CdnSource>,
    cdn_template: Option<String>,
    proxy: Option<DownloadProxy>,
    proxy_template: Option<String>,
    language: Option<String>,
}

impl SettingsChange {
    fn is_empty(&self) -> bool {
        self.cdn.is_none()
            && self.cdn_template.is_none()
            && self.proxy.is_none()
            && self.proxy_template.is_none()
            && self.language.is_none()
    }

    fn apply_to(self, mut settings: MarketSettings) -> MarketSettings {
        if let Some(cdn) = self.cdn {
            settings.cdn_source = cdn;
        }
        if let Some(template) = self.cdn_template {
            settings.custom_cdn_template = template;
        }
        if let Some(proxy) = self.proxy {
            settings.download_proxy = proxy;
        }
        if let Some(template) = self.proxy_template {
            settings.custom_proxy_template = template;
        }
        if let Some(language) = self.language {
            settings.language = language;
        }
        settings
    }
}

fn run_set(change: SettingsChange) -> Result<(), String> {
    if change.is_empty() {
        return Err("Nothing to change. See `pmarket config set --help`".to_string());
    }

    let current = load()?;
    let updated = change.apply_to(current.clone());

    if updated.cdn_source == CdnSource::Custom && updated.custom_cdn_template.is_empty() {
        return Err("Custom CDN source requires --cdn-template".to_string());
    }
    if updated.download_proxy == DownloadProxy::Custom && updated.custom_proxy_template.is_empty() {
        return Err("Custom download proxy requires --proxy-template".to_string());
    }

    let handle = SettingsHandle::new(current);
    let cdn_changed = handle.apply(updated.clone());

    updated
        .save(&MarketSettings::default_path())
        .map_err(|e| format!("Failed to save settings: {}", e))?;

    println!("{} Settings saved", "✓".green());
    if cdn_changed {
        println!(
            "  The plugin catalog will be fetched from {} next time",
            updated.cdn_source.to_string().cyan()
        );
    }
    Ok(())
}
