//! pmarket list コマンド
//!
//! カタログのプラグイン一覧をインストール状態付きで表示する。

use super::context::MarketContext;
use crate::output::action_label;
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, Table};
use owo_colors::OwoColorize;
use plugin_market::market::{
    ActionStatus, CatalogEntry, CategoryCounts, CategoryFilter, InstallStatus, MarketEntry,
    PluginCategory,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(after_help = "CATEGORIES:\n  all, translate, ocr, tts, vocabulary")]
pub struct Args {
    /// Filter by category
    #[arg(long, default_value = "all")]
    pub category: CategoryFilter,

    /// Case-insensitive match on name, author or description
    #[arg(long)]
    pub filter: Option<String>,

    /// Show only installed plugins
    #[arg(long)]
    pub installed: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ListRow<'a> {
    #[serde(flatten)]
    info: &'a CatalogEntry,
    status: InstallStatus,
    action: ActionStatus,
}

pub async fn run(args: Args) -> Result<(), String> {
    let context = MarketContext::open()?;
    let catalog = context.load_catalog().await?;

    if catalog.is_empty() {
        println!("No plugins available");
        return Ok(());
    }

    let mut entries = catalog.filter(args.category, args.filter.as_deref().unwrap_or(""));
    if args.installed {
        entries.retain(|e| e.status().installed);
    }
    entries.sort_by(|a, b| a.info().name.to_lowercase().cmp(&b.info().name.to_lowercase()));

    if args.json {
        print_json(&entries)
    } else {
        print_table(&entries, &catalog.counts());
        Ok(())
    }
}

fn print_json(entries: &[Arc<MarketEntry>]) -> Result<(), String> {
    let rows: Vec<ListRow> = entries
        .iter()
        .map(|e| ListRow {
            info: e.info(),
            status: e.status(),
            action: e.action_status(),
        })
        .collect();
    let json = serde_json::to_string_pretty(&rows).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn print_table(entries: &[Arc<MarketEntry>], counts: &CategoryCounts) {
    if entries.is_empty() {
        println!("No plugins matched");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Name", "ID", "Category", "Author", "Version", "Status"]);

        for entry in entries {
            let info = entry.info();
            let status = entry.status();
            let version = match &status.installed_version {
                Some(local) if status.can_upgrade => format!("{} → {}", local, info.version),
                _ => info.version.clone(),
            };
            table.add_row(vec![
                info.name.clone(),
                info.plugin_id.clone(),
                info.category.to_string(),
                info.author.clone(),
                version,
                action_label(status.action_status()),
            ]);
        }
        println!("{table}");
    }

    let breakdown: Vec<String> = PluginCategory::ALL
        .iter()
        .map(|c| format!("{} {}", c, counts.get(*c)))
        .collect();
    println!(
        "{} shown / {} total ({})",
        entries.len().bold(),
        counts.total,
        breakdown.join(", ").dimmed()
    );
}
