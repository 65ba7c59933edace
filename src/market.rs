//! プラグインマーケット
//!
//! リモートカタログの取得と、ローカルインストール状態との突き合わせを提供する。

pub mod branch;
pub mod catalog;
pub mod entry;
pub mod fetcher;
pub mod manifest;
pub mod source;

pub use branch::{BranchCache, BranchResolution, BranchResolver, CANDIDATE_BRANCHES};
pub use catalog::{reconcile, Catalog, CategoryCounts, CategoryFilter, LocalInstallSet};
pub use entry::{ActionStatus, CatalogEntry, InstallStatus, MarketEntry, PluginCategory};
pub use fetcher::{CatalogFetcher, LoadOutcome, PluginIdentifier};
pub use manifest::{LocalizedOverlay, RemoteManifest};
pub use source::{CdnSource, DownloadProxy, SourceUrlBuilder};
