//! プラグインマーケット同期・インストールエンジン
//!
//! リモートカタログからプラグインを発見し、ローカルのインストール状態と突き合わせ、
//! 並列数を制限したダウンロードとインストール判断フローを駆動する。

pub mod config;
pub mod env;
pub mod error;
pub mod http;
pub mod install;
pub mod market;
pub mod version;

pub use error::{MarketError, Result};
