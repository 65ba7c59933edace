use std::path::PathBuf;

/// 環境変数ユーティリティ
pub struct EnvVar;

impl EnvVar {
    /// 環境変数を取得（空文字列はNoneとして扱う）
    pub fn get(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.is_empty())
    }

    /// データディレクトリを取得
    ///
    /// 優先順位: 1. PMARKET_HOME, 2. $HOME/.pmarket, 3. ./.pmarket
    pub fn data_dir() -> PathBuf {
        if let Some(dir) = Self::get("PMARKET_HOME") {
            return PathBuf::from(dir);
        }
        Self::get("HOME")
            .or_else(|| Self::get("USERPROFILE"))
            .map(|home| PathBuf::from(home).join(".pmarket"))
            .unwrap_or_else(|| PathBuf::from(".pmarket"))
    }
}
