use thiserror::Error;

/// プラグインマーケット統一エラー型
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Not found: {url}")]
    NotFound { url: String },

    #[error("HTTP error: {message} (status: {status}, url: {url})")]
    Http {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Download cancelled")]
    Cancelled,

    #[error("Invalid plugin identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, MarketError>;

impl MarketError {
    /// HTTPステータスからエラーを生成（404 は NotFound に振り分ける）
    pub fn from_status(url: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        let url = url.into();
        if status == 404 {
            MarketError::NotFound { url }
        } else {
            MarketError::Http {
                url,
                status,
                message: message.into(),
            }
        }
    }

    /// 404 かどうか
    ///
    /// ブランチ探索のフォールバック判定にのみ使う。
    pub fn is_not_found(&self) -> bool {
        match self {
            MarketError::NotFound { .. } => true,
            MarketError::Network(e) => e.status().is_some_and(|s| s.as_u16() == 404),
            _ => false,
        }
    }

    /// キャンセルによる中断かどうか
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MarketError::Cancelled)
    }

    /// リトライ可能なエラーかどうか
    pub fn is_retryable(&self) -> bool {
        match self {
            MarketError::Network(_) => true,
            MarketError::Http { status, .. } => {
                // 5xx エラーはリトライ可能
                *status >= 500 && *status < 600
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
