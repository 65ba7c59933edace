//! HTTPトランスポート
//!
//! カタログ取得とパッケージダウンロードに使う通信層の抽象化。
//! 404 は `MarketError::NotFound`、キャンセルは `MarketError::Cancelled` として区別される。

#[cfg(test)]
pub mod mock;

use crate::config::HttpConfig;
use crate::error::{MarketError, Result};
use futures_util::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// ダウンロード進捗
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DownloadProgress {
    /// 0.0 - 100.0
    pub percentage: f64,
    /// bytes/sec
    pub speed: f64,
}

impl DownloadProgress {
    pub fn new(percentage: f64, speed: f64) -> Self {
        Self {
            percentage: percentage.clamp(0.0, 100.0),
            speed: speed.max(0.0),
        }
    }

    /// 表示用文字列: `"{percent}% ({speed} KB/s)"`
    pub fn status_text(&self) -> String {
        format!("{:.0}% ({:.0} KB/s)", self.percentage, self.speed / 1024.0)
    }
}

/// ダウンロード要求
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub dest_dir: PathBuf,
    pub dest_name: String,
}

impl DownloadRequest {
    pub fn dest_path(&self) -> PathBuf {
        self.dest_dir.join(&self.dest_name)
    }
}

/// HTTPトランスポート trait
pub trait HttpTransport: Send + Sync {
    /// URLの内容をバイト列で取得
    fn fetch_raw<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;

    /// ファイルをダウンロードし、保存先パスを返す
    ///
    /// 進捗は `progress` に送られる。`cancel` が発火した場合は
    /// `MarketError::Cancelled` を返す。
    fn download_file<'a>(
        &'a self,
        request: &'a DownloadRequest,
        progress: watch::Sender<DownloadProgress>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<PathBuf>>;
}

/// JSONを取得して型付きでデシリアライズ
pub async fn fetch_json<T: DeserializeOwned>(transport: &dyn HttpTransport, url: &str) -> Result<T> {
    let bytes = transport.fetch_raw(url).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// reqwest による実装
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            http: config.build_client(),
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.http.get(url).send().await?;
        let status = response.status().as_u16();

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MarketError::from_status(url, status, message));
        }

        Ok(response)
    }

    async fn stream_to_file(
        &self,
        request: &DownloadRequest,
        progress: &watch::Sender<DownloadProgress>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(MarketError::Cancelled),
            response = self.get(&request.url) => response?,
        };

        tokio::fs::create_dir_all(&request.dest_dir).await?;
        let dest = request.dest_path();
        let mut file = tokio::fs::File::create(&dest).await?;

        let total = response.content_length().unwrap_or(0);
        let started = Instant::now();
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(MarketError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;

            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            let elapsed = started.elapsed().as_secs_f64();
            let speed = if elapsed > 0.0 {
                downloaded as f64 / elapsed
            } else {
                0.0
            };
            let percentage = if total > 0 {
                downloaded as f64 * 100.0 / total as f64
            } else {
                0.0
            };
            progress.send_replace(DownloadProgress::new(percentage, speed));
        }

        file.flush().await?;
        let speed = progress.borrow().speed;
        progress.send_replace(DownloadProgress::new(100.0, speed));
        Ok(dest)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(&HttpConfig::default())
    }
}

impl HttpTransport for ReqwestTransport {
    fn fetch_raw<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            debug!(url, "GET");
            let response = self.get(url).await?;
            Ok(response.bytes().await?.to_vec())
        })
    }

    fn download_file<'a>(
        &'a self,
        request: &'a DownloadRequest,
        progress: watch::Sender<DownloadProgress>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(async move {
            debug!(url = %request.url, dest = %request.dest_path().display(), "download");
            let result = self.stream_to_file(request, &progress, &cancel).await;
            if result.is_err() {
                // 途中まで書いたファイルは残さない
                remove_partial(&request.dest_path()).await;
            }
            result
        })
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(path = %path.display(), error = %e, "failed to remove partial download");
        }
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
