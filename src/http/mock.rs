//! テスト用モックトランスポート

use super::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Notify;

/// 取得時の応答
#[derive(Debug, Clone)]
pub enum MockResponse {
    Body(Vec<u8>),
    NotFound,
    Status(u16),
}

/// ダウンロード時の振る舞い
#[derive(Debug, Clone)]
pub enum MockDownload {
    /// 進捗を段階的に送り、内容を書き込んで完了
    Complete { content: Vec<u8>, steps: Vec<f64> },
    /// キャンセルされるまで待機
    WaitForCancel,
    /// ステータスエラーで失敗
    Fail(u16),
}

/// テスト用モックトランスポート
pub struct MockTransport {
    responses: RwLock<HashMap<String, MockResponse>>,
    downloads: RwLock<HashMap<String, MockDownload>>,
    calls: Mutex<Vec<String>>,
    download_started: Arc<Notify>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            downloads: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            download_started: Arc::new(Notify::new()),
        }
    }

    /// JSON 応答を追加
    pub fn add_json(&self, url: &str, json: &str) {
        self.responses
            .write()
            .unwrap()
            .insert(url.to_string(), MockResponse::Body(json.as_bytes().to_vec()));
    }

    /// 404 応答を追加
    pub fn add_not_found(&self, url: &str) {
        self.responses
            .write()
            .unwrap()
            .insert(url.to_string(), MockResponse::NotFound);
    }

    /// 任意ステータスの失敗応答を追加
    pub fn add_status(&self, url: &str, status: u16) {
        self.responses
            .write()
            .unwrap()
            .insert(url.to_string(), MockResponse::Status(status));
    }

    /// ダウンロードの振る舞いを設定
    pub fn add_download(&self, url: &str, behavior: MockDownload) {
        self.downloads
            .write()
            .unwrap()
            .insert(url.to_string(), behavior);
    }

    /// 呼び出されたURL一覧
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// 指定URLが呼ばれた回数
    pub fn call_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == url)
            .count()
    }

    /// ダウンロード開始通知
    pub fn download_started(&self) -> Arc<Notify> {
        self.download_started.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for MockTransport {
    fn fetch_raw<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        self.calls.lock().unwrap().push(url.to_string());
        // 未登録のURLは 404 扱い
        let response = self
            .responses
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(MockResponse::NotFound);

        Box::pin(async move {
            tokio::task::yield_now().await;
            match response {
                MockResponse::Body(body) => Ok(body),
                MockResponse::NotFound => Err(MarketError::from_status(url, 404, "Not Found")),
                MockResponse::Status(status) => Err(MarketError::from_status(url, status, "error")),
            }
        })
    }

    fn download_file<'a>(
        &'a self,
        request: &'a DownloadRequest,
        progress: watch::Sender<DownloadProgress>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        self.calls.lock().unwrap().push(request.url.clone());
        let behavior = self
            .downloads
            .read()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or(MockDownload::Fail(404));
        let started = self.download_started.clone();

        Box::pin(async move {
            started.notify_one();
            match behavior {
                MockDownload::Complete { content, steps } => {
                    for step in steps {
                        if cancel.is_cancelled() {
                            return Err(MarketError::Cancelled);
                        }
                        progress.send_replace(DownloadProgress::new(step, 2048.0));
                        tokio::task::yield_now().await;
                    }
                    tokio::fs::create_dir_all(&request.dest_dir).await?;
                    let dest = request.dest_path();
                    tokio::fs::write(&dest, content).await?;
                    Ok(dest)
                }
                MockDownload::WaitForCancel => {
                    progress.send_replace(DownloadProgress::new(10.0, 1024.0));
                    cancel.cancelled().await;
                    Err(MarketError::Cancelled)
                }
                MockDownload::Fail(status) => {
                    Err(MarketError::from_status(&request.url, status, "download failed"))
                }
            }
        })
    }
}
