//! ファイルベースのインストーラ
//!
//! CLI 用の `PluginInstaller` 実装。パッケージ内の plugin.json から
//! ID とバージョンを読み取り、`{root}/plugins/{id}.spkg` に配置して
//! `{root}/registry.json` に記録する。

use super::{InstallReport, InstalledPlugin, PluginInstaller};
use crate::env::EnvVar;
use crate::error::{MarketError, Result};
use crate::http::BoxFuture;
use crate::market::{LocalInstallSet, RemoteManifest};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::info;
use zip::ZipArchive;

const REGISTRY_FILE: &str = "registry.json";
const PLUGINS_DIR: &str = "plugins";
const MANIFEST_NAME: &str = "plugin.json";

/// 登録済みプラグイン 1 件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub plugin_id: String,
    pub name: String,
    pub version: String,
    pub package_path: PathBuf,
    /// RFC3339
    pub installed_at: String,
}

impl RegistryRecord {
    pub fn to_installed(&self) -> InstalledPlugin {
        InstalledPlugin {
            plugin_id: self.plugin_id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryFile {
    plugins: Vec<RegistryRecord>,
}

/// registry.json を使うインストーラ
///
/// クローンは同じ書き込みロックを共有する。
#[derive(Debug, Clone)]
pub struct RegistryInstaller {
    registry_path: PathBuf,
    plugins_dir: PathBuf,
    // 読み込み〜保存を直列化する
    write_lock: Arc<Mutex<()>>,
}

impl RegistryInstaller {
    pub fn new(root: &Path) -> Self {
        Self {
            registry_path: root.join(REGISTRY_FILE),
            plugins_dir: root.join(PLUGINS_DIR),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// `$PMARKET_HOME` を使う
    pub fn with_defaults() -> Self {
        Self::new(&EnvVar::data_dir())
    }

    fn load(&self) -> Result<RegistryFile> {
        match fs::read_to_string(&self.registry_path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RegistryFile::default()),
            Err(e) => Err(MarketError::Io(e)),
        }
    }

    fn save(&self, registry: &RegistryFile) -> Result<()> {
        let parent = self.registry_path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        let content = serde_json::to_string_pretty(registry)?;
        let mut temp_file = NamedTempFile::new_in(parent)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file
            .persist(&self.registry_path)
            .map_err(|e| MarketError::Config(format!("Failed to persist registry: {}", e)))?;
        Ok(())
    }

    /// 登録済みの一覧
    pub fn records(&self) -> Result<Vec<RegistryRecord>> {
        Ok(self.load()?.plugins)
    }

    /// パッケージから plugin.json を読む
    ///
    /// ルート直下を優先し、なければ最も浅い階層のものを使う。
    pub fn read_manifest(package: &Path) -> Result<RemoteManifest> {
        let file = fs::File::open(package)?;
        let mut archive = ZipArchive::new(file)?;

        let name = archive
            .file_names()
            .filter(|n| *n == MANIFEST_NAME || n.ends_with(&format!("/{}", MANIFEST_NAME)))
            .min_by_key(|n| n.matches('/').count())
            .map(str::to_string)
            .ok_or_else(|| {
                MarketError::InstallFailed(format!("{} not found in package", MANIFEST_NAME))
            })?;

        let mut content = String::new();
        archive.by_name(&name)?.read_to_string(&mut content)?;
        let manifest: RemoteManifest = serde_json::from_str(&content)?;

        if manifest.plugin_id.trim().is_empty() {
            return Err(MarketError::InstallFailed(
                "PluginID is missing in plugin.json".to_string(),
            ));
        }
        Ok(manifest)
    }

    /// パッケージを配置して記録を更新する
    fn store(&self, registry: &mut RegistryFile, manifest: &RemoteManifest, package: &Path) -> Result<()> {
        fs::create_dir_all(&self.plugins_dir)?;
        let dest = self
            .plugins_dir
            .join(format!("{}.spkg", sanitize(&manifest.plugin_id)));
        fs::copy(package, &dest)?;

        let record = RegistryRecord {
            plugin_id: manifest.plugin_id.clone(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            package_path: dest,
            installed_at: Utc::now().to_rfc3339(),
        };
        registry.plugins.retain(|r| r.plugin_id != record.plugin_id);
        registry.plugins.push(record);
        self.save(registry)
    }

    fn install_blocking(&self, package: &Path) -> Result<InstallReport> {
        let manifest = match Self::read_manifest(package) {
            Ok(manifest) => manifest,
            Err(e) => return Ok(InstallReport::failed(e.to_string())),
        };
        let new_plugin = InstalledPlugin {
            plugin_id: manifest.plugin_id.clone(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
        };

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut registry = self.load()?;

        if let Some(existing) = registry
            .plugins
            .iter()
            .find(|r| r.plugin_id == manifest.plugin_id)
        {
            return Ok(InstallReport::requires_upgrade(existing.to_installed(), new_plugin));
        }

        self.store(&mut registry, &manifest, package)?;
        info!(plugin = %manifest.plugin_id, version = %manifest.version, "plugin installed");
        Ok(InstallReport::succeeded(new_plugin))
    }

    fn upgrade_blocking(&self, existing: &InstalledPlugin, package: &Path) -> Result<bool> {
        let manifest = Self::read_manifest(package)?;
        if manifest.plugin_id != existing.plugin_id {
            return Ok(false);
        }

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut registry = self.load()?;
        if !registry.plugins.iter().any(|r| r.plugin_id == existing.plugin_id) {
            return Ok(false);
        }

        self.store(&mut registry, &manifest, package)?;
        info!(
            plugin = %manifest.plugin_id,
            from = %existing.version,
            to = %manifest.version,
            "plugin upgraded"
        );
        Ok(true)
    }
}

impl PluginInstaller for RegistryInstaller {
    fn install_package<'a>(&'a self, package: &'a Path) -> BoxFuture<'a, Result<InstallReport>> {
        let installer = self.clone();
        let package = package.to_path_buf();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || installer.install_blocking(&package))
                .await
                .map_err(|e| MarketError::InstallFailed(e.to_string()))?
        })
    }

    fn upgrade_package<'a>(
        &'a self,
        existing: &'a InstalledPlugin,
        package: &'a Path,
    ) -> BoxFuture<'a, Result<bool>> {
        let installer = self.clone();
        let existing = existing.clone();
        let package = package.to_path_buf();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || installer.upgrade_blocking(&existing, &package))
                .await
                .map_err(|e| MarketError::InstallFailed(e.to_string()))?
        })
    }

    fn installed_plugins(&self) -> BoxFuture<'_, Result<LocalInstallSet>> {
        let installer = self.clone();
        Box::pin(async move {
            let records = tokio::task::spawn_blocking(move || installer.records())
                .await
                .map_err(|e| MarketError::InstallFailed(e.to_string()))??;
            Ok(records
                .into_iter()
                .map(|r| (r.plugin_id, r.version))
                .collect())
        })
    }
}

/// ファイル名に使えない文字を置き換える
fn sanitize(plugin_id: &str) -> String {
    plugin_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
