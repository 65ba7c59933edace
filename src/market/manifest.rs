//! リモートの plugin.json とローカライズ情報のスキーマ

use serde::{Deserialize, Serialize};

/// `{package}/plugin.json`
///
/// 欠けたフィールドは空文字列として扱う。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RemoteManifest {
    #[serde(rename = "PluginID")]
    pub plugin_id: String,
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
    pub website: String,
}

/// `{package}/Languages/{language}.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LocalizedOverlay {
    pub name: String,
    pub description: String,
}

impl LocalizedOverlay {
    /// 空でないフィールドだけを上書きした (name, description) を返す
    pub fn merge(overlay: Option<&LocalizedOverlay>, name: &str, description: &str) -> (String, String) {
        let pick = |value: Option<&String>, fallback: &str| match value {
            Some(v) if !v.trim().is_empty() => v.clone(),
            _ => fallback.to_string(),
        };
        (
            pick(overlay.map(|o| &o.name), name),
            pick(overlay.map(|o| &o.description), description),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_pascal_case() {
        let json = r#"{
            "PluginID": "abc123",
            "Name": "DeepL",
            "Description": "translator",
            "Author": "someone",
            "Version": "1.2.3",
            "Website": "https://example.com",
            "ExecuteFileName": "ignored.dll"
        }"#;
        let manifest: RemoteManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.plugin_id, "abc123");
        assert_eq!(manifest.name, "DeepL");
        assert_eq!(manifest.version, "1.2.3");
        assert_eq!(manifest.website, "https://example.com");
    }

    #[test]
    fn test_parse_manifest_missing_fields() {
        let manifest: RemoteManifest = serde_json::from_str(r#"{"Name": "X"}"#).unwrap();
        assert_eq!(manifest.name, "X");
        assert!(manifest.version.is_empty());
        assert!(manifest.plugin_id.is_empty());
    }

    #[test]
    fn test_merge_overlay() {
        let overlay = LocalizedOverlay {
            name: "翻訳".to_string(),
            description: String::new(),
        };
        let (name, description) = LocalizedOverlay::merge(Some(&overlay), "Translate", "desc");
        assert_eq!(name, "翻訳");
        assert_eq!(description, "desc");
    }

    #[test]
    fn test_merge_without_overlay() {
        let (name, description) = LocalizedOverlay::merge(None, "Translate", "desc");
        assert_eq!(name, "Translate");
        assert_eq!(description, "desc");
    }
}
