//! Extension manifest model.
//!
//! Typed read access for the fields the pipeline consumes, plus the icon
//! mapping patch, the one place the pipeline writes back into the extension
//! root. Patching works on the raw JSON value so fields this model does not
//! know about are never dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StageError;

/// Runtime icon sizes every extension must ship.
pub const RUNTIME_ICON_SIZES: [u32; 3] = [16, 48, 128];

/// Canonical runtime icon path for a size (`icons/icon48.png`).
pub fn runtime_icon_path(size: u32) -> String {
    format!("icons/icon{size}.png")
}

/// `action.default_icon` accepts either a single path or a size map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultIcon {
    Path(String),
    Map(BTreeMap<String, String>),
}

/// The `action` block (popup wiring and toolbar icon).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_popup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_icon: Option<DefaultIcon>,
}

/// The `background` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Background {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_worker: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<String>,
}

/// One `content_scripts` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentScript {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub js: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub css: Vec<String>,
}

/// The manifest fields the pipeline reads. Unknown fields are tolerated on
/// load and untouched on patch (patching goes through the raw value).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub manifest_version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_host_permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub icons: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_scripts: Vec<ContentScript>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_locale: Option<String>,
}

impl Manifest {
    /// Loads and parses the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self, StageError> {
        let text = read_manifest_text(path)?;
        serde_json::from_str(&text).map_err(|e| StageError::ManifestInvalid(e.to_string()))
    }

    /// The extension display name, falling back to a generic label.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Chrome Extension"
        } else {
            self.name.trim()
        }
    }

    /// Existing icon files referenced by the manifest, largest declared size
    /// first, deduplicated. Used to auto-resolve a store icon source.
    pub fn icon_candidates(&self, root: &Path) -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        let mut add = |value: &str| {
            let path = root.join(value);
            if path.is_file() && !candidates.contains(&path) {
                candidates.push(path);
            }
        };

        for (_, value) in sorted_by_size_desc(&self.icons) {
            add(value);
        }
        if let Some(action) = &self.action {
            match &action.default_icon {
                Some(DefaultIcon::Path(value)) => add(value),
                Some(DefaultIcon::Map(map)) => {
                    for (_, value) in sorted_by_size_desc(map) {
                        add(value);
                    }
                }
                None => {}
            }
        }
        candidates
    }

    /// All declared host patterns, required and optional, plus
    /// content-script match patterns.
    pub fn declared_host_patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = Vec::new();
        for pattern in self
            .host_permissions
            .iter()
            .chain(self.optional_host_permissions.iter())
            .chain(self.content_scripts.iter().flat_map(|cs| cs.matches.iter()))
        {
            let token = pattern.trim();
            if !token.is_empty() && !patterns.iter().any(|p| p == token) {
                patterns.push(token.to_string());
            }
        }
        patterns
    }
}

/// Sorts a size-keyed icon map by numeric size, largest first.
fn sorted_by_size_desc(map: &BTreeMap<String, String>) -> Vec<(u32, &String)> {
    let mut entries: Vec<(u32, &String)> = map
        .iter()
        .map(|(key, value)| (key.parse().unwrap_or(0), value))
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0));
    entries
}

fn read_manifest_text(path: &Path) -> Result<String, StageError> {
    if !path.is_file() {
        return Err(StageError::ManifestMissing(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

/// Loads the manifest as a raw JSON value for patching.
pub fn load_value(path: &Path) -> Result<Value, StageError> {
    let text = read_manifest_text(path)?;
    let value: Value =
        serde_json::from_str(&text).map_err(|e| StageError::ManifestInvalid(e.to_string()))?;
    if !value.is_object() {
        return Err(StageError::ManifestInvalid(
            "manifest root must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

/// Writes a patched manifest back with pretty formatting and a trailing
/// newline.
pub fn save_value(path: &Path, value: &Value) -> Result<(), StageError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| StageError::ManifestInvalid(e.to_string()))?;
    fs::write(path, format!("{text}\n"))?;
    Ok(())
}

/// The icon-mapping patch: the only mutation the pipeline applies to an
/// extension root. Computed first, applied only when non-empty, and limited
/// to the `icons` and `action.default_icon` maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconPatch {
    /// Whether `icons` needs to be set to the canonical mapping.
    pub set_icons: bool,
    /// Whether `action.default_icon` needs to be set to the canonical
    /// mapping.
    pub set_action_icon: bool,
}

impl IconPatch {
    /// The canonical runtime icon mapping (`"16"` → `icons/icon16.png`, …).
    pub fn canonical_mapping() -> BTreeMap<String, String> {
        RUNTIME_ICON_SIZES
            .iter()
            .map(|size| (size.to_string(), runtime_icon_path(*size)))
            .collect()
    }

    /// Compares the manifest value against the canonical mapping.
    pub fn compute(manifest: &Value) -> Self {
        let desired = Self::canonical_mapping();
        let desired_value = serde_json::to_value(&desired).expect("string map serializes");

        let icons_ok = manifest.get("icons") == Some(&desired_value);
        let action_icon_ok = manifest
            .get("action")
            .and_then(|action| action.get("default_icon"))
            == Some(&desired_value);

        IconPatch {
            set_icons: !icons_ok,
            set_action_icon: !action_icon_ok,
        }
    }

    /// Whether the patch would change anything.
    pub fn is_empty(&self) -> bool {
        !self.set_icons && !self.set_action_icon
    }

    /// Applies the patch in place. Only the two icon maps are touched;
    /// every other field, including unknown ones, is preserved.
    pub fn apply(&self, manifest: &mut Value) {
        let desired = serde_json::to_value(Self::canonical_mapping()).expect("string map serializes");
        let object = match manifest.as_object_mut() {
            Some(object) => object,
            None => return,
        };
        if self.set_icons {
            object.insert("icons".to_string(), desired.clone());
        }
        if self.set_action_icon {
            let action = object
                .entry("action".to_string())
                .or_insert_with(|| Value::Object(Default::default()));
            if let Some(action) = action.as_object_mut() {
                action.insert("default_icon".to_string(), desired);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_manifest() -> Manifest {
        serde_json::from_value(json!({
            "manifest_version": 3,
            "name": "Tab Tidy",
            "version": "1.4.0",
            "permissions": ["storage", "tabs"],
            "host_permissions": ["https://api.example.com/*"],
            "icons": {"16": "icons/icon16.png", "128": "icons/icon128.png"},
            "action": {
                "default_popup": "popup/popup.html",
                "default_icon": {"16": "icons/icon16.png"}
            },
            "content_scripts": [
                {"matches": ["https://example.com/*"], "js": ["content/main.js"]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_manifest_tolerates_unknown_fields() {
        let manifest: Manifest = serde_json::from_value(json!({
            "manifest_version": 3,
            "name": "X",
            "version": "0.1",
            "minimum_chrome_version": "120",
            "side_panel": {"default_path": "panel.html"}
        }))
        .unwrap();
        assert_eq!(manifest.name, "X");
    }

    #[test]
    fn test_display_name_fallback() {
        let manifest = Manifest::default();
        assert_eq!(manifest.display_name(), "Chrome Extension");
    }

    #[test]
    fn test_declared_host_patterns_merges_content_scripts() {
        let manifest = sample_manifest();
        let patterns = manifest.declared_host_patterns();
        assert_eq!(
            patterns,
            vec!["https://api.example.com/*", "https://example.com/*"]
        );
    }

    #[test]
    fn test_icon_candidates_prefers_largest_existing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("icons")).unwrap();
        std::fs::write(root.join("icons/icon16.png"), b"x").unwrap();
        std::fs::write(root.join("icons/icon128.png"), b"x").unwrap();

        let manifest = sample_manifest();
        let candidates = manifest.icon_candidates(root);
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].ends_with("icons/icon128.png"));
    }

    #[test]
    fn test_icon_patch_empty_when_conforming() {
        let desired = serde_json::to_value(IconPatch::canonical_mapping()).unwrap();
        let manifest = json!({
            "name": "X",
            "icons": desired,
            "action": {"default_icon": desired}
        });
        assert!(IconPatch::compute(&manifest).is_empty());
    }

    #[test]
    fn test_icon_patch_preserves_unrelated_fields() {
        let mut manifest = json!({
            "name": "X",
            "version": "1.0",
            "minimum_chrome_version": "120",
            "action": {"default_popup": "popup.html"}
        });
        let patch = IconPatch::compute(&manifest);
        assert!(!patch.is_empty());
        patch.apply(&mut manifest);

        assert_eq!(manifest["name"], "X");
        assert_eq!(manifest["minimum_chrome_version"], "120");
        assert_eq!(manifest["action"]["default_popup"], "popup.html");
        assert_eq!(manifest["icons"]["48"], "icons/icon48.png");
        assert_eq!(manifest["action"]["default_icon"]["128"], "icons/icon128.png");
    }

    #[test]
    fn test_load_value_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            load_value(&path),
            Err(StageError::ManifestInvalid(_))
        ));
    }
}
