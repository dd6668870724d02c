//! The asset manifest: resources that must be cached for offline use.

use crate::config::AppConfig;

/// Ordered list of resource identifiers, relative paths or absolute URLs.
///
/// Fixed at startup. Duplicates are kept; each occurrence is fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetManifest {
    entries: Vec<String>,
}

impl AssetManifest {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { entries: entries.into_iter().map(Into::into).collect() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.assets.iter().cloned())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_order_and_duplicates() {
        let manifest = AssetManifest::new(["/", "/note.mp3", "https://cdn.example.net/lib.js", "/note.mp3"]);
        assert_eq!(manifest.len(), 4);
        assert_eq!(
            manifest.iter().collect::<Vec<_>>(),
            vec!["/", "/note.mp3", "https://cdn.example.net/lib.js", "/note.mp3"]
        );
    }

    #[test]
    fn test_empty() {
        assert!(AssetManifest::default().is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = AppConfig::default();
        let manifest = AssetManifest::from_config(&config);
        assert_eq!(manifest.len(), config.assets.len());
        assert_eq!(manifest.iter().next(), Some("/"));
    }
}
