use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Public share URLs of uploaded files, keyed by local path.
#[derive(Debug, Default)]
pub struct ShareUrlRegistry {
    urls: HashMap<PathBuf, String>,
}

impl ShareUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the download link for `path`. ownCloud share links become
    /// direct downloads with the `&download` suffix.
    pub fn insert(&mut self, path: PathBuf, share_url: &str) {
        self.urls.insert(path, format!("{}&download", share_url));
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.urls.get(path).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_appends_download() {
        let mut registry = ShareUrlRegistry::new();
        registry.insert(PathBuf::from("/tmp/a.txt"), "http://host/s/abc");

        assert_eq!(registry.get(Path::new("/tmp/a.txt")), Some("http://host/s/abc&download"));
        assert_eq!(registry.get(Path::new("/tmp/b.txt")), None);
    }

    #[test]
    fn test_reupload_replaces_url() {
        let mut registry = ShareUrlRegistry::new();
        registry.insert(PathBuf::from("a"), "http://host/s/1");
        registry.insert(PathBuf::from("a"), "http://host/s/2");

        assert_eq!(registry.get(Path::new("a")), Some("http://host/s/2&download"));
    }
}
