//! Filesystem collaborators: the info blob and the image directories.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::HandlerFault;

/// Image category. The wire value is the directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Carousel,
    Article,
}

impl ImageKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "carousel_images" => Some(ImageKind::Carousel),
            "article_images" => Some(ImageKind::Article),
            _ => None,
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            ImageKind::Carousel => "carousel_images",
            ImageKind::Article => "article_images",
        }
    }
}

/// Final path component of a client-supplied name.
///
/// Both separators are honored so Windows-style names are handled too.
/// Returns `None` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<&str> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match last {
        "" | "." | ".." => None,
        other => Some(other),
    }
}

/// Persisted site info blob
#[derive(Debug, Clone)]
pub struct InfoStore {
    path: PathBuf,
}

impl InfoStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when nothing has been saved yet.
    pub async fn load(&self) -> Result<Option<Value>, HandlerFault> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the blob, pretty-printed with four-space indent.
    pub async fn save(&self, value: &Value) -> Result<(), HandlerFault> {
        let mut raw = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut raw, PrettyFormatter::with_indent(b"    "));
        value.serialize(&mut ser)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

/// Image directories under the data root
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_path(&self, kind: ImageKind, name: &str) -> PathBuf {
        self.root.join(kind.dir_name()).join(name)
    }

    /// Returns `None` if the file does not exist. `name` must be sanitized.
    pub async fn read(&self, kind: ImageKind, name: &str) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.file_path(kind, name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write (or replace) a file, creating the directory on demand.
    pub async fn write(&self, kind: ImageKind, name: &str, bytes: &[u8]) -> io::Result<()> {
        tokio::fs::create_dir_all(self.root.join(kind.dir_name())).await?;
        tokio::fs::write(self.file_path(kind, name), bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("photo.png"), Some("photo.png"));
        assert_eq!(sanitize_filename("../../etc/passwd"), Some("passwd"));
        assert_eq!(sanitize_filename("C:\\Users\\me\\cat.jpg"), Some("cat.jpg"));
        assert_eq!(sanitize_filename("dir/"), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename(""), None);
    }

    #[test]
    fn test_image_kind() {
        assert_eq!(ImageKind::parse("carousel_images"), Some(ImageKind::Carousel));
        assert_eq!(ImageKind::parse("article_images").unwrap().dir_name(), "article_images");
        assert_eq!(ImageKind::parse("avatar_images"), None);
    }

    #[tokio::test]
    async fn test_info_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = InfoStore::new(dir.path().join("data").join("home_info.json"));

        assert_eq!(store.load().await.unwrap(), None);

        let blob = json!({"title": "首页", "links": [1, 2]});
        store.save(&blob).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(blob));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n    \"links\""));
        assert!(raw.contains("首页"));
    }

    #[tokio::test]
    async fn test_corrupt_info_is_a_fault() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("home_info.json");
        std::fs::write(&path, "{oops").unwrap();

        let err = InfoStore::new(path).load().await.unwrap_err();
        assert_eq!(err.kind(), "JsonError");
    }

    #[tokio::test]
    async fn test_image_store() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        assert_eq!(store.read(ImageKind::Carousel, "a.png").await.unwrap(), None);
        store
            .write(ImageKind::Carousel, "a.png", &[0x89, 0x50, 0x4e, 0x47])
            .await
            .unwrap();
        assert_eq!(
            store.read(ImageKind::Carousel, "a.png").await.unwrap(),
            Some(vec![0x89, 0x50, 0x4e, 0x47])
        );
        assert!(dir.path().join("carousel_images").join("a.png").exists());
        assert_eq!(store.read(ImageKind::Article, "a.png").await.unwrap(), None);
    }
}
