use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

/// Filesystem access for tenant folders and stored objects. Paths are
/// relative to the uploads root; callers never touch absolute paths.
#[async_trait]
pub trait FileStore: Send + Sync + 'static {
    /// Writes `bytes` and returns the size actually written to disk.
    async fn put(&self, path: &str, bytes: &[u8]) -> io::Result<u64>;

    async fn get(&self, path: &str) -> io::Result<Vec<u8>>;

    async fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    async fn remove(&self, path: &str) -> io::Result<()>;

    async fn exists(&self, path: &str) -> bool;

    async fn create_dir(&self, path: &str) -> io::Result<()>;

    async fn remove_dir(&self, path: &str) -> io::Result<()>;
}

pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(Path::new(path))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> io::Result<u64> {
        let target = self.resolve(path);
        fs::write(&target, bytes).await?;
        let metadata = fs::metadata(&target).await?;
        Ok(metadata.len())
    }

    async fn get(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path)).await
    }

    async fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(self.resolve(from), self.resolve(to)).await
    }

    async fn remove(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.resolve(path)).await
    }

    async fn exists(&self, path: &str) -> bool {
        fs::try_exists(self.resolve(path)).await.unwrap_or(false)
    }

    async fn create_dir(&self, path: &str) -> io::Result<()> {
        fs::create_dir_all(self.resolve(path)).await
    }

    async fn remove_dir(&self, path: &str) -> io::Result<()> {
        fs::remove_dir_all(self.resolve(path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::{FileStore, LocalFileStore};

    #[tokio::test]
    async fn put_get_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalFileStore::new(dir.path());

        store.create_dir("acme").await.expect("create dir");
        let written = store.put("acme/hello.txt", b"hello").await.expect("put");
        assert_eq!(written, 5);
        assert!(store.exists("acme/hello.txt").await);

        let bytes = store.get("acme/hello.txt").await.expect("get");
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn rename_moves_the_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalFileStore::new(dir.path());

        store.create_dir("acme").await.expect("create dir");
        store.put("acme/a.txt", b"data").await.expect("put");
        store.rename("acme/a.txt", "acme/b.txt").await.expect("rename");

        assert!(!store.exists("acme/a.txt").await);
        assert_eq!(store.get("acme/b.txt").await.expect("get"), b"data");
    }

    #[tokio::test]
    async fn remove_dir_deletes_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalFileStore::new(dir.path());

        store.create_dir("acme").await.expect("create dir");
        store.put("acme/a.txt", b"data").await.expect("put");
        store.remove_dir("acme").await.expect("remove dir");

        assert!(!store.exists("acme/a.txt").await);
        assert!(!store.exists("acme").await);
    }

    #[tokio::test]
    async fn create_dir_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalFileStore::new(dir.path());

        store.create_dir("acme").await.expect("first create");
        store.create_dir("acme").await.expect("second create");
    }
}
