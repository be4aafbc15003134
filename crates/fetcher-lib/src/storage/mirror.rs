//! Local debugging copy of written datasets

use std::path::{Path, PathBuf};

/// Writes dataset bodies to `<dir>/<name>.csv`
///
/// The mirror is a debugging aid. Callers treat its failures as warnings;
/// the durable copy lives in object storage.
#[derive(Debug, Clone)]
pub struct LocalMirror {
    dir: PathBuf,
}

impl LocalMirror {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the dataset `name` is mirrored to
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", name))
    }

    /// Write `body` for dataset `name`, creating the directory if needed
    pub async fn write(&self, name: &str, body: &[u8]) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(name);
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mirror = LocalMirror::new(temp_dir.path().join("Output"));

        let path = mirror.write("Deployment", b"Deployment\nweb\n").await.unwrap();

        assert_eq!(path, temp_dir.path().join("Output").join("Deployment.csv"));
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "Deployment\nweb\n"
        );
    }

    #[tokio::test]
    async fn test_write_overwrites_previous_copy() {
        let temp_dir = TempDir::new().unwrap();
        let mirror = LocalMirror::new(temp_dir.path());

        mirror.write("Rollout", b"old").await.unwrap();
        let path = mirror.write("Rollout", b"new").await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_write_fails_when_dir_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("Output");
        tokio::fs::write(&blocker, b"").await.unwrap();

        let mirror = LocalMirror::new(&blocker);
        assert!(mirror.write("Controller", b"x").await.is_err());
    }
}
