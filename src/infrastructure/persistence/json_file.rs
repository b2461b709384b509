//! 基于本地文件的 KV 存储
//!
//! 每个 key 对应存储目录下的一个 JSON 文件（浏览器 localStorage 的等价物）。
//! 读取失败/文件缺失返回 None；损坏内容由调用方按空集合处理。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::domain::repository::KeyValueStore;

/// 文件 KV 存储
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create storage dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // key 中的路径分隔符替换掉，避免逃出存储目录
        let sanitized: String = key
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(format!("{sanitized}.json"))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "storage read failed");
                Err(err.into())
            }
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        fs::write(&path, value)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        assert!(store.get("absent").await.unwrap().is_none());

        store.put("test_drive.requests", "[]").await.unwrap();
        assert_eq!(
            store.get("test_drive.requests").await.unwrap().as_deref(),
            Some("[]")
        );

        store.delete("test_drive.requests").await.unwrap();
        assert!(store.get("test_drive.requests").await.unwrap().is_none());
        // 删除不存在的 key 是空操作
        store.delete("test_drive.requests").await.unwrap();
    }

    #[tokio::test]
    async fn test_key_with_separator_stays_inside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store.put("a/b", "1").await.unwrap();
        assert!(dir.path().join("a_b.json").exists());
    }
}
