//! File-write collaborator used by PDF exports

use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait FileWriter: Send + Sync {
    async fn write(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()>;
}

/// Writes to the local filesystem, replacing any existing file
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileWriter;

#[async_trait]
impl FileWriter for FsFileWriter {
    async fn write(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(path, bytes).await
    }
}
