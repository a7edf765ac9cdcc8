use std::path::Path;
use async_trait::async_trait;
use tokio::{fs, io};
use uuid::Uuid;
use crate::rng::make_uuid;

#[async_trait]
pub trait CacheIo: Send + Sync {
    async fn read_file(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> io::Result<Vec<u8>>;

    async fn write_file(
        &self,
        path: impl AsRef<Path> + Send,
        data: impl AsRef<[u8]> + Send,
    ) -> io::Result<()>;

    async fn rename_file(
        &self,
        from: impl AsRef<Path> + Send,
        to: impl AsRef<Path> + Send,
    ) -> io::Result<()>;

    async fn remove_file(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> io::Result<()>;

    async fn create_dir_all(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> io::Result<()>;

    fn generate_uuid(&self) -> Uuid;
}

pub struct ProductionCacheIo;

impl ProductionCacheIo {
    pub fn new() -> Self {
        ProductionCacheIo
    }
}

#[async_trait]
impl CacheIo for ProductionCacheIo {
    async fn read_file(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> io::Result<Vec<u8>> {
        fs::read(path).await
    }

    async fn write_file(
        &self,
        path: impl AsRef<Path> + Send,
        data: impl AsRef<[u8]> + Send,
    ) -> io::Result<()> {
        fs::write(path, data).await
    }

    async fn rename_file(
        &self,
        from: impl AsRef<Path> + Send,
        to: impl AsRef<Path> + Send,
    ) -> io::Result<()> {
        fs::rename(from, to).await
    }

    async fn remove_file(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> io::Result<()> {
        fs::remove_file(path).await
    }

    async fn create_dir_all(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> io::Result<()> {
        fs::create_dir_all(path).await
    }

    fn generate_uuid(&self) -> Uuid {
        make_uuid(&mut rand::rng())
    }
}
