use std::collections::{HashMap, HashSet};
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::io;
use uuid::Uuid;

use crate::cache::internal::io_trait::CacheIo;
use crate::rng::make_uuid;

// full-tree in-memory filesystem with failure injection
pub struct TestCacheIo {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<HashSet<PathBuf>>,
    events: Mutex<Vec<CacheWrite>>,
    write_error: Mutex<Option<ErrorKind>>,
    rng: Mutex<StdRng>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CacheWrite {
    Write { path: PathBuf },
    Rename { from: PathBuf, to: PathBuf },
    Remove { path: PathBuf },
    CreateDir { path: PathBuf },
}

impl TestCacheIo {
    pub fn new() -> Self {
        TestCacheIo {
            files: Mutex::new(HashMap::new()),
            dirs: Mutex::new(HashSet::new()),
            events: Mutex::new(Vec::new()),
            write_error: Mutex::new(None),
            rng: Mutex::new(StdRng::seed_from_u64(7)),
        }
    }

    pub fn set_write_error(&self, kind: Option<ErrorKind>) {
        *self.write_error.lock().unwrap() = kind;
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    pub fn events(&self) -> Vec<CacheWrite> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: CacheWrite) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl CacheIo for TestCacheIo {
    async fn read_file(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> io::Result<Vec<u8>> {
        self.files.lock().unwrap()
            .get(path.as_ref())
            .cloned()
            .ok_or_else(|| Error::from(ErrorKind::NotFound))
    }

    async fn write_file(
        &self,
        path: impl AsRef<Path> + Send,
        data: impl AsRef<[u8]> + Send,
    ) -> io::Result<()> {
        self.record(CacheWrite::Write { path: path.as_ref().to_owned() });
        if let Some(kind) = *self.write_error.lock().unwrap() {
            return Err(Error::from(kind));
        }
        self.files.lock().unwrap()
            .insert(path.as_ref().to_owned(), data.as_ref().to_vec());
        Ok(())
    }

    async fn rename_file(
        &self,
        from: impl AsRef<Path> + Send,
        to: impl AsRef<Path> + Send,
    ) -> io::Result<()> {
        self.record(CacheWrite::Rename {
            from: from.as_ref().to_owned(),
            to: to.as_ref().to_owned(),
        });
        let mut files = self.files.lock().unwrap();
        let contents = files.remove(from.as_ref())
            .ok_or_else(|| Error::from(ErrorKind::NotFound))?;
        files.insert(to.as_ref().to_owned(), contents);
        Ok(())
    }

    async fn remove_file(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> io::Result<()> {
        self.record(CacheWrite::Remove { path: path.as_ref().to_owned() });
        self.files.lock().unwrap()
            .remove(path.as_ref())
            .map(|_| ())
            .ok_or_else(|| Error::from(ErrorKind::NotFound))
    }

    async fn create_dir_all(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> io::Result<()> {
        self.record(CacheWrite::CreateDir { path: path.as_ref().to_owned() });
        self.dirs.lock().unwrap().insert(path.as_ref().to_owned());
        Ok(())
    }

    fn generate_uuid(&self) -> Uuid {
        make_uuid(&mut *self.rng.lock().unwrap())
    }
}
