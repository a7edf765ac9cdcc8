use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use time::UtcDateTime;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::cache::errors::CacheError;
use crate::cache::internal::io_trait::{CacheIo, ProductionCacheIo};
use crate::config::AppConfig;
use crate::data::{Note, Notebook, Session};

#[cfg(test)] mod tests;
pub mod io_trait;

const NOTEBOOKS_FILE: &str = "notebooks.json";
const NOTES_FILE: &str = "notes.json";
const STATE_FILE: &str = "state.json";
const CONTENTS_DIR: &str = "contents";

const PLAIN_CONTENT_EXT: &str = "note";
const SECRET_CONTENT_EXT: &str = "secret";

pub type LocalCache = CacheImpl<ProductionCacheIo>;

/// Durable store for notebooks, note metadata and note content blobs, plus
/// the sync watermark and the persisted session. All tables are rewritten
/// through a shadow file and an atomic rename, so a failed write leaves the
/// previously committed set intact.
pub struct CacheImpl<Io: CacheIo> {
    io: Io,
    basedir: PathBuf,
    init: OnceCell<()>,
}

// scalar keys, kept together in one state file
#[derive(Debug, Default, Deserialize, Serialize)]
struct StateData {
    #[serde(default)]
    last_sync_time: Option<UtcDateTime>,
    #[serde(default)]
    session: Option<Session>,
}

impl LocalCache {
    pub fn new(config: &AppConfig) -> LocalCache {
        CacheImpl::new_internal(&config.data_directory, ProductionCacheIo::new())
    }
}

impl<Io: CacheIo> CacheImpl<Io> {
    fn new_internal(basedir: &Path, io: Io) -> CacheImpl<Io> {
        CacheImpl {
            io,
            basedir: basedir.to_path_buf(),
            init: OnceCell::new(),
        }
    }

    /// Idempotent; concurrent callers all await the same initialization
    /// instead of racing independent ones.
    pub async fn init(&self) -> Result<(), CacheError> {
        self.init
            .get_or_try_init(|| async {
                self.io.create_dir_all(&self.basedir).await?;
                self.io.create_dir_all(self.basedir.join(CONTENTS_DIR)).await?;
                Ok::<_, CacheError>(())
            })
            .await
            .map(|_| ())
    }

    pub async fn notebooks(&self) -> Result<Vec<Notebook>, CacheError> {
        let mut notebooks: Vec<Notebook> =
            self.read_table(NOTEBOOKS_FILE).await?;
        for notebook in &mut notebooks {
            notebook.state = notebook.state.persisted();
        }
        Ok(notebooks)
    }

    pub async fn save_notebooks(
        &self,
        notebooks: &[Notebook],
    ) -> Result<(), CacheError> {
        self.write_table(NOTEBOOKS_FILE, notebooks).await
    }

    pub async fn notes(&self) -> Result<Vec<Note>, CacheError> {
        let mut notes: Vec<Note> = self.read_table(NOTES_FILE).await?;
        for note in &mut notes {
            note.state = note.state.persisted();
        }
        Ok(notes)
    }

    pub async fn save_notes(&self, notes: &[Note]) -> Result<(), CacheError> {
        self.write_table(NOTES_FILE, notes).await
    }

    pub async fn save_note_content(
        &self,
        id: Uuid,
        content: &[u8],
        is_secret: bool,
    ) -> Result<(), CacheError> {
        self.init().await?;
        self.write_swapped(&self.content_path(id, is_secret), content).await?;
        // a protection change must not leave the old variant behind
        self.remove_ignoring_missing(&self.content_path(id, !is_secret)).await
    }

    /// Returns the stored blob and whether it is a protected (still
    /// encrypted) one.
    pub async fn note_content(
        &self,
        id: Uuid,
    ) -> Result<Option<(Vec<u8>, bool)>, CacheError> {
        self.init().await?;
        for is_secret in [true, false] {
            match self.io.read_file(self.content_path(id, is_secret)).await {
                Ok(content) => return Ok(Some((content, is_secret))),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    pub async fn delete_note_content(&self, id: Uuid) -> Result<(), CacheError> {
        self.init().await?;
        self.remove_ignoring_missing(&self.content_path(id, false)).await?;
        self.remove_ignoring_missing(&self.content_path(id, true)).await
    }

    pub async fn last_sync_time(
        &self,
    ) -> Result<Option<UtcDateTime>, CacheError> {
        Ok(self.read_state().await?.last_sync_time)
    }

    pub async fn set_last_sync_time(
        &self,
        timestamp: UtcDateTime,
    ) -> Result<(), CacheError> {
        let mut state = self.read_state().await?;
        state.last_sync_time = Some(timestamp);
        self.write_state(&state).await
    }

    pub async fn load_session(&self) -> Result<Option<Session>, CacheError> {
        Ok(self.read_state().await?.session)
    }

    pub async fn store_session(
        &self,
        session: &Session,
    ) -> Result<(), CacheError> {
        let mut state = self.read_state().await?;
        state.session = Some(session.clone());
        self.write_state(&state).await
    }

    pub async fn clear_session(&self) -> Result<(), CacheError> {
        let mut state = self.read_state().await?;
        state.session = None;
        self.write_state(&state).await
    }

    async fn read_table<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Vec<T>, CacheError> {
        self.init().await?;
        match self.io.read_file(self.basedir.join(name)).await {
            Ok(contents) => serde_json::from_slice(&contents)
                .map_err(CacheError::Parsing),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_table<T: Serialize>(
        &self,
        name: &str,
        values: &[T],
    ) -> Result<(), CacheError> {
        self.init().await?;
        let serialized = serde_json::to_vec(values)
            .map_err(CacheError::Serialization)?;
        self.write_swapped(&self.basedir.join(name), &serialized).await
    }

    async fn read_state(&self) -> Result<StateData, CacheError> {
        self.init().await?;
        match self.io.read_file(self.basedir.join(STATE_FILE)).await {
            Ok(contents) => serde_json::from_slice(&contents)
                .map_err(CacheError::Parsing),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StateData::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_state(&self, state: &StateData) -> Result<(), CacheError> {
        let serialized = serde_json::to_vec(state)
            .map_err(CacheError::Serialization)?;
        self.write_swapped(&self.basedir.join(STATE_FILE), &serialized).await
    }

    // shadow-then-swap: a failure mid-write leaves either the old or the
    // new complete file, never a mix
    async fn write_swapped(
        &self,
        path: &Path,
        data: &[u8],
    ) -> Result<(), CacheError> {
        let parent = path.parent().unwrap_or(&self.basedir);
        let tmp_path = parent.join(self.io.generate_uuid().to_string());
        self.io.write_file(&tmp_path, data).await?;
        if let Err(e) = self.io.rename_file(&tmp_path, path).await {
            if let Err(remove_err) = self.io.remove_file(&tmp_path).await {
                warn!(
                    "failed to remove stale shadow file {}: {remove_err}",
                    tmp_path.display(),
                );
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove_ignoring_missing(
        &self,
        path: &Path,
    ) -> Result<(), CacheError> {
        match self.io.remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn content_path(&self, id: Uuid, is_secret: bool) -> PathBuf {
        let extension = if is_secret {
            SECRET_CONTENT_EXT
        } else {
            PLAIN_CONTENT_EXT
        };
        self.basedir.join(CONTENTS_DIR).join(format!("{id}.{extension}"))
    }
}
