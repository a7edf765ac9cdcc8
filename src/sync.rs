mod errors;
mod events;
mod wire;

pub use errors::SyncError;
pub use events::SyncEvent;
pub use wire::{NoteEnvelope, WireNote, WireNotebook};

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use rand::rngs::StdRng;
use time::UtcDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, mpsc};
use uuid::Uuid;

use crate::cache::{CacheError, CacheImpl, CacheIo, ProductionCacheIo};
use crate::config::AppConfig;
use crate::crypto::{self, CryptoEngine, CryptoError, EncryptedBlob};
use crate::data::{
    Note,
    Notebook,
    NotebookRef,
    NoteSortKey,
    Session,
    SortDirection,
    SyncState,
};
use crate::remote::{FileMetadata, NOTE_MIME_TYPE, RemoteError, RemoteStore};
use crate::rng::{SyncRng, make_uuid};
use crate::session::{SessionError, SessionManagerImpl};
use crate::util::StrExt;

const NOTEBOOK_INDEX_FILE: &str = "notebooks.index";
const NOTE_FILE_SUFFIX: &str = ".note";
const UNTITLED: &str = "Untitled";
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub type SyncCoordinator = SyncCoordinatorImpl<ProductionCacheIo>;

/// Everything the coordinator needs injected: the durable cache, the
/// remote adapter, the session manager it shares with the host, and the
/// crypto engine.
pub struct SyncContext<Io: CacheIo> {
    pub cache: Arc<CacheImpl<Io>>,
    pub remote: Arc<dyn RemoteStore>,
    pub session: Arc<SessionManagerImpl<Io>>,
    pub crypto: CryptoEngine,
    pub rng: SyncRng<StdRng>,
}

/// Single entry point for all note and notebook operations. Every write
/// lands in the cache first and is pushed remotely when a usable session
/// exists; a failed push leaves the entity Dirty for the next pass. All
/// retrying lives here, never in the remote adapter, and a logout observed
/// through the session epoch abandons in-flight results before they touch
/// the cache.
pub struct SyncCoordinatorImpl<Io: CacheIo> {
    cache: Arc<CacheImpl<Io>>,
    remote: Arc<dyn RemoteStore>,
    session: Arc<SessionManagerImpl<Io>>,
    crypto: CryptoEngine,
    rng: SyncRng<StdRng>,
    app_folder_name: String,
    retry_attempts: u32,
    retry_base_delay: Duration,
    encryption_password: RwLock<Option<String>>,
    app_folder_id: RwLock<Option<String>>,
    index_file_id: RwLock<Option<String>>,
    entity_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    quarantined: std::sync::Mutex<HashSet<Uuid>>,
    events: mpsc::Sender<SyncEvent>,
}

impl<Io: CacheIo> SyncCoordinatorImpl<Io> {
    pub fn new(
        config: &AppConfig,
        context: SyncContext<Io>,
    ) -> (SyncCoordinatorImpl<Io>, mpsc::Receiver<SyncEvent>) {
        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let coordinator = SyncCoordinatorImpl {
            cache: context.cache,
            remote: context.remote,
            session: context.session,
            crypto: context.crypto,
            rng: context.rng,
            app_folder_name: config.app_folder_name.clone(),
            retry_attempts: config.retry_attempts.max(1),
            retry_base_delay: config.retry_base_delay(),
            encryption_password: RwLock::new(None),
            app_folder_id: RwLock::new(None),
            index_file_id: RwLock::new(None),
            entity_locks: Mutex::new(HashMap::new()),
            quarantined: std::sync::Mutex::new(HashSet::new()),
            events,
        };
        (coordinator, receiver)
    }

    pub async fn login(&self, session: Session) -> Result<(), SyncError> {
        self.session.login(session).await?;
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), SyncError> {
        self.session.logout().await?;
        *self.app_folder_id.write().await = None;
        *self.index_file_id.write().await = None;
        *self.encryption_password.write().await = None;
        self.quarantined.lock().unwrap().clear();
        Ok(())
    }

    /// The account-level password used for everything except notes with
    /// their own password. Required before any remote traffic.
    pub async fn set_encryption_password(&self, password: &str) {
        *self.encryption_password.write().await = Some(password.to_owned());
    }

    pub async fn notebooks(&self) -> Result<Vec<Notebook>, SyncError> {
        let mut notebooks = self.cache.notebooks().await?;
        notebooks.retain(|notebook| !notebook.deleted);
        Ok(notebooks)
    }

    pub async fn notes(&self) -> Result<Vec<Note>, SyncError> {
        Ok(self.cache.notes().await?)
    }

    pub async fn note(&self, id: Uuid) -> Result<Note, SyncError> {
        self.cache
            .notes()
            .await?
            .into_iter()
            .find(|note| note.id == id)
            .ok_or(SyncError::NoteNotFound(id))
    }

    pub async fn last_sync_time(
        &self,
    ) -> Result<Option<UtcDateTime>, SyncError> {
        Ok(self.cache.last_sync_time().await?)
    }

    pub async fn create_notebook(
        &self,
        name: &str,
    ) -> Result<Notebook, SyncError> {
        let notebook = Notebook {
            id: make_uuid(&mut *self.rng.get_rng()),
            name: name.to_owned(),
            parent_folder_id: self
                .app_folder_id
                .read()
                .await
                .clone()
                .unwrap_or_default(),
            created_at: UtcDateTime::now(),
            state: SyncState::Dirty,
            deleted: false,
        };
        let mut notebooks = self.cache.notebooks().await?;
        notebooks.push(notebook.clone());
        self.surfaced(self.cache.save_notebooks(&notebooks).await)?;
        self.push_pending_best_effort().await;
        self.find_notebook(notebook.id).await
    }

    pub async fn rename_notebook(
        &self,
        id: Uuid,
        name: &str,
    ) -> Result<Notebook, SyncError> {
        let mut notebooks = self.cache.notebooks().await?;
        let notebook = notebooks
            .iter_mut()
            .find(|notebook| notebook.id == id && !notebook.deleted)
            .ok_or(SyncError::NotebookNotFound(id))?;
        notebook.name = name.to_owned();
        notebook.state = SyncState::Dirty;
        self.surfaced(self.cache.save_notebooks(&notebooks).await)?;
        self.push_pending_best_effort().await;
        self.find_notebook(id).await
    }

    /// Removes the notebook; its notes survive and move to the unfiled
    /// bucket. A persisted tombstone marks the pending index push, so a
    /// restart cannot resurrect the notebook from the remote index.
    pub async fn delete_notebook(&self, id: Uuid) -> Result<(), SyncError> {
        let mut notebooks = self.cache.notebooks().await?;
        let notebook = notebooks
            .iter_mut()
            .find(|notebook| notebook.id == id && !notebook.deleted)
            .ok_or(SyncError::NotebookNotFound(id))?;
        notebook.deleted = true;
        notebook.state = SyncState::Dirty;
        self.surfaced(self.cache.save_notebooks(&notebooks).await)?;

        let now = UtcDateTime::now();
        let mut notes = self.cache.notes().await?;
        let mut moved = false;
        for note in &mut notes {
            if note.notebook_id == NotebookRef::Notebook(id) {
                note.notebook_id = NotebookRef::Unfiled;
                note.modified_at = now;
                note.state = SyncState::Dirty;
                moved = true;
            }
        }
        if moved {
            self.surfaced(self.cache.save_notes(&notes).await)?;
        }
        self.push_pending_best_effort().await;
        Ok(())
    }

    /// A note with its own password is stored encrypted even locally;
    /// everything else is stored plain locally and encrypted with the
    /// account password on push. Without an explicit title, the first
    /// non-blank content line is used.
    pub async fn create_note(
        &self,
        title: Option<&str>,
        content: &str,
        notebook_id: NotebookRef,
        password: Option<&str>,
    ) -> Result<Note, SyncError> {
        self.check_notebook_exists(notebook_id).await?;
        let now = UtcDateTime::now();
        let note = Note {
            id: make_uuid(&mut *self.rng.get_rng()),
            title: title
                .and_then(|title| title.nonblank_to_some())
                .unwrap_or_else(|| note_title(content)),
            notebook_id,
            is_password_protected: password.is_some(),
            created_at: now,
            modified_at: now,
            checksum: crypto::checksum(content.as_bytes()),
            state: SyncState::Dirty,
            remote_file_id: None,
        };
        self.store_content(note.id, content, password).await?;
        let mut notes = self.cache.notes().await?;
        notes.push(note.clone());
        self.surfaced(self.cache.save_notes(&notes).await)?;
        self.push_pending_best_effort().await;
        self.note(note.id).await
    }

    /// Replaces the content; the title follows the first non-blank line.
    /// The note ends up protected iff `password` is given, so this is also
    /// how protection is added or removed.
    pub async fn update_note(
        &self,
        id: Uuid,
        content: &str,
        password: Option<&str>,
    ) -> Result<Note, SyncError> {
        let guard = self.entity_lock(id).await;
        self.note(id).await?;
        // a fresh plaintext supersedes whatever was unusable before
        self.unquarantine(id);
        self.store_content(id, content, password).await?;
        let now = UtcDateTime::now();
        self.modify_note(id, |note| {
            note.title = note_title(content);
            note.checksum = crypto::checksum(content.as_bytes());
            note.is_password_protected = password.is_some();
            note.modified_at = now;
            note.state = SyncState::Dirty;
        })
        .await?;
        drop(guard);
        self.push_pending_best_effort().await;
        self.note(id).await
    }

    pub async fn move_note(
        &self,
        id: Uuid,
        notebook_id: NotebookRef,
    ) -> Result<Note, SyncError> {
        self.check_notebook_exists(notebook_id).await?;
        let guard = self.entity_lock(id).await;
        let now = UtcDateTime::now();
        self.modify_note(id, |note| {
            note.notebook_id = notebook_id;
            note.modified_at = now;
            note.state = SyncState::Dirty;
        })
        .await?;
        drop(guard);
        self.push_pending_best_effort().await;
        self.note(id).await
    }

    /// The local copy is removed only once the remote copy is confirmed
    /// gone, so an interrupted delete never resurrects the note from the
    /// remote on the next sync.
    pub async fn delete_note(&self, id: Uuid) -> Result<(), SyncError> {
        let guard = self.entity_lock(id).await;
        let note = self.note(id).await?;
        let epoch = self.session.epoch();
        if let Some(file_id) = &note.remote_file_id {
            let token = self.session.token().await?;
            match self
                .with_retries(|| self.remote.delete_file(&token, file_id))
                .await
            {
                Ok(()) | Err(RemoteError::NotFound) => {}
                Err(e) => {
                    self.emit(SyncEvent::DegradedMode {
                        reason: e.to_string(),
                    });
                    return Err(e.into());
                }
            }
        }
        self.check_epoch(epoch)?;
        self.remove_note_locally(id).await?;
        drop(guard);
        self.entity_locks.lock().await.remove(&id);
        Ok(())
    }

    /// Decrypts on demand; protected notes require their own password,
    /// plain ones none at all.
    pub async fn note_content(
        &self,
        id: Uuid,
        password: Option<&str>,
    ) -> Result<String, SyncError> {
        self.note(id).await?;
        let Some((content, is_secret)) = self.cache.note_content(id).await?
        else {
            return Err(SyncError::NoteNotFound(id));
        };
        if is_secret {
            let Some(password) = password else {
                return Err(SyncError::PasswordRequired);
            };
            let blob: EncryptedBlob = serde_json::from_slice(&content)
                .map_err(|_| CryptoError::CorruptData)?;
            Ok(self.crypto.decrypt(&blob, password)?)
        } else {
            String::from_utf8(content)
                .map_err(|_| CryptoError::CorruptData.into())
        }
    }

    /// Case-insensitive match over titles and, for unprotected notes only,
    /// bodies. Protected bodies stay sealed.
    pub async fn search(&self, query: &str) -> Result<Vec<Note>, SyncError> {
        let needle = query.to_lowercase();
        let mut matches = Vec::new();
        for note in self.cache.notes().await? {
            if note.title.to_lowercase().contains(&needle) {
                matches.push(note);
                continue;
            }
            if note.is_password_protected {
                continue;
            }
            if let Some((content, false)) =
                self.cache.note_content(note.id).await?
            {
                let body = String::from_utf8_lossy(&content).to_lowercase();
                if body.contains(&needle) {
                    matches.push(note);
                }
            }
        }
        Ok(matches)
    }

    pub async fn sort_notes(
        &self,
        key: NoteSortKey,
        direction: SortDirection,
    ) -> Result<Vec<Note>, SyncError> {
        let mut notes = self.cache.notes().await?;
        notes.sort_by(|a, b| {
            let ordering = match key {
                NoteSortKey::Title =>
                    a.title.to_lowercase().cmp(&b.title.to_lowercase()),
                NoteSortKey::CreatedAt => a.created_at.cmp(&b.created_at),
                NoteSortKey::ModifiedAt => a.modified_at.cmp(&b.modified_at),
            };
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
        Ok(notes)
    }

    /// Re-adopts an orphaned note: the dead remote reference is dropped
    /// and the next push creates a fresh remote file.
    pub async fn restore_orphan(&self, id: Uuid) -> Result<Note, SyncError> {
        let guard = self.entity_lock(id).await;
        let note = self.note(id).await?;
        if note.state != SyncState::Orphaned {
            return Err(SyncError::NotOrphaned(id));
        }
        self.modify_note(id, |note| {
            note.remote_file_id = None;
            note.state = SyncState::Dirty;
        })
        .await?;
        drop(guard);
        self.push_pending_best_effort().await;
        self.note(id).await
    }

    pub async fn discard_orphan(&self, id: Uuid) -> Result<(), SyncError> {
        let guard = self.entity_lock(id).await;
        let note = self.note(id).await?;
        if note.state != SyncState::Orphaned {
            return Err(SyncError::NotOrphaned(id));
        }
        self.remove_note_locally(id).await?;
        drop(guard);
        self.entity_locks.lock().await.remove(&id);
        Ok(())
    }

    /// Pulls the complete remote snapshot, merges it last-write-wins into
    /// the cache, then pushes whatever is still Dirty. Any remote failure
    /// during the pull aborts the whole pass with the cache and the sync
    /// watermark untouched.
    pub async fn full_sync(&self) -> Result<(), SyncError> {
        if let Err(e) = self.pull_and_merge().await {
            self.report_sync_failure(&e);
            return Err(e);
        }
        self.push_pending_best_effort().await;
        self.emit(SyncEvent::SyncCompleted);
        Ok(())
    }

    async fn pull_and_merge(&self) -> Result<(), SyncError> {
        let token = self.session.token().await?;
        let epoch = self.session.epoch();
        let password = self.encryption_password().await?;
        let folder_id = self.ensure_app_folder(&token).await?;
        let listing = self
            .with_retries(|| self.remote.list_files(&token, &folder_id))
            .await?;

        // download everything before the first cache write, so an abort
        // mid-pull cannot leave a half-merged snapshot behind
        let mut remote_notebooks = None;
        let index =
            listing.iter().find(|file| file.name == NOTEBOOK_INDEX_FILE);
        if index.is_none() {
            // the index was deleted remotely; a cached file id is stale
            *self.index_file_id.write().await = None;
        }
        if let Some(index) = index {
            *self.index_file_id.write().await = Some(index.id.clone());
            let text = self
                .with_retries(|| self.remote.file_content(&token, &index.id))
                .await?;
            match parse_blob(&text).and_then(|blob| {
                self.crypto.decrypt::<Vec<WireNotebook>>(&blob, &password)
            }) {
                Ok(wire) => remote_notebooks = Some(wire),
                Err(CryptoError::WrongPassword) =>
                    return Err(CryptoError::WrongPassword.into()),
                Err(e) => {
                    warn!("notebook index unusable: {e}");
                    self.emit(SyncEvent::DegradedMode {
                        reason: "notebook index is corrupt".into(),
                    });
                }
            }
        }

        let mut envelopes: HashMap<Uuid, (String, NoteEnvelope)> =
            HashMap::new();
        let mut vanished = HashSet::new();
        for file in &listing {
            let Some(id) = note_file_id(&file.name) else {
                continue;
            };
            if self.is_quarantined(id) {
                continue;
            }
            match self
                .with_retries(|| self.remote.file_content(&token, &file.id))
                .await
            {
                Ok(text) => match serde_json::from_str::<NoteEnvelope>(&text) {
                    Ok(envelope) if envelope.note.id == id => {
                        envelopes.insert(id, (file.id.clone(), envelope));
                    }
                    _ => {
                        warn!("note file {} does not parse", file.name);
                        self.quarantine(id);
                        self.emit(SyncEvent::CorruptEntity { id });
                    }
                },
                // listed but gone by the time we fetch it
                Err(RemoteError::NotFound) => {
                    vanished.insert(id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.check_epoch(epoch)?;

        let removed_notebooks =
            self.merge_notebooks(remote_notebooks).await?;

        let mut notes = self.cache.notes().await?;
        let present: HashSet<Uuid> = envelopes.keys().copied().collect();
        let mut content_writes = Vec::new();
        let mut orphaned = Vec::new();
        for (id, (file_id, envelope)) in envelopes {
            match notes.iter_mut().find(|note| note.id == id) {
                Some(local) => {
                    // strictly newer remote wins; a tie keeps the local copy
                    if envelope.note.modified_at > local.modified_at {
                        if let Some((content, is_secret)) =
                            self.incoming_content(&envelope, &password)?
                        {
                            *local = envelope
                                .note
                                .into_note(SyncState::Clean, Some(file_id));
                            content_writes.push((id, content, is_secret));
                        }
                    } else if local.remote_file_id.is_none() {
                        // our own push from another pass; adopt the file id
                        local.remote_file_id = Some(file_id);
                    }
                }
                None => {
                    if let Some((content, is_secret)) =
                        self.incoming_content(&envelope, &password)?
                    {
                        notes.push(
                            envelope
                                .note
                                .into_note(SyncState::Clean, Some(file_id)),
                        );
                        content_writes.push((id, content, is_secret));
                    }
                }
            }
        }
        let now = UtcDateTime::now();
        for note in &mut notes {
            if let NotebookRef::Notebook(notebook_id) = note.notebook_id {
                if removed_notebooks.contains(&notebook_id) {
                    note.notebook_id = NotebookRef::Unfiled;
                    note.modified_at = now;
                    note.state = SyncState::Dirty;
                }
            }
            // a quarantined note never makes it into the download set, but
            // its remote file is still there; only a confirmed-missing file
            // orphans
            if note.state == SyncState::Clean
                && note.remote_file_id.is_some()
                && !self.is_quarantined(note.id)
                && (!present.contains(&note.id) || vanished.contains(&note.id))
            {
                note.state = SyncState::Orphaned;
                orphaned.push(note.id);
            }
        }

        for (id, content, is_secret) in content_writes {
            self.surfaced(
                self.cache.save_note_content(id, &content, is_secret).await,
            )?;
        }
        self.surfaced(self.cache.save_notes(&notes).await)?;
        for id in orphaned {
            self.emit(SyncEvent::EntityOrphaned { id });
        }
        self.cache.set_last_sync_time(now).await?;
        Ok(())
    }

    /// Union by id; a Dirty local notebook outranks the remote row until
    /// it is pushed. With a remote index in hand, Clean local notebooks
    /// missing from it were deleted elsewhere; returns their ids so their
    /// notes can be unfiled.
    async fn merge_notebooks(
        &self,
        remote: Option<Vec<WireNotebook>>,
    ) -> Result<HashSet<Uuid>, SyncError> {
        let Some(remote) = remote else {
            return Ok(HashSet::new());
        };
        let remote_ids: HashSet<Uuid> =
            remote.iter().map(|notebook| notebook.id).collect();
        let mut notebooks = self.cache.notebooks().await?;
        for wire in remote {
            match notebooks.iter_mut().find(|local| local.id == wire.id) {
                Some(local) if local.state == SyncState::Clean =>
                    *local = wire.into_notebook(SyncState::Clean),
                Some(_) => {}
                None => notebooks.push(wire.into_notebook(SyncState::Clean)),
            }
        }
        let removed: HashSet<Uuid> = notebooks
            .iter()
            .filter(|notebook| {
                notebook.state == SyncState::Clean
                    && !remote_ids.contains(&notebook.id)
            })
            .map(|notebook| notebook.id)
            .collect();
        notebooks.retain(|notebook| !removed.contains(&notebook.id));
        // a tombstone whose id is already gone from the index is complete
        notebooks.retain(|notebook| {
            !notebook.deleted || remote_ids.contains(&notebook.id)
        });
        self.surfaced(self.cache.save_notebooks(&notebooks).await)?;
        Ok(removed)
    }

    /// Prepares the locally stored form of a pulled note body: protected
    /// bodies stay encrypted as received, plain ones are decrypted with
    /// the account password. A corrupt body quarantines the note and keeps
    /// whatever is local.
    fn incoming_content(
        &self,
        envelope: &NoteEnvelope,
        password: &str,
    ) -> Result<Option<(Vec<u8>, bool)>, SyncError> {
        if envelope.note.is_password_protected {
            let serialized = serde_json::to_vec(&envelope.body)
                .map_err(CryptoError::Serialization)?;
            return Ok(Some((serialized, true)));
        }
        match self.crypto.decrypt::<String>(&envelope.body, password) {
            Ok(text)
                if crypto::checksum(text.as_bytes())
                    == envelope.note.checksum =>
                Ok(Some((text.into_bytes(), false))),
            Ok(_) | Err(CryptoError::CorruptData) => {
                self.quarantine(envelope.note.id);
                self.emit(SyncEvent::CorruptEntity { id: envelope.note.id });
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Pushes the notebook index if anything changed it and every Dirty
    /// note, one remote write per note, serialized per id.
    async fn push_pending(&self) -> Result<(), SyncError> {
        let token = self.session.token().await?;
        let epoch = self.session.epoch();
        let folder_id = self.ensure_app_folder(&token).await?;

        let notebooks = self.cache.notebooks().await?;
        // an unknown index file id with notebooks on hand means the remote
        // index is missing or never seen; pushing restores it either way
        let index_stale = notebooks
            .iter()
            .any(|notebook| notebook.state.needs_push())
            || (!notebooks.is_empty()
                && self.index_file_id.read().await.is_none());
        if index_stale {
            self.push_notebook_index(&token, epoch, &folder_id, notebooks)
                .await?;
        }

        for note in self.cache.notes().await? {
            if !note.state.needs_push() || self.is_quarantined(note.id) {
                continue;
            }
            self.push_note(&token, epoch, &folder_id, note.id).await?;
        }
        Ok(())
    }

    async fn push_pending_best_effort(&self) {
        if let Err(e) = self.push_pending().await {
            self.report_sync_failure(&e);
        }
    }

    /// Notebooks travel as one encrypted index file holding the full set.
    async fn push_notebook_index(
        &self,
        token: &str,
        epoch: u64,
        folder_id: &str,
        notebooks: Vec<Notebook>,
    ) -> Result<(), SyncError> {
        let password = self.encryption_password().await?;
        let wire: Vec<WireNotebook> = notebooks
            .iter()
            .filter(|notebook| !notebook.deleted)
            .map(WireNotebook::from)
            .collect();
        let blob = self.crypto.encrypt(&wire, &password)?;
        let body = serde_json::to_string(&blob)
            .map_err(CryptoError::Serialization)?;
        self.write_index(token, folder_id, &body).await?;

        self.check_epoch(epoch)?;
        let pushed: HashSet<Uuid> =
            notebooks.iter().map(|notebook| notebook.id).collect();
        let mut current = self.cache.notebooks().await?;
        for notebook in &mut current {
            if pushed.contains(&notebook.id)
                && !notebook.deleted
                && notebook.state == SyncState::Dirty
            {
                notebook.state = SyncState::Clean;
            }
        }
        // tombstones whose absence just reached the index are complete
        current.retain(|notebook| {
            !(notebook.deleted && pushed.contains(&notebook.id))
        });
        self.surfaced(self.cache.save_notebooks(&current).await)?;
        Ok(())
    }

    /// Updates the index in place, recreating it when the remote copy was
    /// deleted out from under the cached file id.
    async fn write_index(
        &self,
        token: &str,
        folder_id: &str,
        body: &str,
    ) -> Result<(), SyncError> {
        if let Some(id) = self.ensure_index_file_id(token, folder_id).await? {
            match self
                .with_retries(|| self.remote.update_file(token, &id, body))
                .await
            {
                Ok(()) => return Ok(()),
                Err(RemoteError::NotFound) => {
                    warn!("notebook index file {id} is gone, recreating");
                    *self.index_file_id.write().await = None;
                }
                Err(e) => return Err(e.into()),
            }
        }
        let metadata = FileMetadata {
            name: NOTEBOOK_INDEX_FILE.to_owned(),
            parents: vec![folder_id.to_owned()],
            mime_type: NOTE_MIME_TYPE.to_owned(),
        };
        let file = self
            .with_retries(|| self.remote.create_file(token, &metadata, body))
            .await?;
        *self.index_file_id.write().await = Some(file.id);
        Ok(())
    }

    async fn push_note(
        &self,
        token: &str,
        epoch: u64,
        folder_id: &str,
        id: Uuid,
    ) -> Result<(), SyncError> {
        let _guard = self.entity_lock(id).await;
        let current = match self.note(id).await {
            Ok(note) => note,
            // deleted while we were waiting for the lock
            Err(SyncError::NoteNotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        if !current.state.needs_push() {
            return Ok(());
        }
        let note = self
            .modify_note(id, |note| note.state = SyncState::Syncing)
            .await?;

        let result = self.push_note_file(token, folder_id, &note).await;
        self.check_epoch(epoch)?;
        match result {
            Ok(file_id) => {
                self.modify_note(id, |note| {
                    note.state = SyncState::Clean;
                    note.remote_file_id = Some(file_id.clone());
                })
                .await?;
                Ok(())
            }
            Err(SyncError::Remote(RemoteError::NotFound)) => {
                self.modify_note(id, |note| {
                    note.state = SyncState::Orphaned;
                })
                .await?;
                self.emit(SyncEvent::EntityOrphaned { id });
                Ok(())
            }
            Err(SyncError::Crypto(CryptoError::CorruptData)) => {
                // the Syncing marker reads back as Dirty, but the
                // quarantine keeps the entity out of later pushes
                self.quarantine(id);
                self.emit(SyncEvent::CorruptEntity { id });
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn push_note_file(
        &self,
        token: &str,
        folder_id: &str,
        note: &Note,
    ) -> Result<String, SyncError> {
        let Some((content, is_secret)) =
            self.cache.note_content(note.id).await?
        else {
            return Err(SyncError::NoteNotFound(note.id));
        };
        let body_blob = if is_secret {
            // already encrypted with the note's own password
            serde_json::from_slice::<EncryptedBlob>(&content)
                .map_err(|_| CryptoError::CorruptData)?
        } else {
            let password = self.encryption_password().await?;
            let text = String::from_utf8(content)
                .map_err(|_| CryptoError::CorruptData)?;
            self.crypto.encrypt(&text, &password)?
        };
        let envelope = NoteEnvelope {
            note: WireNote::from(note),
            body: body_blob,
        };
        let body = serde_json::to_string(&envelope)
            .map_err(CryptoError::Serialization)?;

        match &note.remote_file_id {
            Some(file_id) => {
                self.with_retries(|| {
                    self.remote.update_file(token, file_id, &body)
                })
                .await?;
                Ok(file_id.clone())
            }
            None => {
                let metadata = FileMetadata {
                    name: note_file_name(note.id),
                    parents: vec![folder_id.to_owned()],
                    mime_type: NOTE_MIME_TYPE.to_owned(),
                };
                let file = self
                    .with_retries(|| {
                        self.remote.create_file(token, &metadata, &body)
                    })
                    .await?;
                Ok(file.id)
            }
        }
    }

    async fn ensure_app_folder(
        &self,
        token: &str,
    ) -> Result<String, SyncError> {
        if let Some(id) = self.app_folder_id.read().await.clone() {
            return Ok(id);
        }
        let id = self
            .with_retries(|| {
                self.remote
                    .find_or_create_folder(token, &self.app_folder_name)
            })
            .await?;
        *self.app_folder_id.write().await = Some(id.clone());
        Ok(id)
    }

    async fn ensure_index_file_id(
        &self,
        token: &str,
        folder_id: &str,
    ) -> Result<Option<String>, SyncError> {
        if let Some(id) = self.index_file_id.read().await.clone() {
            return Ok(Some(id));
        }
        let files = self
            .with_retries(|| self.remote.list_files(token, folder_id))
            .await?;
        let id = files
            .iter()
            .find(|file| file.name == NOTEBOOK_INDEX_FILE)
            .map(|file| file.id.clone());
        if id.is_some() {
            *self.index_file_id.write().await = id.clone();
        }
        Ok(id)
    }

    /// Bounded exponential backoff over the retryable remote failures.
    async fn with_retries<T, F, Fut>(&self, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut delay = self.retry_base_delay;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry_attempts => {
                    warn!("remote call failed (attempt {attempt}): {e}");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn store_content(
        &self,
        id: Uuid,
        content: &str,
        password: Option<&str>,
    ) -> Result<(), SyncError> {
        match password {
            Some(password) => {
                let blob = self.crypto.encrypt(&content, password)?;
                let serialized = serde_json::to_vec(&blob)
                    .map_err(CryptoError::Serialization)?;
                self.surfaced(
                    self.cache.save_note_content(id, &serialized, true).await,
                )
            }
            None => self.surfaced(
                self.cache
                    .save_note_content(id, content.as_bytes(), false)
                    .await,
            ),
        }
    }

    async fn modify_note<F: FnOnce(&mut Note)>(
        &self,
        id: Uuid,
        f: F,
    ) -> Result<Note, SyncError> {
        let mut notes = self.cache.notes().await?;
        let note = notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or(SyncError::NoteNotFound(id))?;
        f(note);
        let updated = note.clone();
        self.surfaced(self.cache.save_notes(&notes).await)?;
        Ok(updated)
    }

    async fn remove_note_locally(&self, id: Uuid) -> Result<(), SyncError> {
        let mut notes = self.cache.notes().await?;
        notes.retain(|note| note.id != id);
        self.surfaced(self.cache.save_notes(&notes).await)?;
        self.cache.delete_note_content(id).await?;
        self.unquarantine(id);
        Ok(())
    }

    async fn find_notebook(&self, id: Uuid) -> Result<Notebook, SyncError> {
        self.cache
            .notebooks()
            .await?
            .into_iter()
            .find(|notebook| notebook.id == id && !notebook.deleted)
            .ok_or(SyncError::NotebookNotFound(id))
    }

    async fn check_notebook_exists(
        &self,
        target: NotebookRef,
    ) -> Result<(), SyncError> {
        let NotebookRef::Notebook(id) = target else {
            return Ok(());
        };
        self.find_notebook(id).await?;
        Ok(())
    }

    async fn encryption_password(&self) -> Result<String, SyncError> {
        self.encryption_password
            .read()
            .await
            .clone()
            .ok_or(SyncError::EncryptionPasswordNotSet)
    }

    /// Results from before a logout must never be applied after it.
    fn check_epoch(&self, epoch: u64) -> Result<(), SyncError> {
        if self.session.epoch() != epoch {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    async fn entity_lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .entity_locks
            .lock()
            .await
            .entry(id)
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    fn quarantine(&self, id: Uuid) {
        self.quarantined.lock().unwrap().insert(id);
    }

    fn unquarantine(&self, id: Uuid) {
        self.quarantined.lock().unwrap().remove(&id);
    }

    fn is_quarantined(&self, id: Uuid) -> bool {
        self.quarantined.lock().unwrap().contains(&id)
    }

    fn surfaced<T>(
        &self,
        result: Result<T, CacheError>,
    ) -> Result<T, SyncError> {
        result.map_err(|e| {
            if matches!(e, CacheError::Quota) {
                self.emit(SyncEvent::QuotaExceeded);
            }
            e.into()
        })
    }

    fn report_sync_failure(&self, e: &SyncError) {
        match e {
            SyncError::Session(SessionError::NotLoggedIn) =>
                debug!("push deferred: not logged in"),
            SyncError::Session(SessionError::Expired)
                | SyncError::Remote(RemoteError::Auth) => {
                warn!("remote rejected the session: {e}");
                self.emit(SyncEvent::ReauthRequired);
            }
            SyncError::Cancelled =>
                debug!("sync results abandoned after logout"),
            SyncError::Cache(CacheError::Quota) => {
                // already surfaced where the write failed
            }
            other => {
                warn!("sync failed: {other}");
                self.emit(SyncEvent::DegradedMode {
                    reason: other.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        if let Err(e) = self.events.try_send(event) {
            debug!("dropping sync event: {e}");
        }
    }
}

fn note_title(content: &str) -> String {
    content
        .lines()
        .find_map(|line| line.nonblank_to_some())
        .unwrap_or_else(|| UNTITLED.to_owned())
}

fn note_file_name(id: Uuid) -> String {
    format!("{id}{NOTE_FILE_SUFFIX}")
}

fn note_file_id(name: &str) -> Option<Uuid> {
    name.strip_suffix(NOTE_FILE_SUFFIX)?.parse().ok()
}

fn parse_blob(text: &str) -> Result<EncryptedBlob, CryptoError> {
    serde_json::from_str(text).map_err(|_| CryptoError::CorruptData)
}
