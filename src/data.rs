use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use serde::de::Error;
use serde::de::Unexpected::Str;
use time::UtcDateTime;
use uuid::Uuid;

/// Per-entity synchronization status, persisted alongside the entity.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Clean,
    #[default]
    Dirty,
    Syncing,
    Orphaned,
}

impl SyncState {
    // Syncing only marks an in-flight write; after a crash the write is
    // not confirmed, so a loaded snapshot resumes from Dirty
    pub fn persisted(self) -> SyncState {
        match self {
            SyncState::Syncing => SyncState::Dirty,
            other => other,
        }
    }

    pub fn needs_push(self) -> bool {
        matches!(self, SyncState::Dirty)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub id: Uuid,
    pub name: String,
    pub parent_folder_id: String,
    pub created_at: UtcDateTime,
    #[serde(default)]
    pub state: SyncState,
    /// Tombstone: the notebook is locally deleted and the deletion has
    /// not reached the remote index yet. Kept out of every read surface
    /// and the wire format, removed once the index push succeeds.
    #[serde(default)]
    pub deleted: bool,
}

/// Reference from a note to its notebook, or the unfiled bucket.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NotebookRef {
    Notebook(Uuid),
    Unfiled,
}

const UNFILED: &str = "unfiled";

impl Display for NotebookRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NotebookRef::Notebook(id) => Display::fmt(id, f),
            NotebookRef::Unfiled => f.write_str(UNFILED),
        }
    }
}

impl Serialize for NotebookRef {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NotebookRef {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == UNFILED {
            return Ok(NotebookRef::Unfiled);
        }
        raw.parse()
            .map(NotebookRef::Notebook)
            .map_err(|_| Error::invalid_value(
                Str(&raw),
                &"a notebook uuid or \"unfiled\"",
            ))
    }
}

/// Note metadata; the body lives in the cache's content store and, remotely,
/// inside the encrypted part of the note file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub notebook_id: NotebookRef,
    pub is_password_protected: bool,
    pub created_at: UtcDateTime,
    pub modified_at: UtcDateTime,
    pub checksum: String,
    #[serde(default)]
    pub state: SyncState,
    #[serde(default)]
    pub remote_file_id: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub expires_at: UtcDateTime,
    pub user: UserProfile,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoteSortKey {
    Title,
    CreatedAt,
    ModifiedAt,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortDirection {
    Ascending,
    Descending,
}
