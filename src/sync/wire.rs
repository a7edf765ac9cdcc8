use serde::{Deserialize, Serialize};
use time::UtcDateTime;
use uuid::Uuid;

use crate::crypto::EncryptedBlob;
use crate::data::{Note, Notebook, NotebookRef, SyncState};

/// Remote representation of a notebook; local-only fields (sync state)
/// stay out of the wire format.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct WireNotebook {
    pub id: Uuid,
    pub name: String,
    pub parent_folder_id: String,
    pub created_at: UtcDateTime,
}

impl From<&Notebook> for WireNotebook {
    fn from(notebook: &Notebook) -> Self {
        WireNotebook {
            id: notebook.id,
            name: notebook.name.clone(),
            parent_folder_id: notebook.parent_folder_id.clone(),
            created_at: notebook.created_at,
        }
    }
}

impl WireNotebook {
    pub fn into_notebook(self, state: SyncState) -> Notebook {
        Notebook {
            id: self.id,
            name: self.name,
            parent_folder_id: self.parent_folder_id,
            created_at: self.created_at,
            state,
            deleted: false,
        }
    }
}

/// Plaintext metadata carried in a note file so that a sync pass can diff
/// and titles stay searchable without decrypting bodies.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct WireNote {
    pub id: Uuid,
    pub title: String,
    pub notebook_id: NotebookRef,
    pub is_password_protected: bool,
    pub created_at: UtcDateTime,
    pub modified_at: UtcDateTime,
    pub checksum: String,
}

impl From<&Note> for WireNote {
    fn from(note: &Note) -> Self {
        WireNote {
            id: note.id,
            title: note.title.clone(),
            notebook_id: note.notebook_id,
            is_password_protected: note.is_password_protected,
            created_at: note.created_at,
            modified_at: note.modified_at,
            checksum: note.checksum.clone(),
        }
    }
}

impl WireNote {
    pub fn into_note(
        self,
        state: SyncState,
        remote_file_id: Option<String>,
    ) -> Note {
        Note {
            id: self.id,
            title: self.title,
            notebook_id: self.notebook_id,
            is_password_protected: self.is_password_protected,
            created_at: self.created_at,
            modified_at: self.modified_at,
            checksum: self.checksum,
            state,
            remote_file_id,
        }
    }
}

/// The complete content of one remote note file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NoteEnvelope {
    pub note: WireNote,
    pub body: EncryptedBlob,
}
