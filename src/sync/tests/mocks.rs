use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::remote::{
    FileMetadata,
    NOTE_MIME_TYPE,
    RemoteError,
    RemoteFile,
    RemoteStore,
};

const FOLDER_ID: &str = "folder-1";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RemoteCall {
    FindOrCreateFolder(String),
    ListFiles,
    CreateFile(String),
    UpdateFile(String),
    DeleteFile(String),
    FileContent(String),
}

/// Failures are queued ahead of time and consumed one per remote call,
/// whichever call comes next.
#[derive(Clone, Copy, Debug)]
pub enum MockFailure {
    Auth,
    NotFound,
    Server,
}

impl MockFailure {
    fn into_error(self) -> RemoteError {
        match self {
            MockFailure::Auth => RemoteError::Auth,
            MockFailure::NotFound => RemoteError::NotFound,
            MockFailure::Server => RemoteError::Server(500),
        }
    }
}

#[derive(Default)]
struct MockState {
    files: Vec<MockFile>,
    next_id: u32,
    calls: Vec<RemoteCall>,
    failures: VecDeque<MockFailure>,
}

struct MockFile {
    id: String,
    name: String,
    body: String,
}

pub struct MockRemoteStore {
    state: Mutex<MockState>,
}

impl MockRemoteStore {
    pub fn new() -> MockRemoteStore {
        MockRemoteStore {
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn queue_failure(&self, failure: MockFailure) {
        self.state.lock().unwrap().failures.push_back(failure);
    }

    pub fn queue_failures(&self, count: usize, failure: MockFailure) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state.failures.push_back(failure);
        }
    }

    pub fn insert_file(&self, name: &str, body: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.make_id();
        state.files.push(MockFile {
            id: id.clone(),
            name: name.to_owned(),
            body: body.to_owned(),
        });
        id
    }

    pub fn file_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .iter()
            .map(|file| file.name.clone())
            .collect()
    }

    pub fn file_body(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .iter()
            .find(|file| file.name == name)
            .map(|file| file.body.clone())
    }

    pub fn set_file_body(&self, name: &str, body: &str) {
        let mut state = self.state.lock().unwrap();
        let file = state
            .files
            .iter_mut()
            .find(|file| file.name == name)
            .expect("no such remote file");
        file.body = body.to_owned();
    }

    pub fn remove_file_by_name(&self, name: &str) {
        self.state.lock().unwrap().files.retain(|file| file.name != name);
    }

    fn begin(
        &self,
        call: RemoteCall,
    ) -> Result<std::sync::MutexGuard<'_, MockState>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        match state.failures.pop_front() {
            Some(failure) => Err(failure.into_error()),
            None => Ok(state),
        }
    }
}

impl MockState {
    fn make_id(&mut self) -> String {
        self.next_id += 1;
        format!("file-{}", self.next_id)
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn find_or_create_folder(
        &self,
        _token: &str,
        name: &str,
    ) -> Result<String, RemoteError> {
        let _state =
            self.begin(RemoteCall::FindOrCreateFolder(name.to_owned()))?;
        Ok(FOLDER_ID.to_owned())
    }

    async fn list_files(
        &self,
        _token: &str,
        _folder_id: &str,
    ) -> Result<Vec<RemoteFile>, RemoteError> {
        let state = self.begin(RemoteCall::ListFiles)?;
        Ok(state
            .files
            .iter()
            .map(|file| RemoteFile {
                id: file.id.clone(),
                name: file.name.clone(),
                parents: vec![FOLDER_ID.to_owned()],
                created_time: None,
                mime_type: Some(NOTE_MIME_TYPE.to_owned()),
            })
            .collect())
    }

    async fn create_file(
        &self,
        _token: &str,
        metadata: &FileMetadata,
        body: &str,
    ) -> Result<RemoteFile, RemoteError> {
        let mut state =
            self.begin(RemoteCall::CreateFile(metadata.name.clone()))?;
        let id = state.make_id();
        state.files.push(MockFile {
            id: id.clone(),
            name: metadata.name.clone(),
            body: body.to_owned(),
        });
        Ok(RemoteFile {
            id,
            name: metadata.name.clone(),
            parents: metadata.parents.clone(),
            created_time: None,
            mime_type: Some(metadata.mime_type.clone()),
        })
    }

    async fn update_file(
        &self,
        _token: &str,
        id: &str,
        body: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.begin(RemoteCall::UpdateFile(id.to_owned()))?;
        let file = state
            .files
            .iter_mut()
            .find(|file| file.id == id)
            .ok_or(RemoteError::NotFound)?;
        file.body = body.to_owned();
        Ok(())
    }

    async fn delete_file(
        &self,
        _token: &str,
        id: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.begin(RemoteCall::DeleteFile(id.to_owned()))?;
        let before = state.files.len();
        state.files.retain(|file| file.id != id);
        if state.files.len() == before {
            return Err(RemoteError::NotFound);
        }
        Ok(())
    }

    async fn file_content(
        &self,
        _token: &str,
        id: &str,
    ) -> Result<String, RemoteError> {
        let state = self.begin(RemoteCall::FileContent(id.to_owned()))?;
        state
            .files
            .iter()
            .find(|file| file.id == id)
            .map(|file| file.body.clone())
            .ok_or(RemoteError::NotFound)
    }
}
