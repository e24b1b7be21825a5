//! In-memory drive used by the organizer tests.

use std::collections::{HashSet, VecDeque};

use gdrive_core::{DriveError, DriveFile, FOLDER_MIME_TYPE, FileList, StatusCode};

use super::drive::{DriveService, ServiceError};

pub fn api_error(status: u16) -> ServiceError {
    ServiceError::Drive(DriveError::Api {
        status: StatusCode::from_u16(status).expect("valid status"),
        body: String::new(),
    })
}

#[derive(Default)]
pub struct FakeDrive {
    entries: Vec<DriveFile>,
    next_folder: u32,
    /// Server-side cap on page length, independent of the requested size.
    pub max_page_len: Option<usize>,
    list_script: VecDeque<Option<ServiceError>>,
    failing_attachments: HashSet<String>,
    pub list_calls: usize,
    pub created: Vec<(String, String)>,
    pub attached: Vec<(String, String)>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_folder(&mut self, parent_id: &str, name: &str) -> String {
        self.next_folder += 1;
        let id = format!("folder-{}", self.next_folder);
        self.insert_folder(&id, parent_id, name, false);
        id
    }

    pub fn insert_folder(&mut self, id: &str, parent_id: &str, name: &str, trashed: bool) {
        self.entries.push(DriveFile {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            created_time: Some("2024-01-01T00:00:00.000Z".to_string()),
            trashed: Some(trashed),
            parents: Some(vec![parent_id.to_string()]),
        });
    }

    pub fn add_photo(&mut self, parent_id: &str, id: &str, created_time: &str) {
        self.add_file(parent_id, id, Some(created_time), false);
    }

    pub fn add_file(&mut self, parent_id: &str, id: &str, created_time: Option<&str>, trashed: bool) {
        self.entries.push(DriveFile {
            id: Some(id.to_string()),
            name: Some(format!("{id}.jpg")),
            mime_type: Some("image/jpeg".to_string()),
            created_time: created_time.map(str::to_string),
            trashed: Some(trashed),
            parents: Some(vec![parent_id.to_string()]),
        });
    }

    pub fn add_raw(&mut self, file: DriveFile) {
        self.entries.push(file);
    }

    /// Each list call consumes one scripted result; `Some(err)` fails the
    /// call, `None` serves the page normally.
    pub fn script_list_results(&mut self, script: impl IntoIterator<Item = Option<ServiceError>>) {
        self.list_script.extend(script);
    }

    pub fn fail_attachment_of(&mut self, file_id: &str) {
        self.failing_attachments.insert(file_id.to_string());
    }

    pub fn children(&self, parent_id: &str) -> Vec<&DriveFile> {
        self.entries
            .iter()
            .filter(|file| has_parent(file, parent_id))
            .collect()
    }

    pub fn child_folder_ids(&self, parent_id: &str, name: &str) -> Vec<String> {
        self.children(parent_id)
            .into_iter()
            .filter(|file| file.is_folder() && file.name.as_deref() == Some(name))
            .filter_map(|file| file.id.clone())
            .collect()
    }

    pub fn parents_of(&self, file_id: &str) -> Vec<String> {
        self.entries
            .iter()
            .find(|file| file.id.as_deref() == Some(file_id))
            .and_then(|file| file.parents.clone())
            .unwrap_or_default()
    }
}

fn has_parent(file: &DriveFile, parent_id: &str) -> bool {
    file.parents
        .as_ref()
        .is_some_and(|parents| parents.iter().any(|p| p == parent_id))
}

impl DriveService for FakeDrive {
    async fn list_page(
        &mut self,
        parent_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<FileList, ServiceError> {
        self.list_calls += 1;
        if let Some(Some(err)) = self.list_script.pop_front() {
            return Err(err);
        }

        let children = self.children(parent_id);
        let start = page_token
            .map(|token| token.parse::<usize>().expect("fake page token"))
            .unwrap_or(0);
        let len = self
            .max_page_len
            .map_or(page_size as usize, |cap| cap.min(page_size as usize))
            .max(1);
        let end = (start + len).min(children.len());
        let files = children[start.min(end)..end]
            .iter()
            .map(|file| (*file).clone())
            .collect();
        Ok(FileList {
            files,
            next_page_token: (end < children.len()).then(|| end.to_string()),
        })
    }

    async fn create_folder(
        &mut self,
        parent_id: &str,
        name: &str,
    ) -> Result<DriveFile, ServiceError> {
        let id = self.add_folder(parent_id, name);
        self.created.push((parent_id.to_string(), name.to_string()));
        let folder = self
            .entries
            .iter()
            .find(|file| file.id.as_deref() == Some(id.as_str()))
            .cloned()
            .expect("folder just inserted");
        Ok(folder)
    }

    async fn add_parent(&mut self, file_id: &str, parent_id: &str) -> Result<(), ServiceError> {
        if self.failing_attachments.contains(file_id) {
            return Err(api_error(500));
        }
        let file = self
            .entries
            .iter_mut()
            .find(|file| file.id.as_deref() == Some(file_id))
            .ok_or_else(|| api_error(404))?;
        let parents = file.parents.get_or_insert_with(Vec::new);
        if !parents.iter().any(|p| p == parent_id) {
            parents.push(parent_id.to_string());
        }
        self.attached
            .push((file_id.to_string(), parent_id.to_string()));
        Ok(())
    }
}
