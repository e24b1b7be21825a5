use gdrive_core::DriveFile;
use thiserror::Error;

use super::bucket::{MonthKey, MonthKeyError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("drive entry without an id (name {name:?})")]
    MissingId { name: Option<String> },
    #[error("drive entry {id} has no name")]
    MissingName { id: String },
    #[error("photo {id} ({name}) has no createdTime")]
    MissingCreatedTime { id: String, name: String },
    #[error("photo {id} ({name}) has an unusable createdTime: {source}")]
    InvalidCreatedTime {
        id: String,
        name: String,
        #[source]
        source: MonthKeyError,
    },
}

/// A validated child entry from a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub created_time: Option<String>,
    pub trashed: bool,
    pub is_folder: bool,
}

impl TryFrom<DriveFile> for DriveItem {
    type Error = RecordError;

    fn try_from(file: DriveFile) -> Result<Self, Self::Error> {
        let is_folder = file.is_folder();
        let Some(id) = file.id.filter(|id| !id.is_empty()) else {
            return Err(RecordError::MissingId { name: file.name });
        };
        let name = file.name.ok_or_else(|| RecordError::MissingName { id: id.clone() })?;
        Ok(Self {
            id,
            name,
            created_time: file.created_time,
            trashed: file.trashed.unwrap_or(false),
            is_folder,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    pub trashed: bool,
}

impl From<DriveItem> for FolderRecord {
    fn from(item: DriveItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            trashed: item.trashed,
        }
    }
}

/// A photo snapshot whose creation month is known to be well formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecord {
    pub id: String,
    pub name: String,
    pub created_time: String,
    pub trashed: bool,
    month: MonthKey,
}

impl PhotoRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        created_time: impl Into<String>,
    ) -> Result<Self, RecordError> {
        let id = id.into();
        let name = name.into();
        let created_time = created_time.into();
        let month = MonthKey::parse(&created_time).map_err(|source| {
            RecordError::InvalidCreatedTime {
                id: id.clone(),
                name: name.clone(),
                source,
            }
        })?;
        Ok(Self {
            id,
            name,
            created_time,
            trashed: false,
            month,
        })
    }

    pub fn month_key(&self) -> &MonthKey {
        &self.month
    }
}

impl TryFrom<DriveItem> for PhotoRecord {
    type Error = RecordError;

    fn try_from(item: DriveItem) -> Result<Self, Self::Error> {
        let Some(created_time) = item.created_time else {
            return Err(RecordError::MissingCreatedTime {
                id: item.id,
                name: item.name,
            });
        };
        let mut photo = PhotoRecord::new(item.id, item.name, created_time)?;
        photo.trashed = item.trashed;
        Ok(photo)
    }
}
