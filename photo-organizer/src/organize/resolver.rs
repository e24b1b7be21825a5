use tracing::{info, warn};

use super::OrganizeError;
use super::drive::DriveService;
use super::lister::{ListingPolicy, list_children};
use super::records::{DriveItem, FolderRecord, RecordError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFolder {
    pub id: String,
    pub created: bool,
}

/// Picks the non-trashed folder named exactly `name`. With duplicates the
/// smallest id wins so repeated runs agree on the same folder.
pub fn find_folder<'a, I>(items: I, name: &str) -> Option<FolderRecord>
where
    I: IntoIterator<Item = &'a DriveItem>,
{
    let mut matches: Vec<&DriveItem> = items
        .into_iter()
        .filter(|item| item.is_folder && !item.trashed && item.name == name)
        .collect();
    matches.sort_by(|a, b| a.id.cmp(&b.id));
    if matches.len() > 1 {
        let ids: Vec<&str> = matches.iter().map(|item| item.id.as_str()).collect();
        warn!("found {} folders named {name:?}, using {}: {ids:?}", ids.len(), ids[0]);
    }
    matches.first().map(|item| FolderRecord::from((*item).clone()))
}

/// Returns the id of the folder `name` under `parent_id`, creating it when no
/// such folder exists. A folder is never created from a truncated listing.
pub async fn resolve_or_create_folder<D>(
    drive: &mut D,
    parent_id: &str,
    name: &str,
    policy: &ListingPolicy,
) -> Result<ResolvedFolder, OrganizeError>
where
    D: DriveService,
{
    let listing = list_children(drive, parent_id, false, policy).await?;
    if let Some(folder) = find_folder(&listing.items, name) {
        return Ok(ResolvedFolder {
            id: folder.id,
            created: false,
        });
    }
    if listing.truncated {
        return Err(OrganizeError::IncompleteListing {
            parent_id: parent_id.to_string(),
            name: name.to_string(),
        });
    }

    info!("Creating folder: {name}");
    let created = drive
        .create_folder(parent_id, name)
        .await
        .map_err(OrganizeError::Drive)?;
    let id = created
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RecordError::MissingId {
            name: Some(name.to_string()),
        })?;
    Ok(ResolvedFolder { id, created: true })
}
