use std::collections::HashSet;

use tracing::{info, warn};

use super::OrganizeError;
use super::bucket::{MonthBuckets, MonthKey};
use super::drive::{DriveService, ServiceError};
use super::lister::{ListingPolicy, list_children};
use super::records::PhotoRecord;
use super::resolver::resolve_or_create_folder;

#[derive(Debug)]
pub struct PlacementFailure {
    pub photo_id: String,
    pub photo_name: String,
    pub month: MonthKey,
    pub error: ServiceError,
}

#[derive(Debug, Default)]
pub struct PlacementReport {
    pub folders_created: usize,
    pub photos_attached: usize,
    pub photos_already_present: usize,
    /// Month folders whose contents could only be listed partially.
    pub truncated_listings: usize,
    pub failures: Vec<PlacementFailure>,
    /// Error that stopped placement; later buckets were not visited.
    pub aborted: Option<AbortedBucket>,
}

#[derive(Debug)]
pub struct AbortedBucket {
    pub month: MonthKey,
    pub error: OrganizeError,
}

/// Files every bucket under `destination_root_id` as `<year>/<Month>`, in
/// ascending month order. Photos already in their month folder are skipped;
/// a failed attachment is recorded and the remaining photos still run.
/// A folder lookup that fails stops placement; the report keeps everything
/// gathered up to that point.
pub async fn place_all<D>(
    drive: &mut D,
    destination_root_id: &str,
    buckets: &MonthBuckets,
    policy: &ListingPolicy,
) -> PlacementReport
where
    D: DriveService,
{
    let mut report = PlacementReport::default();
    for (month, photos) in buckets {
        if let Err(error) =
            place_bucket(drive, destination_root_id, month, photos, policy, &mut report).await
        {
            warn!("stopping at {month}: {error}");
            report.aborted = Some(AbortedBucket {
                month: month.clone(),
                error,
            });
            break;
        }
    }
    report
}

async fn place_bucket<D>(
    drive: &mut D,
    destination_root_id: &str,
    month: &MonthKey,
    photos: &[PhotoRecord],
    policy: &ListingPolicy,
    report: &mut PlacementReport,
) -> Result<(), OrganizeError>
where
    D: DriveService,
{
    let year_name = month.year_folder_name();
    let month_name = month.month_folder_name();

    let year = resolve_or_create_folder(drive, destination_root_id, year_name, policy).await?;
    info!("Checking folder: {month_name} {year_name}");
    let month_folder = resolve_or_create_folder(drive, &year.id, &month_name, policy).await?;
    report.folders_created += usize::from(year.created) + usize::from(month_folder.created);

    let existing = list_children(drive, &month_folder.id, false, policy).await?;
    if existing.truncated {
        report.truncated_listings += 1;
    }
    let present: HashSet<&str> = existing.items.iter().map(|item| item.id.as_str()).collect();

    for photo in photos {
        if present.contains(photo.id.as_str()) {
            report.photos_already_present += 1;
            continue;
        }
        info!("Adding photo: {}", photo.name);
        match drive.add_parent(&photo.id, &month_folder.id).await {
            Ok(()) => report.photos_attached += 1,
            Err(error) => {
                warn!("failed to add {} ({}) to {month}: {error}", photo.name, photo.id);
                report.failures.push(PlacementFailure {
                    photo_id: photo.id.clone(),
                    photo_name: photo.name.clone(),
                    month: month.clone(),
                    error,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "placement_tests.rs"]
mod tests;
