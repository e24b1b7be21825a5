use tracing::{error, info, warn};

use super::OrganizeError;
use super::bucket::bucket_by_month;
use super::drive::{DriveService, ROOT_FOLDER_ID};
use super::lister::{ListingPolicy, list_children};
use super::placement::{PlacementReport, place_all};
use super::records::{FolderRecord, PhotoRecord, RecordError};
use super::resolver::find_folder;
use crate::config::OrganizerConfig;

#[derive(Debug, Default)]
pub struct RunReport {
    pub photos_found: usize,
    pub months: usize,
    /// Subfolders of the source folder; only files are organized.
    pub skipped_folders: usize,
    pub rejected: Vec<RecordError>,
    pub source_truncated: bool,
    pub placement: PlacementReport,
}

impl RunReport {
    pub fn log_summary(&self) {
        info!(
            "Done: {} photos in {} months, {} added, {} already in place, {} new folders",
            self.photos_found,
            self.months,
            self.placement.photos_attached,
            self.placement.photos_already_present,
            self.placement.folders_created,
        );
        if self.source_truncated || self.placement.truncated_listings > 0 {
            warn!(
                "some listings were incomplete (source: {}, month folders: {}); rerun to finish",
                self.source_truncated, self.placement.truncated_listings
            );
        }
        for err in &self.rejected {
            warn!("not organized: {err}");
        }
        for failure in &self.placement.failures {
            warn!(
                "failed to add {} ({}) to {}: {}",
                failure.photo_name, failure.photo_id, failure.month, failure.error
            );
        }
        if let Some(aborted) = &self.placement.aborted {
            error!(
                "placement stopped at {}; later months were not organized: {}",
                aborted.month, aborted.error
            );
        }
    }

    /// False when any photo was left unplaced by an error.
    pub fn is_complete(&self) -> bool {
        self.placement.failures.is_empty() && self.placement.aborted.is_none()
    }
}

/// One organizing pass: source folder contents into year/month folders under
/// the destination folder. Both folders live at the top of the drive.
#[derive(Debug, Clone)]
pub struct Organizer {
    source_folder: String,
    destination_folder: String,
    listing: ListingPolicy,
}

impl Organizer {
    pub fn new(
        source_folder: impl Into<String>,
        destination_folder: impl Into<String>,
        listing: ListingPolicy,
    ) -> Self {
        Self {
            source_folder: source_folder.into(),
            destination_folder: destination_folder.into(),
            listing,
        }
    }

    pub fn from_config(config: &OrganizerConfig) -> Self {
        Self::new(
            config.source_folder.clone(),
            config.destination_folder.clone(),
            config.listing.clone(),
        )
    }

    pub async fn run<D>(&self, drive: &mut D) -> Result<RunReport, OrganizeError>
    where
        D: DriveService,
    {
        let (source, destination) = self.locate_folders(drive).await?;
        let mut report = RunReport::default();

        let listing = list_children(drive, &source.id, false, &self.listing).await?;
        report.source_truncated = listing.truncated;
        let mut photos = Vec::with_capacity(listing.items.len());
        for item in listing.items {
            if item.is_folder {
                report.skipped_folders += 1;
                continue;
            }
            match PhotoRecord::try_from(item) {
                Ok(photo) => photos.push(photo),
                Err(err) => {
                    warn!("rejecting record: {err}");
                    report.rejected.push(err);
                }
            }
        }

        if photos.is_empty() {
            info!("No files found.");
        } else {
            info!("Number of files: {}", photos.len());
        }
        report.photos_found = photos.len();

        let buckets = bucket_by_month(photos);
        report.months = buckets.len();
        report.placement = place_all(drive, &destination.id, &buckets, &self.listing).await;
        Ok(report)
    }

    /// Both folders are looked up before anything is written.
    async fn locate_folders<D>(
        &self,
        drive: &mut D,
    ) -> Result<(FolderRecord, FolderRecord), OrganizeError>
    where
        D: DriveService,
    {
        let root = list_children(drive, ROOT_FOLDER_ID, false, &self.listing).await?;
        // A name absent from a partial listing may still exist on a later page.
        let missing = |name: &str| {
            let parent_id = ROOT_FOLDER_ID.to_string();
            let name = name.to_string();
            if root.truncated {
                OrganizeError::IncompleteListing { parent_id, name }
            } else {
                OrganizeError::MissingFolder { parent_id, name }
            }
        };
        let source = find_folder(&root.items, &self.source_folder)
            .ok_or_else(|| missing(&self.source_folder))?;
        let destination = find_folder(&root.items, &self.destination_folder)
            .ok_or_else(|| missing(&self.destination_folder))?;
        Ok((source, destination))
    }
}
