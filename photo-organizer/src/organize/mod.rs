pub mod bucket;
pub mod drive;
pub mod lister;
pub mod placement;
pub mod records;
pub mod resolver;
pub mod retry;
pub mod runner;

#[cfg(test)]
mod fake_drive;

use thiserror::Error;

use self::drive::ServiceError;
use self::lister::ListError;
use self::records::RecordError;

#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error(transparent)]
    Listing(#[from] ListError),
    #[error("drive request failed: {0}")]
    Drive(ServiceError),
    #[error("folder {name:?} not found under {parent_id}")]
    MissingFolder { parent_id: String, name: String },
    #[error("listing of {parent_id} is incomplete; cannot tell whether {name:?} exists")]
    IncompleteListing { parent_id: String, name: String },
    #[error("invalid drive entry: {0}")]
    Record(#[from] RecordError),
}
