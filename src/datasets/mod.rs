pub mod concat;
pub mod download;
pub mod errors;
pub mod split;
pub mod ucmerced;

pub use concat::ConcatDataset;
pub use download::Fetch;
pub use errors::{DatasetError, DownloadError};
pub use split::{DatasetSplit, Split, Test, Train, Val};
pub use ucmerced::{Resources, Sample, Transform, UcMerced, UcMercedOptions};
