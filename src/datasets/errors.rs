use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "download")]
    #[error("curl error: {0}")]
    CurlError(#[from] curl::Error),
    #[error("md5 mismatch: expected {expected}, found {found}")]
    Md5Mismatch { expected: String, found: String },
    #[error("cannot fetch {0}: built without the `download` feature")]
    Offline(String),
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(
        "Dataset not found in `root` directory and `download` is disabled, either specify a \
         different `root` directory or enable `download` to automatically download the dataset."
    )]
    NotFound,
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to extract archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("unknown class directory {}", .0.display())]
    UnknownClass(PathBuf),
    #[error("datasets not loaded, call `setup` first")]
    NotSetUp,
}

#[derive(Debug, Clone, Copy, Error)]
#[error("label {found} out of range, expected < {max}")]
pub struct LabelOrdinalError {
    pub found: usize,
    pub max: usize,
}
