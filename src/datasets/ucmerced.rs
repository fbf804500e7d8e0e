//! The UC Merced Land Use scene classification dataset.
//!
//! 2100 aerial RGB tiles (256x256, 0.3m resolution) cut from USGS National Map
//! imagery, 100 per class over 21 land use classes. Train, validation and test
//! membership comes from the split lists published with the
//! `remote_sensing_representations` benchmark.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    rc::Rc,
};

use dfdx::{data::ExactSizeDataset, prelude::*};
use image::RgbImage;
use log::{debug, info, warn};

use super::{
    concat::ConcatDataset,
    download::{check_integrity, download_url, extract_archive, Fetch},
    errors::{DatasetError, DownloadError, LabelOrdinalError},
    split::{read_split_list, DatasetSplit, Split},
};

pub const URL: &str = "http://weegee.vision.ucmerced.edu/datasets/UCMerced_LandUse.zip";
pub const MD5: &str = "5b7ec56793786b6dc8a908e8854ac0e4";
pub const FILENAME: &str = "UCMerced_LandUse.zip";
pub const BASE_DIR: &str = "UCMerced_LandUse/Images";

const SPLIT_URLS: [&str; 3] = [
    "https://storage.googleapis.com/remote_sensing_representations/uc_merced-train.txt",
    "https://storage.googleapis.com/remote_sensing_representations/uc_merced-val.txt",
    "https://storage.googleapis.com/remote_sensing_representations/uc_merced-test.txt",
];
const SPLIT_MD5S: [&str; 3] = [
    "f2fb12eb2210cfb53f93f063a35ff374",
    "11ecabfc52782e5ea6a9c7c0d263aca0",
    "046aff88472d8fc07c4678d03749e28d",
];

pub const NUM_CLASSES: usize = 21;

pub const LABEL_NAMES: [&str; NUM_CLASSES] = [
    "agricultural",
    "airplane",
    "baseballdiamond",
    "beach",
    "buildings",
    "chaparral",
    "denseresidential",
    "forest",
    "freeway",
    "golfcourse",
    "harbor",
    "intersection",
    "mediumresidential",
    "mobilehomepark",
    "overpass",
    "parkinglot",
    "river",
    "runway",
    "sparseresidential",
    "storagetanks",
    "tenniscourt",
];

/// Where the archive and split lists come from, and what they hash to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    pub url: String,
    pub md5: String,
    pub filename: String,
    /// Indexed in [`DatasetSplit::ALL`] order.
    pub split_urls: [String; 3],
    pub split_md5s: [String; 3],
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            url: URL.to_owned(),
            md5: MD5.to_owned(),
            filename: FILENAME.to_owned(),
            split_urls: SPLIT_URLS.map(str::to_owned),
            split_md5s: SPLIT_MD5S.map(str::to_owned),
        }
    }
}

impl Resources {
    pub fn split_url(&self, split: DatasetSplit) -> &str {
        &self.split_urls[split_ordinal(split)]
    }

    pub fn split_md5(&self, split: DatasetSplit) -> &str {
        &self.split_md5s[split_ordinal(split)]
    }
}

fn split_ordinal(split: DatasetSplit) -> usize {
    match split {
        DatasetSplit::Train => 0,
        DatasetSplit::Val => 1,
        DatasetSplit::Test => 2,
    }
}

pub fn split_filename(split: DatasetSplit) -> String {
    format!("uc_merced-{split}.txt")
}

/// Applied to every [`Sample`] a dataset hands out.
pub type Transform = Rc<dyn Fn(Sample) -> Sample>;

pub struct UcMercedOptions {
    pub download: bool,
    pub checksum: bool,
    pub resources: Resources,
    pub fetcher: Box<dyn Fetch>,
    pub transforms: Option<Transform>,
}

impl Default for UcMercedOptions {
    fn default() -> Self {
        #[cfg(feature = "download")]
        let fetcher: Box<dyn Fetch> = Box::new(super::download::CurlFetcher);
        #[cfg(not(feature = "download"))]
        let fetcher: Box<dyn Fetch> = Box::new(super::download::Offline);
        Self {
            download: false,
            checksum: false,
            resources: Resources::default(),
            fetcher,
            transforms: None,
        }
    }
}

impl UcMercedOptions {
    pub fn download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    pub fn checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    pub fn fetcher<F: Fetch + 'static>(mut self, fetcher: F) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    pub fn transforms<F: Fn(Sample) -> Sample + 'static>(mut self, transforms: F) -> Self {
        self.transforms = Some(Rc::new(transforms));
        self
    }

    fn md5<'a>(&self, md5: &'a str) -> Option<&'a str> {
        self.checksum.then_some(md5)
    }
}

impl std::fmt::Debug for UcMercedOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UcMercedOptions")
            .field("download", &self.download)
            .field("checksum", &self.checksum)
            .field("resources", &self.resources)
            .field("transforms", &self.transforms.is_some())
            .finish_non_exhaustive()
    }
}

/// Makes sure the images are extracted under `root` and that the list for
/// `split` is present, downloading whatever is missing if allowed.
pub fn ensure_available<P: AsRef<Path>>(
    root: P,
    split: DatasetSplit,
    options: &UcMercedOptions,
) -> Result<(), DatasetError> {
    let root = root.as_ref();
    let res = &options.resources;

    let images = root.join(BASE_DIR);
    let archive = root.join(&res.filename);
    if images.exists() {
        debug!("Found extracted images at {}", images.display());
    } else if archive.exists() && archive_intact(&archive, options)? {
        extract_archive(&archive, root)?;
    } else if !options.download {
        return Err(DatasetError::NotFound);
    } else {
        download_url(
            options.fetcher.as_ref(),
            root,
            &res.url,
            &res.filename,
            options.md5(&res.md5),
        )?;
        extract_archive(&archive, root)?;
        for s in DatasetSplit::ALL {
            if !root.join(split_filename(s)).exists() {
                download_split_list(root, s, options)?;
            }
        }
    }

    if !root.join(split_filename(split)).exists() {
        if !options.download {
            return Err(DatasetError::NotFound);
        }
        download_split_list(root, split, options)?;
    }
    Ok(())
}

/// Whether an archive already in the root can be extracted as is. A digest
/// mismatch means a fresh download when `download` is on.
fn archive_intact(archive: &Path, options: &UcMercedOptions) -> Result<bool, DatasetError> {
    if !options.checksum {
        return Ok(true);
    }
    match check_integrity(archive, &options.resources.md5) {
        Ok(()) => Ok(true),
        Err(e @ DownloadError::Md5Mismatch { .. }) if options.download => {
            warn!("Discarding {}: {e}", archive.display());
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn download_split_list(
    root: &Path,
    split: DatasetSplit,
    options: &UcMercedOptions,
) -> Result<PathBuf, DatasetError> {
    let res = &options.resources;
    let path = download_url(
        options.fetcher.as_ref(),
        root,
        res.split_url(split),
        &split_filename(split),
        options.md5(res.split_md5(split)),
    )?;
    Ok(path)
}

/// A single example as tensors. The image is CHW, scaled to `[0, 1]`.
pub struct Sample {
    pub image: Tensor<(Const<3>, usize, usize), f32, Cpu>,
    pub label: usize,
}

pub struct UcMerced<S> {
    data: Vec<(RgbImage, usize)>,
    root: PathBuf,
    transforms: Option<Transform>,
    pub split: S,
}

impl<S> std::ops::Index<usize> for UcMerced<S> {
    type Output = (RgbImage, usize);
    fn index(&self, index: usize) -> &Self::Output {
        &self.data[index]
    }
}

impl<S> ExactSizeDataset for UcMerced<S> {
    type Item<'a> = &'a (RgbImage, usize) where Self: 'a;
    fn get(&self, index: usize) -> Self::Item<'_> {
        &self.data[index]
    }
    fn len(&self) -> usize {
        self.data.len()
    }
}

impl<'a, S> std::ops::Add for &'a UcMerced<S> {
    type Output = ConcatDataset<'a, UcMerced<S>>;
    fn add(self, rhs: Self) -> Self::Output {
        ConcatDataset::new(vec![self, rhs])
    }
}

impl<S> UcMerced<S> {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// The directory the dataset was loaded from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn label_name(&self, lbl: usize) -> Result<&'static str, LabelOrdinalError> {
        LABEL_NAMES.get(lbl).copied().ok_or(LabelOrdinalError {
            found: lbl,
            max: NUM_CLASSES,
        })
    }

    /// The `index`th example as tensors, after `transforms` if any were given.
    pub fn sample(&self, dev: &Cpu, index: usize) -> Sample {
        let (img, lbl) = &self.data[index];
        let (w, h) = img.dimensions();
        let sample = Sample {
            image: dev.tensor_from_vec(to_chw(img), (Const::<3>, h as usize, w as usize)),
            label: *lbl,
        };
        match &self.transforms {
            Some(t) => t(sample),
            None => sample,
        }
    }
}

impl<S: Split> UcMerced<S> {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, DatasetError> {
        Self::with_options(root, &UcMercedOptions::default())
    }

    pub fn with_options<P: AsRef<Path>>(
        root: P,
        options: &UcMercedOptions,
    ) -> Result<Self, DatasetError> {
        let root = root.as_ref();
        ensure_available(root, S::SPLIT, options)?;

        let valid = read_split_list(root.join(split_filename(S::SPLIT)))?;
        let data = load_images(&root.join(BASE_DIR), &valid)?;
        info!("Loaded {} {} images from {}", data.len(), S::SPLIT, root.display());

        Ok(Self {
            data,
            root: root.to_path_buf(),
            transforms: options.transforms.clone(),
            split: S::default(),
        })
    }
}

/// Walks `<class>/<file>` under `dir` in sorted order, keeping files named in `valid`.
fn load_images(dir: &Path, valid: &HashSet<String>) -> Result<Vec<(RgbImage, usize)>, DatasetError> {
    let mut data = Vec::new();
    for class_dir in sorted_entries(dir)? {
        if !class_dir.is_dir() {
            continue;
        }
        let lbl = class_dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| LABEL_NAMES.iter().position(|&l| l == n))
            .ok_or_else(|| DatasetError::UnknownClass(class_dir.clone()))?;

        for path in sorted_entries(&class_dir)? {
            let keep = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| valid.contains(n));
            if !keep || !path.is_file() {
                continue;
            }
            let img = image::open(&path)?.to_rgb8();
            data.push((img, lbl));
        }
    }
    Ok(data)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut paths = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    paths.sort();
    Ok(paths)
}

/// Interleaved RGB to planar, scaled to `[0, 1]`.
pub(crate) fn to_chw(img: &RgbImage) -> Vec<f32> {
    let (w, h) = img.dimensions();
    let plane = (w * h) as usize;
    let mut buf = vec![0.0; 3 * plane];
    for (i, px) in img.pixels().enumerate() {
        for c in 0..3 {
            buf[c * plane + i] = px[c] as f32 / 255.0;
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn default_resources_point_at_the_published_files() {
        let res = Resources::default();
        assert_eq!(res.filename, "UCMerced_LandUse.zip");
        assert!(res.split_url(DatasetSplit::Val).ends_with("uc_merced-val.txt"));
        assert_eq!(res.split_md5(DatasetSplit::Test), "046aff88472d8fc07c4678d03749e28d");
    }

    #[test]
    fn options_default_to_offline_and_unchecked() {
        let opts = UcMercedOptions::default();
        assert!(!opts.download);
        assert!(!opts.checksum);
        assert_eq!(opts.md5("abc"), None);
        assert_eq!(opts.checksum(true).md5("abc"), Some("abc"));
    }

    #[test]
    fn chw_layout() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) });
        assert_eq!(to_chw(&img), [1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn label_table_is_sorted() {
        let mut sorted = LABEL_NAMES;
        sorted.sort();
        assert_eq!(sorted, LABEL_NAMES);
    }

    #[test]
    fn missing_root_without_download() {
        let dir = tempfile::tempdir().unwrap();
        let err = UcMerced::<crate::datasets::Train>::new(dir.path()).err().unwrap();
        assert!(matches!(err, DatasetError::NotFound));
    }
}
