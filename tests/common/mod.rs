#![allow(dead_code)]

use std::{
    cell::Cell,
    fs::File,
    io::{Cursor, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use ucmerced::datasets::{
    download::file_md5, ucmerced::split_filename, DatasetSplit, DownloadError, Fetch, Resources,
    UcMercedOptions,
};

/// Every fixture list names these four; `beach99.tif` is in the archive but in no list.
pub const LISTED: [&str; 4] = [
    "agricultural00.tif",
    "agricultural01.tif",
    "beach00.tif",
    "beach01.tif",
];

const IMAGES: [(&str, &str, u32, u32); 5] = [
    ("agricultural", "agricultural00.tif", 8, 8),
    ("agricultural", "agricultural01.tif", 8, 6),
    ("beach", "beach00.tif", 8, 8),
    ("beach", "beach01.tif", 4, 8),
    ("beach", "beach99.tif", 8, 8),
];

/// Stands in for the network: treats urls as local paths and counts requests.
#[derive(Clone, Default)]
pub struct CopyFetcher {
    pub calls: Rc<Cell<usize>>,
}

impl Fetch for CopyFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        self.calls.set(self.calls.get() + 1);
        Ok(std::fs::read(url)?)
    }
}

/// A miniature UC Merced release written to `source`.
pub struct Fixture {
    pub source: PathBuf,
    pub resources: Resources,
}

impl Fixture {
    pub fn new<P: AsRef<Path>>(source: P) -> Self {
        Self::with_lists(source, [&LISTED, &LISTED, &LISTED])
    }

    /// Lists in train, val, test order.
    pub fn with_lists<P: AsRef<Path>>(source: P, lists: [&[&str]; 3]) -> Self {
        let source = source.as_ref().to_path_buf();
        std::fs::create_dir_all(&source).unwrap();

        let archive = source.join("UCMerced_LandUse.zip");
        write_archive(&archive);

        let mut split_urls: [String; 3] = Default::default();
        let mut split_md5s: [String; 3] = Default::default();
        for (i, split) in DatasetSplit::ALL.into_iter().enumerate() {
            let path = source.join(split_filename(split));
            let mut contents = lists[i].join("\n");
            contents.push('\n');
            std::fs::write(&path, contents).unwrap();
            split_md5s[i] = file_md5(&path).unwrap();
            split_urls[i] = path.to_string_lossy().into_owned();
        }

        let resources = Resources {
            url: archive.to_string_lossy().into_owned(),
            md5: file_md5(&archive).unwrap(),
            filename: "UCMerced_LandUse.zip".to_owned(),
            split_urls,
            split_md5s,
        };
        Self { source, resources }
    }

    pub fn archive(&self) -> PathBuf {
        self.source.join("UCMerced_LandUse.zip")
    }

    /// Copies the archive and split lists into `root` without extracting.
    pub fn copy_downloads_to(&self, root: &Path) {
        std::fs::create_dir_all(root).unwrap();
        std::fs::copy(self.archive(), root.join("UCMerced_LandUse.zip")).unwrap();
        for split in DatasetSplit::ALL {
            let name = split_filename(split);
            std::fs::copy(self.source.join(&name), root.join(&name)).unwrap();
        }
    }

    pub fn options(&self, fetcher: &CopyFetcher) -> UcMercedOptions {
        UcMercedOptions::default()
            .download(true)
            .checksum(true)
            .resources(self.resources.clone())
            .fetcher(fetcher.clone())
    }
}

fn write_archive(path: &Path) {
    let mut zw = zip::ZipWriter::new(File::create(path).unwrap());
    let opts = zip::write::FileOptions::default();
    for (i, (class, name, w, h)) in IMAGES.into_iter().enumerate() {
        let shade = (i as u8) * 50;
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([shade, (x * 16) as u8, (y * 16) as u8]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Tiff)
            .unwrap();
        zw.start_file(format!("UCMerced_LandUse/Images/{class}/{name}"), opts)
            .unwrap();
        zw.write_all(&bytes).unwrap();
    }
    zw.finish().unwrap();
}
