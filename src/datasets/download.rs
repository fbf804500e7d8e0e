use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use log::{debug, info};

pub use super::errors::DownloadError;

/// Moves the bytes behind a url into memory.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

#[cfg(feature = "download")]
#[derive(Debug, Default, Clone, Copy)]
pub struct CurlFetcher;

#[cfg(feature = "download")]
impl Fetch for CurlFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let mut buf = Vec::new();
        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.fail_on_error(true)?;
        easy.progress(true)?;

        info!("Downloading {url}");
        {
            let mut dl = easy.transfer();
            let pb = indicatif::ProgressBar::new(1);
            dl.progress_function(move |total_dl, cur_dl, _, _| {
                pb.set_length(total_dl as u64);
                pb.set_position(cur_dl as u64);
                true
            })?;
            dl.write_function(|data| {
                buf.extend_from_slice(data);
                Ok(data.len())
            })?;
            dl.perform()?;
        }
        Ok(buf)
    }
}

/// Refuses every request. Used when the crate is built without `download`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

impl Fetch for Offline {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        Err(DownloadError::Offline(url.to_owned()))
    }
}

/// Fetches `url` into `root/filename`, checking the md5 first when one is given.
pub fn download_url<P: AsRef<Path>>(
    fetcher: &dyn Fetch,
    root: P,
    url: &str,
    filename: &str,
    md5: Option<&str>,
) -> Result<PathBuf, DownloadError> {
    let root = root.as_ref();
    std::fs::create_dir_all(root)?;

    let bytes = fetcher.fetch(url)?;

    if let Some(md5) = md5 {
        info!("Verifying hash is {md5}");
        let found = format!("{:x}", md5::compute(&bytes));
        if found != md5 {
            return Err(DownloadError::Md5Mismatch {
                expected: md5.to_owned(),
                found,
            });
        }
    }

    let path = root.join(filename);
    debug!("Writing {} bytes to {}", bytes.len(), path.display());
    let mut o = BufWriter::new(File::create(&path)?);
    o.write_all(&bytes)?;
    o.flush()?;
    Ok(path)
}

const BUF_SIZE: usize = 64 * 1024;

/// md5 of a file as lowercase hex.
pub fn file_md5<P: AsRef<Path>>(path: P) -> Result<String, std::io::Error> {
    let mut r = BufReader::new(File::open(path)?);
    let mut ctx = md5::Context::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }
    Ok(format!("{:x}", ctx.compute()))
}

pub fn check_integrity<P: AsRef<Path>>(path: P, md5: &str) -> Result<(), DownloadError> {
    let path = path.as_ref();
    info!("Verifying hash of {} is {md5}", path.display());
    let found = file_md5(path)?;
    if found != md5 {
        return Err(DownloadError::Md5Mismatch {
            expected: md5.to_owned(),
            found,
        });
    }
    Ok(())
}

pub fn extract_archive<P: AsRef<Path>, Q: AsRef<Path>>(
    archive: P,
    dest: Q,
) -> Result<(), zip::result::ZipError> {
    let archive = archive.as_ref();
    let dest = dest.as_ref();
    info!("Extracting {} to {}", archive.display(), dest.display());
    let mut zip = zip::ZipArchive::new(BufReader::new(File::open(archive)?))?;
    zip.extract(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bytes(&'static [u8]);

    impl Fetch for Bytes {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, DownloadError> {
            Ok(self.0.to_vec())
        }
    }

    #[test]
    fn file_md5_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello\n").unwrap();
        assert_eq!(file_md5(&path).unwrap(), "b1946ac92492d2347c6235b4d2611184");
        assert!(check_integrity(&path, "b1946ac92492d2347c6235b4d2611184").is_ok());
    }

    #[test]
    fn check_integrity_reports_both_digests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        match check_integrity(&path, "00000000000000000000000000000000") {
            Err(DownloadError::Md5Mismatch { expected, found }) => {
                assert_eq!(expected, "00000000000000000000000000000000");
                assert_eq!(found, "d41d8cd98f00b204e9800998ecf8427e");
            }
            other => panic!("expected md5 mismatch, got {other:?}"),
        }
    }

    #[test]
    fn download_url_writes_verified_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested");
        let path = download_url(
            &Bytes(b"hello\n"),
            &root,
            "unused://",
            "hello.txt",
            Some("b1946ac92492d2347c6235b4d2611184"),
        )
        .unwrap();
        assert_eq!(path, root.join("hello.txt"));
        assert_eq!(std::fs::read(path).unwrap(), b"hello\n");
    }

    #[test]
    fn download_url_rejects_bad_md5_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let err = download_url(
            &Bytes(b"hello\n"),
            dir.path(),
            "unused://",
            "hello.txt",
            Some("d41d8cd98f00b204e9800998ecf8427e"),
        )
        .unwrap_err();
        assert!(matches!(err, DownloadError::Md5Mismatch { .. }));
        assert!(!dir.path().join("hello.txt").exists());
    }

    #[test]
    fn offline_refuses() {
        let err = Offline.fetch("http://example.com/a.zip").unwrap_err();
        assert!(matches!(err, DownloadError::Offline(url) if url == "http://example.com/a.zip"));
    }
}
