use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use url::Url;

/// `url` with a trailing slash so relative joins land beneath it.
pub fn as_directory(url: &Url) -> Url {
    let mut base = url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

/// Last non-empty path segment of `url`, or a generated name.
pub fn get_filename_from_url(url: &Url) -> String {
    if let Some(segments) = url.path_segments() {
        if let Some(filename) = segments.filter(|s| !s.is_empty()).last() {
            return filename.to_string();
        }
    }

    // Fallback if no filename found in path
    format!("download_{}", uuid::Uuid::new_v4())
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(|c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_', "_")
}

/// `filename` itself for 0, otherwise `stem_N.ext`.
pub fn numbered_filename(filename: &str, n: usize) -> String {
    if n == 0 {
        return filename.to_string();
    }

    let original = Path::new(filename);
    let file_stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match original.extension() {
        Some(extension) => format!("{}_{}.{}", file_stem, n, extension.to_string_lossy()),
        None => format!("{}_{}", file_stem, n),
    }
}

/// Create `dir/filename`, or the first free `dir/stem_N.ext`.
///
/// The name is claimed with `create_new`, so concurrent callers never end up
/// sharing a path.
pub async fn create_unique_file(dir: &Path, filename: &str) -> io::Result<(File, PathBuf)> {
    let mut counter = 0;
    loop {
        let path = dir.join(numbered_filename(filename, counter));
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_form() {
        let url = Url::parse("http://host/app").unwrap();
        assert_eq!(as_directory(&url).join("upload").unwrap().as_str(), "http://host/app/upload");
        let url = Url::parse("http://host/").unwrap();
        assert_eq!(as_directory(&url).as_str(), "http://host/");
    }

    #[test]
    fn filename_is_last_segment() {
        let url = Url::parse("http://host/dl/report.pdf?x=1").unwrap();
        assert_eq!(get_filename_from_url(&url), "report.pdf");

        let url = Url::parse("http://host/dl/archive.tar.gz/").unwrap();
        assert_eq!(get_filename_from_url(&url), "archive.tar.gz");

        let url = Url::parse("http://host/").unwrap();
        assert!(get_filename_from_url(&url).starts_with("download_"));
    }

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize_filename("a b%2F..c.txt"), "a_b_2F..c.txt");
    }

    #[test]
    fn numbered_names() {
        assert_eq!(numbered_filename("a.txt", 0), "a.txt");
        assert_eq!(numbered_filename("a.txt", 2), "a_2.txt");
        assert_eq!(numbered_filename("archive.tar.gz", 1), "archive.tar_1.gz");
        assert_eq!(numbered_filename("bin", 1), "bin_1");
    }

    #[tokio::test]
    async fn unique_file_skips_taken_names() {
        let dir = tempfile::tempdir().unwrap();
        let (_, first) = create_unique_file(dir.path(), "a.txt").await.unwrap();
        assert_eq!(first, dir.path().join("a.txt"));

        std::fs::write(dir.path().join("a_1.txt"), b"2").unwrap();
        let (_, next) = create_unique_file(dir.path(), "a.txt").await.unwrap();
        assert_eq!(next, dir.path().join("a_2.txt"));
        assert_eq!(std::fs::read(dir.path().join("a_1.txt")).unwrap(), b"2");
    }
}
