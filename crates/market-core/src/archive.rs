//! Archive extraction for downloaded packages.
//!
//! Tarballs conventionally wrap their content in a single top-level
//! directory (`pkg-1.0.0/manifest.json`); that first component is dropped
//! so the content lands directly in the install directory. Zip archives are
//! extracted as-is. Entries that would escape the destination are rejected.

use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Archive container formats accepted by [`extract_archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from a file name or URL suffix.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// Like [`from_name`](Self::from_name), failing with
    /// [`Error::UnsupportedArchiveFormat`].
    pub fn detect(path: &Path) -> Result<Self> {
        Self::from_name(&path.to_string_lossy()).ok_or_else(|| Error::UnsupportedArchiveFormat {
            path: path.to_path_buf(),
        })
    }

    /// Canonical extension, including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::TarGz => ".tar.gz",
            Self::Zip => ".zip",
        }
    }
}

/// Extract `archive` into `dest`, creating `dest` if needed.
///
/// Runs on the blocking pool.
pub async fn extract_archive(archive: &Path, dest: &Path, format: ArchiveFormat) -> Result<()> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    let archive_for_err = archive.clone();

    tokio::task::spawn_blocking(move || match format {
        ArchiveFormat::TarGz => extract_tar_gz(&archive, &dest),
        ArchiveFormat::Zip => extract_zip(&archive, &dest),
    })
    .await
    .map_err(|e| Error::ExtractionFailed {
        path: archive_for_err,
        reason: e.to_string(),
    })?
}

fn failed(path: &Path, reason: impl ToString) -> Error {
    Error::ExtractionFailed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    use flate2::read::GzDecoder;
    use tar::{Archive, EntryType};

    let file = File::open(archive).map_err(|e| failed(archive, e))?;
    let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));
    std::fs::create_dir_all(dest).map_err(|e| failed(dest, e))?;

    let mut count = 0usize;
    for entry in tar.entries().map_err(|e| failed(archive, e))? {
        let mut entry = entry.map_err(|e| failed(archive, e))?;
        let entry_path = entry.path().map_err(|e| failed(archive, e))?.into_owned();

        let Some(relative) = strip_first_component(&entry_path)
            .map_err(|reason| failed(archive, reason))?
        else {
            continue;
        };
        let out_path = dest.join(relative);

        match entry.header().entry_type() {
            EntryType::Directory => {
                std::fs::create_dir_all(&out_path).map_err(|e| failed(&out_path, e))?;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = out_path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| failed(parent, e))?;
                }
                entry.unpack(&out_path).map_err(|e| failed(&out_path, e))?;
                count += 1;
            }
            other => {
                tracing::debug!(path = %entry_path.display(), kind = ?other, "skipping tar entry");
            }
        }
    }

    tracing::debug!(archive = %archive.display(), files = count, "extracted tarball");
    Ok(())
}

/// Drop the wrapper directory. `Ok(None)` for the wrapper itself.
fn strip_first_component(path: &Path) -> std::result::Result<Option<PathBuf>, String> {
    let mut normal = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normal.push(part),
            Component::CurDir => {}
            _ => return Err(format!("entry escapes destination: {}", path.display())),
        }
    }
    if normal.len() < 2 {
        return Ok(None);
    }
    Ok(Some(normal[1..].iter().collect()))
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    use zip::ZipArchive;

    let file = File::open(archive).map_err(|e| failed(archive, e))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| failed(archive, e))?;
    std::fs::create_dir_all(dest).map_err(|e| failed(dest, e))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| failed(archive, e))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(failed(
                archive,
                format!("entry escapes destination: {}", entry.name()),
            ));
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| failed(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| failed(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| failed(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| failed(&out_path, e))?;
    }

    tracing::debug!(archive = %archive.display(), entries = zip.len(), "extracted zip");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        let bytes = builder.into_inner().unwrap().finish().unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();
        std::fs::write(path, bytes).unwrap();
    }

    #[rstest]
    #[case("pkg-1.0.0.tar.gz", Some(ArchiveFormat::TarGz))]
    #[case("https://cdn.example.com/pkg.TGZ", Some(ArchiveFormat::TarGz))]
    #[case("pkg.zip", Some(ArchiveFormat::Zip))]
    #[case("pkg.tar", None)]
    #[case("pkg.rar", None)]
    #[case("pkg", None)]
    fn detects_format(#[case] name: &str, #[case] expected: Option<ArchiveFormat>) {
        assert_eq!(ArchiveFormat::from_name(name), expected);
    }

    #[test]
    fn detect_reports_unsupported_path() {
        let err = ArchiveFormat::detect(Path::new("/tmp/pkg.7z")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedArchiveFormat { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn tarball_wrapper_directory_is_stripped() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.tar.gz");
        write_tar_gz(
            &archive,
            &[
                ("pkg-1.0.0/manifest.json", "{}"),
                ("pkg-1.0.0/lib/index.js", "module.exports = 1;"),
            ],
        );
        let dest = dir.path().join("out");

        extract_archive(&archive, &dest, ArchiveFormat::TarGz).await.unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("manifest.json")).unwrap(), "{}");
        assert!(dest.join("lib/index.js").is_file());
        assert!(!dest.join("pkg-1.0.0").exists());
    }

    #[tokio::test]
    async fn zip_is_extracted_verbatim() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.zip");
        write_zip(&archive, &[("manifest.json", "{}"), ("bin/run.sh", "echo hi")]);
        let dest = dir.path().join("out");

        extract_archive(&archive, &dest, ArchiveFormat::Zip).await.unwrap();

        assert!(dest.join("manifest.json").is_file());
        assert_eq!(std::fs::read_to_string(dest.join("bin/run.sh")).unwrap(), "echo hi");
    }

    #[tokio::test]
    async fn corrupt_archive_fails_extraction() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.tar.gz");
        std::fs::write(&archive, b"definitely not gzip").unwrap();

        let err = extract_archive(&archive, &dir.path().join("out"), ArchiveFormat::TarGz)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ExtractionFailed { .. }), "{err:?}");
    }

    #[test]
    fn strip_rejects_parent_components() {
        assert!(strip_first_component(Path::new("pkg/../../etc/passwd")).is_err());
        assert_eq!(strip_first_component(Path::new("pkg/")).unwrap(), None);
        assert_eq!(
            strip_first_component(Path::new("./pkg/a/b.txt")).unwrap(),
            Some(PathBuf::from("a/b.txt"))
        );
    }
}
