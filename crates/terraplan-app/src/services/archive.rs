//! Packaging of a per-city output directory into a single archive.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("output directory {path} does not exist")]
    MissingDirectory { path: PathBuf },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Archive `city_dir` recursively into `zip_path`. Entry names are relative to
/// the city directory with `/` separators, so the archive layout matches the
/// on-disk one.
pub fn zip_city_dir(city_dir: &Path, zip_path: &Path) -> Result<PathBuf, ArchiveError> {
    if !city_dir.is_dir() {
        return Err(ArchiveError::MissingDirectory {
            path: city_dir.to_path_buf(),
        });
    }

    let file = File::create(zip_path).map_err(|source| ArchiveError::Io {
        path: zip_path.to_path_buf(),
        source,
    })?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    add_dir(&mut writer, city_dir, city_dir, options)?;
    writer.finish()?;

    info!(path = %zip_path.display(), "city output archived");
    Ok(zip_path.to_path_buf())
}

fn add_dir(
    writer: &mut ZipWriter<File>,
    root: &Path,
    dir: &Path,
    options: SimpleFileOptions,
) -> Result<(), ArchiveError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ArchiveError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    // Deterministic entry order keeps repeated runs byte-comparable.
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ArchiveError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    paths.sort();

    for path in paths {
        let relative = path
            .strip_prefix(root)
            .expect("entry lives under the root directory")
            .to_string_lossy()
            .replace('\\', "/");

        if path.is_dir() {
            writer.add_directory(format!("{relative}/"), options)?;
            add_dir(writer, root, &path, options)?;
        } else {
            writer.start_file(relative, options)?;
            let mut source = File::open(&path).map_err(|source| ArchiveError::Io {
                path: path.clone(),
                source,
            })?;
            io::copy(&mut source, writer).map_err(|source| ArchiveError::Io {
                path: path.clone(),
                source,
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn archives_directory_contents_recursively() {
        let temp = TempDir::new().expect("temp dir");
        let city_dir = temp.path().join("Dubno");
        fs::create_dir_all(city_dir.join("nested")).expect("mkdir");
        fs::write(city_dir.join("plan.pdf"), b"pdf bytes").expect("write");
        fs::write(city_dir.join("nested").join("note.txt"), "poznámka").expect("write");

        let zip_path = temp.path().join("Dubno.zip");
        zip_city_dir(&city_dir, &zip_path).expect("archive created");

        let mut archive =
            zip::ZipArchive::new(File::open(&zip_path).expect("open")).expect("read archive");
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).expect("entry").name().to_owned())
            .collect();
        assert!(names.contains(&"plan.pdf".to_owned()));
        assert!(names.contains(&"nested/note.txt".to_owned()));

        let mut content = String::new();
        archive
            .by_name("nested/note.txt")
            .expect("entry")
            .read_to_string(&mut content)
            .expect("read entry");
        assert_eq!(content, "poznámka");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let temp = TempDir::new().expect("temp dir");
        let err = zip_city_dir(&temp.path().join("nope"), &temp.path().join("nope.zip"))
            .expect_err("must fail");
        assert!(matches!(err, ArchiveError::MissingDirectory { .. }));
    }
}
