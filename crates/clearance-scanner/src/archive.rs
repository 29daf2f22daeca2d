//! Unpacking of uploaded `.tar.gz` archives

use std::{
    fs,
    io::Read,
    path::{Component, Path, PathBuf},
};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::{debug, warn};

use crate::error::{Result, ScannerError};

/// Unpack a gzip-compressed tarball into `dest`.
///
/// Entries with absolute paths or `..` components abort the unpacking.
/// Links and special files are skipped. Returns the number of regular files
/// written.
pub fn unpack_tar_gz(reader: impl Read, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest)?;
    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut written = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw = entry.path()?.into_owned();
        let relative = safe_relative(&raw)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&relative);

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target)?;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                entry.unpack(&target)?;
                written += 1;
            }
            other => {
                warn!(path = %raw.display(), entry_type = ?other, "Skipping archive entry");
            }
        }
    }

    debug!(dest = %dest.display(), files = written, "Unpacked archive");
    Ok(written)
}

/// Unpack the archive file at `archive` into `dest`
pub fn unpack_file(archive: &Path, dest: &Path) -> Result<usize> {
    let file = fs::File::open(archive)?;
    unpack_tar_gz(file, dest)
}

/// Relative form of an archive path; rejects anything leaving the root
fn safe_relative(path: &Path) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ScannerError::UnsafePath(path.display().to_string()));
            }
        }
    }
    Ok(clean)
}

#[cfg(test)]
mod tests {
    use flate2::{write::GzEncoder, Compression};

    use super::*;

    fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(EntryType::Regular);
            // set_path refuses `..`, so write the name bytes directly
            let name = &mut header.as_old_mut().name;
            name[..path.len()].copy_from_slice(path.as_bytes());
            header.set_cksum();
            builder.append(&header, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_unpacks_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = tarball(&[("package/index.js", b"module.exports = 1;\n"), ("./README", b"hi")]);

        let written = unpack_tar_gz(bytes.as_slice(), dir.path()).unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("package/index.js")).unwrap(),
            "module.exports = 1;\n"
        );
        assert!(dir.path().join("README").is_file());
    }

    #[test]
    fn test_rejects_parent_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let bytes = tarball(&[("../escape.txt", b"x")]);

        let result = unpack_tar_gz(bytes.as_slice(), &dest);
        assert!(matches!(result, Err(ScannerError::UnsafePath(_))));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_rejects_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = tarball(&[("/etc/owned", b"x")]);
        assert!(matches!(
            unpack_tar_gz(bytes.as_slice(), dir.path()),
            Err(ScannerError::UnsafePath(_))
        ));
    }

    #[test]
    fn test_garbage_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            unpack_tar_gz(&b"not a tarball"[..], dir.path()),
            Err(ScannerError::Io(_))
        ));
    }

    #[test]
    fn test_safe_relative() {
        assert_eq!(safe_relative(Path::new("./a/./b")).unwrap(), PathBuf::from("a/b"));
        assert!(safe_relative(Path::new("a/../../b")).is_err());
    }
}
