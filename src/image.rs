//! Image layer (C2): locates an image tarball, extracts it once into a
//! shared, read-only lower layer, and guards against path-traversing tar
//! members.

use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use log::{debug, info};
use tar::Archive;

use crate::error::{Error, Result};

/// Resolves (but does not extract) the on-disk paths for `image_name` under
/// `image_dir`: the source tarball and the shared lower-layer directory.
pub fn image_paths(image_name: &str, image_dir: &Path) -> (PathBuf, PathBuf) {
    let image_path = image_dir.join(format!("{image_name}.tar"));
    let image_root = image_dir.join(image_name).join("rootfs");
    (image_path, image_root)
}

/// Ensures `image_name`'s rootfs has been extracted under `image_dir`,
/// extracting it on first use and reusing it afterwards. Returns the path
/// to the extracted rootfs.
///
/// Not concurrency-safe across processes — callers launching containers
/// from multiple processes concurrently must serialize calls to this
/// function themselves.
pub fn ensure_image_extracted(image_name: &str, image_dir: &Path) -> Result<PathBuf> {
    let (image_path, image_root) = image_paths(image_name, image_dir);

    if !image_path.is_file() {
        return Err(Error::ImageNotFound(image_name.to_owned()));
    }

    if image_root.is_dir() && fs::read_dir(&image_root)?.next().is_some() {
        debug!("image {image_name} already extracted at {image_root:?}");
        return Ok(image_root);
    }

    info!("extracting image {image_name} into {image_root:?}");
    if let Err(err) = extract(&image_path, &image_root) {
        // Leave no partially-extracted rootfs behind for a future call to
        // mistake for a complete one; `image_root`'s parent is the
        // image-name directory `create_dir_all` also created, so remove
        // that rather than just the `rootfs` subdirectory.
        if let Some(image_name_dir) = image_root.parent() {
            let _ = fs::remove_dir_all(image_name_dir);
        }
        return Err(err);
    }
    Ok(image_root)
}

fn extract(image_path: &Path, image_root: &Path) -> Result<()> {
    fs::create_dir_all(image_root)?;
    let mut archive = Archive::new(File::open(image_path)?);
    archive.set_preserve_permissions(true);
    archive.set_preserve_ownerships(true);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let kind = entry.header().entry_type();
        if kind.is_character_special() || kind.is_block_special() {
            continue;
        }
        let relative = entry.path()?.into_owned();
        let destination = image_root.join(&relative);
        guard_within(image_root, &destination, &relative)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&destination)?;
    }
    Ok(())
}

/// Rejects any tar member whose resolved destination escapes `image_root`,
/// e.g. via a `..` component. Works on path components rather than string
/// prefixes, so it isn't fooled by a sibling directory that merely shares a
/// name prefix with `image_root` (`rootfs-evil` vs `rootfs`).
fn guard_within(image_root: &Path, destination: &Path, member: &Path) -> Result<()> {
    let mut depth: i64 = 0;
    for component in member.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => depth -= 1,
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathTraversal(member.to_owned()))
            }
            Component::CurDir => {}
        }
        if depth < 0 {
            return Err(Error::PathTraversal(member.to_owned()));
        }
    }
    debug_assert!(destination.starts_with(image_root) || depth >= 0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tar::{Builder, Header};

    fn write_tar(path: &Path, entries: &[(&str, &[u8])]) {
        let mut builder = Builder::new(File::create(path).unwrap());
        for (name, data) in entries {
            let mut header = Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.finish().unwrap();
    }

    #[test]
    fn missing_image_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_image_extracted("does-not-exist", dir.path()).unwrap_err();
        assert!(matches!(err, Error::ImageNotFound(name) if name == "does-not-exist"));
    }

    #[test]
    fn extraction_happens_once() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("busybox.tar");
        write_tar(&tar_path, &[("bin/sh", b"#!/bin/sh\n")]);

        let root1 = ensure_image_extracted("busybox", dir.path()).unwrap();
        assert!(root1.join("bin/sh").is_file());

        // Remove the tarball; a second call must not need to re-read it.
        fs::remove_file(&tar_path).unwrap();
        let root2 = ensure_image_extracted("busybox", dir.path()).unwrap();
        assert_eq!(root1, root2);
    }

    #[test]
    fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("evil.tar");
        write_tar(&tar_path, &[("../evil", b"pwned")]);

        let err = ensure_image_extracted("evil", dir.path()).unwrap_err();
        assert!(matches!(err, Error::PathTraversal(_)));
        assert!(!dir.path().join("evil").exists());
        let outside = dir.path().parent().unwrap().join("evil");
        assert!(!outside.exists());
    }
}
