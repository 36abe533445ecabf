//! Overlay workspace layout (C3): where a container's copy-on-write layers
//! live on disk, and the single overlay mount that stitches them together.

use std::path::{Path, PathBuf};

use nix::mount::MsFlags;

use crate::error::{Error, Result};
use crate::syscall;

/// The on-disk layout for one container's copy-on-write state, rooted at
/// `container_dir/<id>`.
pub struct Workspace {
    pub rootfs: PathBuf,
    pub upperdir: PathBuf,
    pub workdir: PathBuf,
}

impl Workspace {
    pub fn new(container_dir: &Path, container_id: &str) -> Self {
        let base = container_dir.join(container_id);
        Workspace {
            rootfs: base.join("rootfs"),
            upperdir: base.join("cow_upperdir"),
            workdir: base.join("cow_workdir"),
        }
    }

    /// Creates the three directories the overlay mount below will bind
    /// together. Must run before [`Workspace::mount`].
    pub fn create_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.rootfs)?;
        std::fs::create_dir_all(&self.upperdir)?;
        std::fs::create_dir_all(&self.workdir)?;
        Ok(())
    }

    /// Mounts an overlayfs at `self.rootfs` with `image_root` as the
    /// read-only lower layer and this workspace's `upperdir`/`workdir` as
    /// the writable layers. `nodev`/`nosuid` are not implied by overlayfs and
    /// are applied explicitly so images cannot smuggle in device nodes or
    /// setuid binaries through the writable layer.
    pub fn mount(&self, image_root: &Path) -> Result<()> {
        let data = format!(
            "lowerdir={},upperdir={},workdir={}",
            image_root.display(),
            self.upperdir.display(),
            self.workdir.display(),
        );
        syscall::mount(
            Some("overlay"),
            &self.rootfs,
            Some("overlay"),
            MsFlags::MS_NODEV | MsFlags::MS_NOSUID,
            Some(data.as_str()),
        )
        .map_err(|source| Error::MountFailed {
            target: self.rootfs.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_paths_are_scoped_to_container_id() {
        let ws = Workspace::new(Path::new("/var/lib/anchor/containers"), "abc123");
        assert_eq!(
            ws.rootfs,
            Path::new("/var/lib/anchor/containers/abc123/rootfs")
        );
        assert_eq!(
            ws.upperdir,
            Path::new("/var/lib/anchor/containers/abc123/cow_upperdir")
        );
        assert_eq!(
            ws.workdir,
            Path::new("/var/lib/anchor/containers/abc123/cow_workdir")
        );
    }

    #[test]
    fn create_dirs_makes_all_three() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "c1");
        ws.create_dirs().unwrap();
        assert!(ws.rootfs.is_dir());
        assert!(ws.upperdir.is_dir());
        assert!(ws.workdir.is_dir());
    }
}
