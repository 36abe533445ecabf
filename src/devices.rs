//! `/dev` population (part of C6): the fixed table of symlinks and
//! character devices every container rootfs needs before `execvp`, since
//! the mount namespace starts with an empty `/dev` once devtmpfs isn't
//! propagated in.

use std::os::unix::fs::symlink;
use std::path::Path;

use nix::sys::stat::Mode;

use crate::error::Result;
use crate::syscall;

struct CharDevice {
    name: &'static str,
    major: u64,
    minor: u64,
    mode: u32,
}

const CHAR_DEVICES: &[CharDevice] = &[
    CharDevice { name: "null", major: 1, minor: 3, mode: 0o666 },
    CharDevice { name: "zero", major: 1, minor: 5, mode: 0o666 },
    CharDevice { name: "random", major: 1, minor: 8, mode: 0o666 },
    CharDevice { name: "urandom", major: 1, minor: 9, mode: 0o666 },
    CharDevice { name: "console", major: 136, minor: 1, mode: 0o666 },
    CharDevice { name: "tty", major: 5, minor: 0, mode: 0o666 },
    CharDevice { name: "full", major: 1, minor: 7, mode: 0o666 },
];

/// Populates `dev_dir` (expected to be the container's freshly-mounted
/// `/dev`) with the standard fd/std{in,out,err} symlinks and the character
/// devices every well-behaved rootfs expects to find.
pub fn populate(dev_dir: &Path) -> Result<()> {
    symlink_or_skip(Path::new("/proc/self/fd"), &dev_dir.join("fd"))?;
    symlink_or_skip(Path::new("/proc/self/fd/0"), &dev_dir.join("stdin"))?;
    symlink_or_skip(Path::new("/proc/self/fd/1"), &dev_dir.join("stdout"))?;
    symlink_or_skip(Path::new("/proc/self/fd/2"), &dev_dir.join("stderr"))?;

    for device in CHAR_DEVICES {
        let path = dev_dir.join(device.name);
        let dev = syscall::makedev(device.major, device.minor);
        syscall::mknod_chr(&path, Mode::from_bits_truncate(device.mode), dev)?;
    }
    Ok(())
}

/// `symlink` fails with `EEXIST` if the node is already present (e.g. a
/// devtmpfs bind-mounted in by a more privileged caller); that's the only
/// failure tolerated here, everything else aborts the containment sequence.
fn symlink_or_skip(original: &Path, link: &Path) -> Result<()> {
    match symlink(original, link) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_device_table_has_no_duplicate_names() {
        let mut names: Vec<_> = CHAR_DEVICES.iter().map(|d| d.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CHAR_DEVICES.len());
    }
}
