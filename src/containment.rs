//! The in-child containment sequence (C6): everything that happens between
//! `clone` returning in the child and `execvp` replacing it.
//!
//! The `MS_PRIVATE|MS_REC` remount that detaches mount propagation runs
//! before the overlay is mounted, so the overlay never has a chance to
//! leak onto the host's mount tree. An earlier revision of this sequence
//! mounted the overlay first, which could propagate out on kernels where
//! `/` is shared; that ordering bug is not reproduced here.

use std::ffi::CString;
use std::path::{Path, PathBuf};

use log::debug;
use nix::mount::{MntFlags, MsFlags};
use nix::unistd::Pid;

use crate::cgroup;
use crate::devices;
use crate::error::{Error, Result};
use crate::image;
use crate::overlay::Workspace;
use crate::syscall;
use crate::user;

/// Everything the containment sequence needs, gathered by the launcher
/// before `clone` so the child closure only has to read, never compute.
pub struct ContainmentPlan {
    pub container_id: String,
    pub hostname: String,
    pub image_name: String,
    pub image_dir: PathBuf,
    pub container_dir: PathBuf,
    pub cpu_shares: u64,
    pub memory: Option<u64>,
    pub memory_swap: Option<i64>,
    pub user: Option<String>,
    pub command: Vec<String>,
}

/// Runs the full containment sequence in the child and, on success,
/// `execvp`s into `plan.command`. Returning at all (rather than having
/// replaced the process image) means something failed; the caller treats
/// any return from this function as a containment failure.
pub fn run(plan: &ContainmentPlan, own_pid: Pid) -> Result<()> {
    // Cgroup membership must be established while the child is still
    // visible under its host pid, before pivot_root changes what /proc
    // resolves to for it.
    cgroup::setup_cpu_cgroup(&plan.container_id, plan.cpu_shares, own_pid)?;
    cgroup::setup_memory_cgroup(&plan.container_id, plan.memory, plan.memory_swap, own_pid)?;

    if let Err(source) = syscall::sethostname(&plan.hostname) {
        return Err(Error::UnshareDenied(source));
    }

    syscall::mount(None, Path::new("/"), None, MsFlags::MS_PRIVATE | MsFlags::MS_REC, None)
        .map_err(|source| Error::MountFailed {
            target: PathBuf::from("/"),
            source,
        })?;

    let image_root = image::ensure_image_extracted(&plan.image_name, &plan.image_dir)?;
    let workspace = Workspace::new(&plan.container_dir, &plan.container_id);
    workspace.create_dirs()?;
    workspace.mount(&image_root)?;

    mount_standard_filesystems(&workspace.rootfs)?;
    devices::populate(&workspace.rootfs.join("dev"))?;

    pivot_into(&workspace.rootfs)?;

    if let Some(spec) = &plan.user {
        let (uid, gid) = user::parse_user(spec)?;
        syscall::set_user(uid, gid).map_err(Error::UnshareDenied)?;
    }

    exec(&plan.command)
}

fn mount_standard_filesystems(rootfs: &Path) -> Result<()> {
    let targets: &[(&str, &str, MsFlags, Option<&str>)] = &[
        ("proc", "proc", MsFlags::empty(), None),
        ("sysfs", "sys", MsFlags::empty(), None),
        ("tmpfs", "dev", MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME, Some("mode=755")),
        ("devpts", "dev/pts", MsFlags::empty(), None),
    ];
    for (fstype, subdir, flags, data) in targets {
        let target = rootfs.join(subdir);
        std::fs::create_dir_all(&target)?;
        syscall::mount(Some(*fstype), &target, Some(*fstype), *flags, *data).map_err(|source| {
            Error::MountFailed {
                target: target.clone(),
                source,
            }
        })?;
    }
    Ok(())
}

/// `pivot_root` swaps the process's root to `new_root`, then the old root
/// (now mounted at `new_root/old_root`) is detached and its now-empty
/// mountpoint removed.
fn pivot_into(new_root: &Path) -> Result<()> {
    let old_root = new_root.join("old_root");
    std::fs::create_dir_all(&old_root)?;

    syscall::pivot_root(new_root, &old_root).map_err(Error::PivotRootFailed)?;
    nix::unistd::chdir("/").map_err(|e| Error::PivotRootFailed(crate::error::SyscallError::new("chdir", e)))?;

    let old_root_in_new_root = Path::new("/old_root");
    syscall::umount2(old_root_in_new_root, MntFlags::MNT_DETACH)
        .map_err(Error::PivotRootFailed)?;
    std::fs::remove_dir(old_root_in_new_root)?;
    debug!("pivoted into {new_root:?}");
    Ok(())
}

fn exec(command: &[String]) -> Result<()> {
    let to_cstring = |s: &String| CString::new(s.as_bytes()).map_err(|_| Error::InvalidUser(s.clone()));
    let program = to_cstring(&command[0])?;
    let args = command.iter().map(to_cstring).collect::<Result<Vec<_>>>()?;

    let err = nix::unistd::execvp(&program, &args).unwrap_err();
    Err(Error::ExecFailed {
        command: command.join(" "),
        source: crate::error::SyscallError::new("execvp", err),
    })
}
