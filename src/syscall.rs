//! Typed wrappers around the handful of Linux syscalls the containment
//! sequence composes: mount, umount2, pivot_root, unshare, sethostname,
//! clone, mknod. Each translates a `nix::errno::Errno` into a
//! [`SyscallError`] carrying the call name, target path, and an errno
//! classification, rather than letting callers pattern-match on raw errno
//! values or string messages.

use std::path::Path;

use nix::mount::{MntFlags, MsFlags};
use nix::sched::CloneFlags;
use nix::sys::signal::Signal;
use nix::sys::stat::{mknod as nix_mknod, Mode, SFlag};
use nix::unistd::Pid;

use crate::error::SyscallError;

/// The fixed namespace flag set this system clones every container with:
/// a new PID, mount, UTS, and network namespace, and nothing else (no
/// user-namespace unsharing).
pub fn container_namespaces() -> CloneFlags {
    CloneFlags::CLONE_NEWPID
        | CloneFlags::CLONE_NEWNS
        | CloneFlags::CLONE_NEWUTS
        | CloneFlags::CLONE_NEWNET
}

/// `mount(2)`. `source`/`fstype`/`data` may be `None` for the
/// remount/propagation-only calls the containment sequence issues.
pub fn mount(
    source: Option<&str>,
    target: &Path,
    fstype: Option<&str>,
    flags: MsFlags,
    data: Option<&str>,
) -> Result<(), SyscallError> {
    nix::mount::mount(source, target, fstype, flags, data)
        .map_err(|e| SyscallError::with_target("mount", target, e))
}

/// `umount2(2)`.
pub fn umount2(target: &Path, flags: MntFlags) -> Result<(), SyscallError> {
    nix::mount::umount2(target, flags)
        .map_err(|e| SyscallError::with_target("umount2", target, e))
}

/// `pivot_root(2)`.
pub fn pivot_root(new_root: &Path, put_old: &Path) -> Result<(), SyscallError> {
    nix::unistd::pivot_root(new_root, put_old)
        .map_err(|e| SyscallError::with_target("pivot_root", new_root, e))
}

/// `unshare(2)`.
pub fn unshare(flags: CloneFlags) -> Result<(), SyscallError> {
    nix::sched::unshare(flags).map_err(|e| SyscallError::new("unshare", e))
}

/// `sethostname(2)`.
pub fn sethostname(name: &str) -> Result<(), SyscallError> {
    nix::unistd::sethostname(name).map_err(|e| SyscallError::new("sethostname", e))
}

/// Encodes a `(major, minor)` device number pair with `makedev(3)`.
pub fn makedev(major: u64, minor: u64) -> u64 {
    nix::sys::stat::makedev(major, minor)
}

/// `mknod(2)` for a character device at `path` with permission bits `mode`
/// (the `S_IFCHR` type bit is applied internally).
pub fn mknod_chr(path: &Path, mode: Mode, dev: u64) -> Result<(), SyscallError> {
    nix_mknod(path, SFlag::S_IFCHR, mode, dev)
        .map_err(|e| SyscallError::with_target("mknod", path, e))
}

/// Clones a new process running `entry` with the given namespace flags.
/// Allocates the child's stack and hands it to the kernel; `entry` stands
/// in for the `(fn, args)` pair a raw `clone` trampoline would need, since
/// a closure can just capture what it needs. Returns the child's pid in
/// the host's PID namespace.
pub fn clone(entry: impl FnMut() -> isize, flags: CloneFlags) -> Result<Pid, SyscallError> {
    const STACK_SIZE: usize = 1024 * 1024;
    let mut stack = vec![0u8; STACK_SIZE].into_boxed_slice();
    unsafe { nix::sched::clone(Box::new(entry), &mut stack, flags, Some(Signal::SIGCHLD as i32)) }
        .map_err(|e| SyscallError::new("clone", e))
}

/// Sets the calling process's group id, then user id — in that order, since
/// dropping the uid first would forfeit the privilege needed to setgid.
pub fn set_user(uid: nix::unistd::Uid, gid: nix::unistd::Gid) -> Result<(), SyscallError> {
    nix::unistd::setgid(gid).map_err(|e| SyscallError::new("setgid", e))?;
    nix::unistd::setuid(uid).map_err(|e| SyscallError::new("setuid", e))
}
