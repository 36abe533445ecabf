//! The launch entry point (C5): mints a container id, forks the namespaced
//! child via `clone`, and waits for it — the parent-side half of the
//! containment sequence.

use std::path::{Path, PathBuf};

use chrono::Local;
use log::{info, warn};
use nix::unistd::Pid;
use uuid::Uuid;

use crate::containment::{self, ContainmentPlan};
use crate::error::Result;
use crate::ledger;
use crate::syscall;

/// Configuration for a single `launch` call, gathered from CLI flags or
/// defaults. Mirrors the shape of [`ContainmentPlan`] but is the
/// user-facing builder: `launch` derives the container id and hostname
/// internally rather than asking the caller to supply them.
pub struct LaunchOptions {
    pub image_name: String,
    pub image_dir: PathBuf,
    pub container_dir: PathBuf,
    pub cpu_shares: u64,
    pub memory: Option<u64>,
    pub memory_swap: Option<i64>,
    pub user: Option<String>,
}

impl LaunchOptions {
    pub fn new(image_name: impl Into<String>, image_dir: PathBuf, container_dir: PathBuf) -> Self {
        LaunchOptions {
            image_name: image_name.into(),
            image_dir,
            container_dir,
            cpu_shares: 0,
            memory: None,
            memory_swap: None,
            user: None,
        }
    }

    pub fn cpu_shares(mut self, value: u64) -> Self {
        self.cpu_shares = value;
        self
    }

    pub fn memory(mut self, value: Option<u64>) -> Self {
        self.memory = value;
        self
    }

    pub fn memory_swap(mut self, value: Option<i64>) -> Self {
        self.memory_swap = value;
        self
    }

    pub fn user(mut self, value: Option<String>) -> Self {
        self.user = value;
        self
    }

    /// Launches `command` in a new container, blocking until it exits, and
    /// prints `"<pid> exited with status <status>"` to stdout. `status` is
    /// the raw value `waitpid(2)` reported — a signed int with the
    /// conventional 8-bit exit-code shift, not a decoded exit code — so
    /// callers see exactly what the kernel reported.
    pub fn launch(self, command: Vec<String>) -> Result<()> {
        let container_id = Uuid::new_v4().to_string();
        let hostname = container_id.clone();

        let plan = ContainmentPlan {
            container_id: container_id.clone(),
            hostname,
            image_name: self.image_name.clone(),
            image_dir: self.image_dir,
            container_dir: self.container_dir.clone(),
            cpu_shares: self.cpu_shares,
            memory: self.memory,
            memory_swap: self.memory_swap,
            user: self.user,
            command: command.clone(),
        };

        let flags = syscall::container_namespaces();

        info!("launching container {} from image {}", plan.container_id, plan.image_name);
        let pid = syscall::clone(
            move || match containment::run(&plan, nix::unistd::getpid()) {
                Ok(()) => unreachable!("containment::run only returns on failure"),
                Err(err) => {
                    eprintln!("anchor: {err}");
                    1
                }
            },
            flags,
        )
        .map_err(crate::error::Error::UnshareDenied)?;

        // Ledger I/O failures are logged, not propagated: the child is
        // already running and must still be waited on regardless.
        let row = match ledger::append(
            Path::new("."),
            pid,
            &container_id,
            &self.image_name,
            &command,
            Local::now(),
        ) {
            Ok(row) => Some(row),
            Err(err) => {
                warn!("failed to append ledger row: {err}");
                None
            }
        };

        let status = raw_waitpid(pid)?;

        if let Some(row) = row {
            if let Err(err) = ledger::remove(Path::new("."), &row) {
                warn!("failed to remove ledger row: {err}");
            }
        }

        println!("{pid} exited with status {status}");
        Ok(())
    }
}

/// `waitpid(2)` via `nix::libc` directly rather than `nix::sys::wait`'s
/// decoded `WaitStatus`, since the raw status integer (not a reinterpreted
/// exit code) is what gets reported back to the caller.
fn raw_waitpid(pid: Pid) -> Result<i32> {
    let mut status: i32 = 0;
    let ret = unsafe { nix::libc::waitpid(pid.as_raw(), &mut status, 0) };
    if ret < 0 {
        return Err(crate::error::Error::UnshareDenied(
            crate::error::SyscallError::new("waitpid", nix::errno::Errno::last()),
        ));
    }
    Ok(status)
}
