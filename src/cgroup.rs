//! cgroup v1 hybrid hierarchy (C4): resource limits are applied by writing
//! directly into `/sys/fs/cgroup/<controller>/anchor/<id>/...`, one
//! subdirectory per controller, rather than the unified v2 hierarchy.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use nix::unistd::Pid;

use crate::error::{Error, Result};

const CGROUP_ROOT: &str = "/sys/fs/cgroup";
const GROUP_NAME: &str = "anchor";

/// A handle to one controller's cgroup directory for a single container.
/// `controller` is e.g. `"cpu"` or `"memory"`; the resulting path is
/// `/sys/fs/cgroup/<controller>/anchor/<container_id>`.
pub struct Cgroup {
    controller: &'static str,
    path: PathBuf,
}

impl Cgroup {
    pub fn new(controller: &'static str, container_id: &str) -> Self {
        let path = Path::new(CGROUP_ROOT)
            .join(controller)
            .join(GROUP_NAME)
            .join(container_id);
        Cgroup { controller, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.path).map_err(|source| Error::CgroupUnavailable {
            controller: self.controller,
            source,
        })
    }

    /// Writes `value` to `self.path/file`, translating the I/O error into a
    /// [`Error::CgroupUnavailable`] naming this controller.
    fn write(&self, file: &str, value: &str) -> Result<()> {
        let mut handle =
            fs::File::create(self.path.join(file)).map_err(|source| Error::CgroupUnavailable {
                controller: self.controller,
                source,
            })?;
        handle
            .write_all(value.as_bytes())
            .map_err(|source| Error::CgroupUnavailable {
                controller: self.controller,
                source,
            })
    }

    /// Adds `pid` to this cgroup's task list.
    pub fn add_task(&self, pid: Pid) -> Result<()> {
        self.write("tasks", &pid.to_string())
    }
}

/// Creates the `cpu` cgroup for `container_id`, adds `pid` to it, then sets
/// `cpu.shares` unless `cpu_shares` is `0` (meaning: inherit the parent's
/// share). `0` is the sentinel for "don't constrain CPU" since the kernel
/// itself treats `cpu.shares` as relative weight, not an absolute limit, and
/// a weight of zero is not meaningful.
pub fn setup_cpu_cgroup(container_id: &str, cpu_shares: u64, pid: Pid) -> Result<()> {
    let cgroup = Cgroup::new("cpu", container_id);
    cgroup.create()?;
    cgroup.add_task(pid)?;
    if cpu_shares != 0 {
        cgroup.write("cpu.shares", &cpu_shares.to_string())?;
    }
    Ok(())
}

/// Creates the `memory` cgroup for `container_id`, adds `pid` to it, then
/// sets `memory.limit_in_bytes` and, if `memory_swap` is given,
/// `memory.memsw.limit_in_bytes`. A `memory_swap` of `-1` is passed straight
/// through: the kernel's own sentinel for "unlimited swap".
pub fn setup_memory_cgroup(
    container_id: &str,
    memory: Option<u64>,
    memory_swap: Option<i64>,
    pid: Pid,
) -> Result<()> {
    let cgroup = Cgroup::new("memory", container_id);
    cgroup.create()?;
    cgroup.add_task(pid)?;
    if let Some(memory) = memory {
        cgroup.write("memory.limit_in_bytes", &memory.to_string())?;
    }
    if let Some(memory_swap) = memory_swap {
        cgroup.write("memory.memsw.limit_in_bytes", &memory_swap.to_string())?;
    }
    Ok(())
}

/// Removes both controllers' cgroup directories for `container_id`. Best
/// effort: a container whose process already exited and whose cgroup was
/// reaped by the kernel leaves nothing to remove.
pub fn teardown(container_id: &str) {
    for controller in ["cpu", "memory"] {
        let _ = fs::remove_dir(Cgroup::new(controller, container_id).path());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cgroup_path_is_hybrid_v1_layout() {
        let cgroup = Cgroup::new("cpu", "abc123");
        assert_eq!(
            cgroup.path(),
            Path::new("/sys/fs/cgroup/cpu/anchor/abc123")
        );
    }
}
