use std::path::PathBuf;

use nix::errno::Errno;

/// Coarse classification of a syscall failure, used so callers can match on
/// the failure mode instead of comparing `(errno, message)` tuples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallErrorKind {
    PermissionDenied,
    NotFound,
    Busy,
    Exists,
    Invalid,
    OtherErrno(i32),
}

impl From<Errno> for SyscallErrorKind {
    fn from(errno: Errno) -> Self {
        match errno {
            Errno::EPERM | Errno::EACCES => SyscallErrorKind::PermissionDenied,
            Errno::ENOENT => SyscallErrorKind::NotFound,
            Errno::EBUSY => SyscallErrorKind::Busy,
            Errno::EEXIST => SyscallErrorKind::Exists,
            Errno::EINVAL => SyscallErrorKind::Invalid,
            other => SyscallErrorKind::OtherErrno(other as i32),
        }
    }
}

/// A failed call into one of the `syscall` module's typed wrappers.
#[derive(Debug, Clone)]
pub struct SyscallError {
    pub call: &'static str,
    pub target: Option<PathBuf>,
    pub kind: SyscallErrorKind,
}

impl SyscallError {
    pub fn new(call: &'static str, errno: Errno) -> Self {
        Self {
            call,
            target: None,
            kind: errno.into(),
        }
    }

    pub fn with_target(call: &'static str, target: impl Into<PathBuf>, errno: Errno) -> Self {
        Self {
            call,
            target: Some(target.into()),
            kind: errno.into(),
        }
    }

    /// True for the new-namespace/mount family of calls where EPERM almost
    /// always means "missing CAP_SYS_ADMIN".
    fn needs_admin_hint(&self) -> bool {
        matches!(self.call, "unshare" | "mount" | "pivot_root" | "clone" | "mknod")
            && matches!(self.kind, SyscallErrorKind::PermissionDenied)
    }
}

impl std::fmt::Display for SyscallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed", self.call)?;
        if let Some(target) = &self.target {
            write!(f, " on {}", target.display())?;
        }
        write!(f, ": {}", self.kind)?;
        if self.needs_admin_hint() {
            write!(f, " (requires CAP_SYS_ADMIN (try with sudo))")?;
        }
        Ok(())
    }
}

impl std::error::Error for SyscallError {}

impl std::fmt::Display for SyscallErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyscallErrorKind::PermissionDenied => write!(f, "permission denied"),
            SyscallErrorKind::NotFound => write!(f, "not found"),
            SyscallErrorKind::Busy => write!(f, "device or resource busy"),
            SyscallErrorKind::Exists => write!(f, "already exists"),
            SyscallErrorKind::Invalid => write!(f, "invalid argument"),
            SyscallErrorKind::OtherErrno(n) => write!(f, "errno {n}"),
        }
    }
}

/// The crate's public error type. One variant per failure mode named in the
/// containment sequence's error handling design.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to locate image {0}")]
    ImageNotFound(String),

    #[error("path traversal in tar member {0:?}")]
    PathTraversal(PathBuf),

    #[error("cannot mount {target}: {source}")]
    MountFailed {
        target: PathBuf,
        #[source]
        source: SyscallError,
    },

    #[error("{0}")]
    UnshareDenied(SyscallError),

    #[error("cgroup controller {controller} unavailable: {source}")]
    CgroupUnavailable {
        controller: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("pivot_root failed: {0}")]
    PivotRootFailed(SyscallError),

    #[error("invalid --user value {0:?}, expected UID or UID:GID")]
    InvalidUser(String),

    #[error("failed to exec {command:?}: {source}")]
    ExecFailed {
        command: String,
        #[source]
        source: SyscallError,
    },

    #[error("ledger I/O error: {0}")]
    LedgerIo(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
