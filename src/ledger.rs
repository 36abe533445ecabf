//! The running-container ledger (C7): an append-only `containers.txt` CSV
//! file in the working directory, independent of `--container-dir`, that
//! the `ps` subcommand reads and the `run` subcommand appends to and
//! removes a line from, without any locking — a launch racing a concurrent
//! `ps` may see a half-written line, and two launches racing each other may
//! interleave appends, both accepted as-is since containers are expected
//! to be launched from a single `anchor run` invocation at a time in
//! practice. `ledger_dir` is parameterized purely for test isolation;
//! production callers always pass the current directory.

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use nix::unistd::Pid;

use crate::error::{Error, Result};

const LEDGER_FILE: &str = "containers.txt";
const FIELD_SEP: char = ',';

/// One row of the ledger: a container that was running as of the last read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerRow {
    pub pid: i32,
    pub container_id: String,
    pub image: String,
    pub command: String,
    pub created: String,
}

impl LedgerRow {
    fn to_line(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.pid,
            self.container_id,
            self.image,
            self.command,
            self.created,
            sep = FIELD_SEP
        )
    }

    fn from_line(line: &str) -> Option<Self> {
        let mut fields = line.splitn(5, FIELD_SEP);
        let pid = fields.next()?.parse().ok()?;
        let container_id = fields.next()?.to_owned();
        let image = fields.next()?.to_owned();
        let command = fields.next()?.to_owned();
        let created = fields.next()?.to_owned();
        Some(LedgerRow {
            pid,
            container_id,
            image,
            command,
            created,
        })
    }
}

fn ledger_path(ledger_dir: &Path) -> PathBuf {
    ledger_dir.join(LEDGER_FILE)
}

/// Appends a row describing a freshly-launched container. `command` is
/// space-joined the way it would appear typed at a shell; `created` is
/// formatted `dd/mm/yyyy HH:MM:SS` in local time.
pub fn append(
    ledger_dir: &Path,
    pid: Pid,
    container_id: &str,
    image: &str,
    command: &[String],
    created: DateTime<Local>,
) -> Result<LedgerRow> {
    let row = LedgerRow {
        pid: pid.as_raw(),
        container_id: container_id.to_owned(),
        image: image.to_owned(),
        command: command.join(" "),
        created: created.format("%d/%m/%Y %H:%M:%S").to_string(),
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(ledger_path(ledger_dir))
        .map_err(Error::LedgerIo)?;
    writeln!(file, "{}", row.to_line()).map_err(Error::LedgerIo)?;
    Ok(row)
}

/// Removes the first line that matches `row` exactly, rewriting the ledger
/// file in place. If no line matches (e.g. a concurrent `ps` truncated it,
/// or it was already removed), this is a no-op.
pub fn remove(ledger_dir: &Path, row: &LedgerRow) -> Result<()> {
    let path = ledger_path(ledger_dir);
    let target = row.to_line();
    let remaining: Vec<String> = read_lines(&path)?
        .into_iter()
        .filter(|line| line != &target)
        .collect();
    fs::write(path, join_lines(&remaining)).map_err(Error::LedgerIo)?;
    Ok(())
}

/// Reads every well-formed row currently in the ledger. Malformed lines are
/// skipped rather than failing the whole read.
pub fn read_all(ledger_dir: &Path) -> Result<Vec<LedgerRow>> {
    let lines = read_lines(&ledger_path(ledger_dir))?;
    Ok(lines.iter().filter_map(|line| LedgerRow::from_line(line)).collect())
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents.lines().map(str::to_owned).collect()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(Error::LedgerIo(err)),
    }
}

fn join_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 7, 29, 12, 0, 0).unwrap()
    }

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let row = append(
            dir.path(),
            Pid::from_raw(1234),
            "abc123",
            "busybox",
            &["sh".to_owned(), "-c".to_owned(), "echo hi".to_owned()],
            sample_time(),
        )
        .unwrap();

        let rows = read_all(dir.path()).unwrap();
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn remove_deletes_only_the_exact_matching_line() {
        let dir = tempfile::tempdir().unwrap();
        let row1 = append(
            dir.path(),
            Pid::from_raw(1),
            "c1",
            "busybox",
            &["sh".to_owned()],
            sample_time(),
        )
        .unwrap();
        let row2 = append(
            dir.path(),
            Pid::from_raw(2),
            "c2",
            "busybox",
            &["sh".to_owned()],
            sample_time(),
        )
        .unwrap();

        remove(dir.path(), &row1).unwrap();
        let rows = read_all(dir.path()).unwrap();
        assert_eq!(rows, vec![row2]);
    }

    #[test]
    fn removing_a_missing_row_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let row = append(
            dir.path(),
            Pid::from_raw(1),
            "c1",
            "busybox",
            &["sh".to_owned()],
            sample_time(),
        )
        .unwrap();
        let mut stale = row.clone();
        stale.pid = 999;

        remove(dir.path(), &stale).unwrap();
        assert_eq!(read_all(dir.path()).unwrap(), vec![row]);
    }

    #[test]
    fn read_all_on_missing_ledger_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_all(dir.path()).unwrap().is_empty());
    }
}
