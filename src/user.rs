//! Parsing of the `--user` CLI flag (part of C5): no ID-mapping machinery,
//! since containers here run in the host's own uid/gid space rather than a
//! user namespace — `--user` just picks which uid/gid `execvp` runs as.

use nix::unistd::{Gid, Uid};

use crate::error::{Error, Result};

/// Parses a `UID` or `UID:GID` string into the pair `set_user` expects.
/// `GID` defaults to `0` when omitted, matching the default a bare numeric
/// uid would get from `/etc/passwd` lookups elsewhere in the system.
pub fn parse_user(spec: &str) -> Result<(Uid, Gid)> {
    let invalid = || Error::InvalidUser(spec.to_owned());

    let (uid_part, gid_part) = match spec.split_once(':') {
        Some((uid, gid)) => (uid, Some(gid)),
        None => (spec, None),
    };

    let uid: u32 = uid_part.parse().map_err(|_| invalid())?;
    let gid: u32 = match gid_part {
        Some(gid) => gid.parse().map_err(|_| invalid())?,
        None => 0,
    };

    Ok((Uid::from_raw(uid), Gid::from_raw(gid)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_uid_defaults_gid_to_root() {
        let (uid, gid) = parse_user("1000").unwrap();
        assert_eq!(uid.as_raw(), 1000);
        assert_eq!(gid.as_raw(), 0);
    }

    #[test]
    fn uid_and_gid_are_both_parsed() {
        let (uid, gid) = parse_user("1000:1000").unwrap();
        assert_eq!(uid.as_raw(), 1000);
        assert_eq!(gid.as_raw(), 1000);
    }

    #[test]
    fn non_numeric_user_is_rejected() {
        assert!(matches!(parse_user("root"), Err(Error::InvalidUser(_))));
        assert!(matches!(parse_user("1000:root"), Err(Error::InvalidUser(_))));
    }

    #[test]
    fn empty_string_is_rejected() {
        assert!(matches!(parse_user(""), Err(Error::InvalidUser(_))));
    }
}
