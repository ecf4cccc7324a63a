//! Resolves a command name to an executable path: an absolute or relative
//! path is used as given, otherwise each directory on `$PATH` is tried in
//! order.

use crate::error::Fatal;
use nix::errno::Errno;
use nix::unistd::{access, AccessFlags};
use std::env;
use std::path::{Path, PathBuf};

/// Why [`resolve`] failed to find a usable candidate.
#[derive(Debug)]
pub enum ResolveError {
    /// Every candidate was rejected for an expected reason (missing,
    /// not a directory component, permission denied, ...); the caller
    /// should report "not a command" and keep going.
    Rejected(Errno),
    /// A candidate's `access()` call failed with an errno outside the
    /// expected continue-class set — unexpected enough that the shell
    /// can no longer trust its view of the filesystem.
    Fatal(Fatal),
}

/// Finds an executable candidate for `command`.
///
/// Names containing a `/` are treated as a literal path (relative or
/// absolute) and checked directly; anything else is searched for across
/// `$PATH`. Returns the first candidate that exists and is executable; if
/// none does, returns the rejection reason for the *last* candidate tried,
/// matching the original's behavior of reporting on the final attempt.
pub fn resolve(command: &str) -> Result<PathBuf, ResolveError> {
    if command.contains('/') {
        return check_candidate(Path::new(command));
    }

    let path_var = env::var_os("PATH").unwrap_or_default();
    let mut last_err = Errno::ENOENT;
    for dir in env::split_paths(&path_var) {
        let candidate = dir.join(command);
        match check_candidate(&candidate) {
            Ok(found) => return Ok(found),
            Err(ResolveError::Rejected(e)) => last_err = e,
            Err(fatal @ ResolveError::Fatal(_)) => return Err(fatal),
        }
    }
    Err(ResolveError::Rejected(last_err))
}

/// Per spec §4.7: existence/permission errnos (ENOENT, ENOTDIR, EACCES,
/// ELOOP, ENAMETOOLONG) are the expected "try the next candidate" class;
/// anything else (EIO, ENOMEM, ...) is unexpected enough to be fatal.
fn check_candidate(path: &Path) -> Result<PathBuf, ResolveError> {
    match access(path, AccessFlags::X_OK) {
        Ok(()) => Ok(path.to_path_buf()),
        Err(
            e @ (Errno::ENOENT
            | Errno::ENOTDIR
            | Errno::EACCES
            | Errno::ELOOP
            | Errno::ENAMETOOLONG),
        ) => Err(ResolveError::Rejected(e)),
        Err(e) => Err(ResolveError::Fatal(Fatal::Syscall {
            syscall: "access",
            errno: e,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_a_command_on_path() {
        let found = resolve("true").expect("`true` should be on PATH in test environments");
        assert!(found.ends_with("true"));
    }

    #[test]
    fn resolves_a_literal_path() {
        let found = resolve("/bin/true").or_else(|_| resolve("/usr/bin/true"));
        assert!(found.is_ok());
    }

    #[test]
    fn rejects_unknown_command() {
        let err = resolve("this-command-does-not-exist-anywhere-12345");
        assert!(matches!(err, Err(ResolveError::Rejected(_))));
    }

    #[test]
    fn rejects_nonexistent_literal_path() {
        let err = resolve("/no/such/path/at/all");
        assert!(matches!(err, Err(ResolveError::Rejected(Errno::ENOENT))));
    }
}
