//! Typed errors for the shell's internal operations.
//!
//! Two shapes, matching the taxonomy in the shell's design: [`Fatal`] always
//! terminates the process (mapped to an exit code exactly once, in `main`),
//! while [`RecoverableError`] is caught at the call site, reported, and the
//! command loop continues.

use nix::errno::Errno;
use std::fmt;

/// A condition the shell cannot continue past. Every variant corresponds to
/// one of the fatal cases in the error-handling design: unexpected errno
/// from a syscall the shell depends on for correctness, allocation failure,
/// a corrupt job table, or an illegal tokenizer delimiter set.
#[derive(Debug, thiserror::Error)]
pub enum Fatal {
    #[error("unable to read the command")]
    ReadFailed(#[source] std::io::Error),

    // Never constructed: Rust has no recoverable global-allocation-failure
    // path to surface this from. Kept so the exit-code table below stays
    // byte-for-byte the one the interface spec defines.
    #[allow(dead_code)]
    #[error("memory allocation failed")]
    Allocation,

    #[error("{syscall}() system call failed: {errno}")]
    Syscall { syscall: &'static str, errno: Errno },

    /// `waitpid` reported a status change for a pid the job table has no
    /// record of. With pipelines out of scope every forked child is a job
    /// leader, so this can only mean the table and the kernel have gone
    /// out of sync — see `status::collect_one`.
    #[error("job table is corrupt: {0}")]
    JobTableCorrupt(String),

    #[error("illegal tokenizer delimiter: delimiter set must not contain '\"' or '\\\\'")]
    IllegalDelimiter,
}

impl Fatal {
    /// Maps a fatal condition to the process exit code defined for it.
    pub fn exit_code(&self) -> i32 {
        match self {
            Fatal::ReadFailed(_) => 1,
            Fatal::Allocation => 2,
            Fatal::Syscall { .. } => 3,
            Fatal::JobTableCorrupt(_) => 4,
            Fatal::IllegalDelimiter => 5,
        }
    }
}

/// A condition reported to the user (or to stderr, for resolver candidates)
/// after which the shell keeps running. Never propagates past the component
/// that produced it.
#[derive(Debug)]
pub enum RecoverableError {
    /// `fork()` hit a transient resource limit (EAGAIN/ENOMEM).
    ForkLimited(Errno),
    /// A resolver candidate failed existence/permission checks.
    CandidateRejected(Errno),
}

impl fmt::Display for RecoverableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoverableError::ForkLimited(Errno::EAGAIN) => {
                write!(f, "Couldn't create the process: process limit exceeded.")
            }
            RecoverableError::ForkLimited(Errno::ENOMEM) => {
                write!(f, "Not enough memory to create the process.")
            }
            RecoverableError::ForkLimited(e) => write!(f, "fork failed: {e}"),
            RecoverableError::CandidateRejected(e) => write!(f, "{e}"),
        }
    }
}
