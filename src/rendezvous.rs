//! Fork rendezvous: lets a freshly-forked child block until the parent has
//! finished placing it in its process group and (for foreground jobs)
//! handing it the controlling terminal.
//!
//! The original shell used a named POSIX semaphore (`/seashell10_<pid>`) for
//! this handshake. That leaves a filesystem-namespace entry that must be
//! unlinked on every exit path, including crashes, and collides across
//! pid-recycling races. A close-on-exec pipe gives the same one-shot
//! handshake without a name: the write end closes automatically if the
//! parent dies before signaling, which unblocks the child's read with EOF
//! instead of hanging it forever.

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd::{pipe2, read, write};
use std::os::fd::OwnedFd;

/// The parent's end of a rendezvous: write one byte to release the child.
pub struct RendezvousParent {
    write_fd: OwnedFd,
}

/// The child's end of a rendezvous: block until the parent releases it.
pub struct RendezvousChild {
    read_fd: OwnedFd,
}

/// Creates a new rendezvous pair. Both ends are `O_CLOEXEC`, so neither
/// leaks into the process the child eventually `execv`s into.
pub fn create() -> Result<(RendezvousParent, RendezvousChild), Errno> {
    let (read_fd, write_fd) = pipe2(OFlag::O_CLOEXEC)?;
    Ok((RendezvousParent { write_fd }, RendezvousChild { read_fd }))
}

impl RendezvousParent {
    /// Releases the child. Consumes `self`: a rendezvous fires exactly once.
    pub fn release(self) -> Result<(), Errno> {
        write(&self.write_fd, &[1u8])?;
        Ok(())
    }
}

impl RendezvousChild {
    /// Blocks until the parent calls `release`, or returns immediately if
    /// the parent's end closed without releasing (it died: proceed anyway
    /// rather than hang, matching the pipe's EOF-on-close behavior).
    pub fn wait(self) -> Result<(), Errno> {
        let mut buf = [0u8; 1];
        loop {
            match read(&self.read_fd, &mut buf) {
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
