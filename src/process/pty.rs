//! Pseudo-terminal allocation.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// The two ends of a freshly allocated pseudo-terminal.
///
/// Both descriptors are close-on-exec; the slave reaches the child only
/// through the `dup2` calls that wire up its stdio.
pub(crate) struct PtyPair {
    pub master: OwnedFd,
    pub slave: OwnedFd,
}

pub(crate) fn open_pty() -> io::Result<PtyPair> {
    let mut master: libc::c_int = -1;
    let mut slave: libc::c_int = -1;

    // SAFETY: openpty writes two descriptors into the provided slots and
    // accepts null for the name, termios and winsize arguments.
    let rc = unsafe {
        libc::openpty(
            &mut master,
            &mut slave,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: openpty succeeded, so both descriptors are open and owned by us.
    let pair = unsafe {
        PtyPair {
            master: OwnedFd::from_raw_fd(master),
            slave: OwnedFd::from_raw_fd(slave),
        }
    };

    set_cloexec(&pair.master)?;
    set_cloexec(&pair.slave)?;
    Ok(pair)
}

fn set_cloexec(fd: &OwnedFd) -> io::Result<()> {
    // SAFETY: fcntl on a descriptor we own.
    let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above.
    let rc = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, flags | libc::FD_CLOEXEC) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Make the calling process a session leader with stdin as its controlling
/// terminal. Runs in the forked child before exec.
pub(crate) fn become_session_leader() -> io::Result<()> {
    // SAFETY: setsid and ioctl are async-signal-safe.
    unsafe {
        if libc::setsid() < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::ioctl(0, libc::TIOCSCTTY as _, 0) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Whether a read error on a pty master means the slave side hung up.
///
/// Linux reports `EIO` once every slave descriptor is closed instead of
/// returning end-of-file.
pub(crate) fn is_hangup(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}
