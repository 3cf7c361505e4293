use libc::{EINTR, EINVAL, off_t, pread, pwrite, read, write};

use std::io;
use std::os::fd::RawFd;

/// Result of one system call: bytes transferred, or the `errno` value.
pub(crate) type SysResult = Result<usize, i32>;

fn check(rc: isize) -> SysResult {
    if rc < 0 {
        Err(io::Error::last_os_error().raw_os_error().unwrap_or(EINVAL))
    } else {
        Ok(rc as usize)
    }
}

/// Calls `op` again while it fails with `EINTR`.
pub(crate) fn retrying(mut op: impl FnMut() -> SysResult) -> SysResult {
    loop {
        match op() {
            Err(EINTR) => continue,
            other => return other,
        }
    }
}

fn to_offset(offset: u64) -> Result<off_t, i32> {
    off_t::try_from(offset).map_err(|_| EINVAL)
}

/// Reads from the current file position.
pub(crate) fn sys_read(fd: RawFd, buffer: &mut [u8]) -> SysResult {
    check(unsafe { read(fd, buffer.as_mut_ptr() as *mut _, buffer.len()) })
}

/// Writes at the current file position.
pub(crate) fn sys_write(fd: RawFd, buffer: &[u8]) -> SysResult {
    check(unsafe { write(fd, buffer.as_ptr() as *const _, buffer.len()) })
}

/// Reads at `offset` without moving the file position.
pub(crate) fn sys_pread(fd: RawFd, buffer: &mut [u8], offset: u64) -> SysResult {
    let offset = to_offset(offset)?;
    check(unsafe { pread(fd, buffer.as_mut_ptr() as *mut _, buffer.len(), offset) })
}

/// Writes at `offset` without moving the file position.
pub(crate) fn sys_pwrite(fd: RawFd, buffer: &[u8], offset: u64) -> SysResult {
    let offset = to_offset(offset)?;
    check(unsafe { pwrite(fd, buffer.as_ptr() as *const _, buffer.len(), offset) })
}
