//! Awaitable file descriptor reads and writes.
//!
//! Each operation runs on the given queue and completes with an
//! [`IoResult`]. The operations use the [`Abort`] policy: a panic while
//! transferring data (in a progress handler, say) terminates the process.
//!
//! ```rust,ignore
//! let result = io::read(fd, 4096, &io_queue).resume_on(&main).await;
//! if result.error() == 0 {
//!     consume(result.data().unwrap_or_default());
//! }
//! ```

mod sys;

use crate::call::Call;
use crate::policy::Abort;
use crate::queue::Queue;
use sys::{SysResult, retrying, sys_pread, sys_pwrite, sys_read, sys_write};

use std::os::fd::RawFd;

/// Size of a single system call transfer.
const CHUNK: usize = 64 * 1024;

/// Read everything up to end of file.
pub const TO_EOF: usize = usize::MAX;

/// Progress callback: `(done, bytes, errno)`.
///
/// Called with `done == false` after every transferred chunk, and once with
/// `done == true` at the end. For writes the final call carries the bytes
/// that were not written.
pub type Progress = Box<dyn FnMut(bool, &[u8], i32) + Send>;

/// Outcome of an IO operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoResult {
    data: Option<Vec<u8>>,
    error: i32,
}

impl IoResult {
    /// For reads, the bytes read. For writes, the bytes left unwritten, or
    /// `None` if everything was written.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// The `errno` value that stopped the transfer, `0` on success.
    pub fn error(&self) -> i32 {
        self.error
    }

    /// Returns `true` if the transfer stopped without an error.
    ///
    /// A short read at end of file is not an error.
    pub fn is_ok(&self) -> bool {
        self.error == 0
    }

    /// Takes the buffer described by [`data`](IoResult::data).
    pub fn into_data(self) -> Option<Vec<u8>> {
        self.data
    }
}

/// Reads up to `length` bytes from the current position of `fd`.
///
/// Stops early at end of file. Pass [`TO_EOF`] to read everything.
pub fn read(fd: RawFd, length: usize, queue: &Queue) -> Call<IoResult, Abort> {
    spawn_io(queue, move || read_from(fd, None, length, None))
}

/// Writes all of `data` at the current position of `fd`.
pub fn write(fd: RawFd, data: Vec<u8>, queue: &Queue) -> Call<IoResult, Abort> {
    spawn_io(queue, move || write_to(fd, None, data, None))
}

/// Reads up to `length` bytes starting at `offset`, reporting progress.
pub fn read_at(
    fd: RawFd,
    offset: u64,
    length: usize,
    queue: &Queue,
    progress: Option<Progress>,
) -> Call<IoResult, Abort> {
    spawn_io(queue, move || read_from(fd, Some(offset), length, progress))
}

/// Writes all of `data` starting at `offset`, reporting progress.
pub fn write_at(
    fd: RawFd,
    offset: u64,
    data: Vec<u8>,
    queue: &Queue,
    progress: Option<Progress>,
) -> Call<IoResult, Abort> {
    spawn_io(queue, move || write_to(fd, Some(offset), data, progress))
}

fn spawn_io<F>(queue: &Queue, transfer: F) -> Call<IoResult, Abort>
where
    F: FnOnce() -> IoResult + Send + 'static,
{
    let queue = queue.clone();

    Call::with_callback(move |completion| {
        queue.submit(move || completion.success(transfer()));
    })
}

fn read_from(
    fd: RawFd,
    mut offset: Option<u64>,
    length: usize,
    mut progress: Option<Progress>,
) -> IoResult {
    let mut data = Vec::new();
    let mut chunk = vec![0u8; CHUNK.min(length)];
    let mut error = 0;

    while data.len() < length {
        let want = (length - data.len()).min(CHUNK);
        let buffer = &mut chunk[..want];
        let result: SysResult = retrying(|| match offset {
            Some(at) => sys_pread(fd, buffer, at),
            None => sys_read(fd, buffer),
        });

        match result {
            Ok(0) => break,
            Ok(n) => {
                if let Some(at) = offset.as_mut() {
                    *at += n as u64;
                }
                if let Some(handler) = progress.as_mut() {
                    handler(false, &chunk[..n], 0);
                }
                data.extend_from_slice(&chunk[..n]);
            }
            Err(errno) => {
                error = errno;
                break;
            }
        }
    }

    if let Some(handler) = progress.as_mut() {
        handler(true, &[], error);
    }
    log::trace!("read {} bytes from fd {fd}, errno {error}", data.len());

    IoResult {
        data: Some(data),
        error,
    }
}

fn write_to(fd: RawFd, offset: Option<u64>, data: Vec<u8>, mut progress: Option<Progress>) -> IoResult {
    let mut written = 0;
    let mut error = 0;

    while written < data.len() {
        let end = (written + CHUNK).min(data.len());
        let buffer = &data[written..end];
        let result = retrying(|| match offset {
            Some(at) => sys_pwrite(fd, buffer, at + written as u64),
            None => sys_write(fd, buffer),
        });

        match result {
            Ok(0) => break,
            Ok(n) => {
                if let Some(handler) = progress.as_mut() {
                    handler(false, &data[written..written + n], 0);
                }
                written += n;
            }
            Err(errno) => {
                error = errno;
                break;
            }
        }
    }

    if let Some(handler) = progress.as_mut() {
        handler(true, &data[written..], error);
    }
    log::trace!("wrote {written} of {} bytes to fd {fd}, errno {error}", data.len());

    IoResult {
        data: (written < data.len()).then(|| data[written..].to_vec()),
        error,
    }
}
