//! Full-transfer helpers over a [`MarkerHandle`].
//!
//! A single handle transfer may move fewer bytes than asked. These loops keep
//! going until the whole buffer is moved. Interrupted transfers are retried;
//! end of file before the buffer is full is an error.

use crate::error::{CoreError, CoreResult};
use dirtymark_storage::MarkerHandle;
use std::io;

/// Reads exactly `buf.len()` bytes starting at `offset`.
///
/// # Errors
///
/// Returns [`CoreError::UnexpectedEof`] if the file ends first, or the
/// underlying storage error.
pub fn read_full<H: MarkerHandle + ?Sized>(
    handle: &H,
    offset: u64,
    buf: &mut [u8],
) -> CoreResult<()> {
    let mut read = 0;
    while read < buf.len() {
        match handle.read_at(offset + read as u64, &mut buf[read..]) {
            Ok(0) => {
                return Err(CoreError::UnexpectedEof {
                    expected: buf.len(),
                    read,
                })
            }
            Ok(n) => read += n,
            Err(e) if e.is_interrupted() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Writes all of `buf` starting at `offset`.
///
/// # Errors
///
/// Returns an I/O error of kind `WriteZero` if the handle stops accepting
/// bytes, or the underlying storage error.
pub fn write_full<H: MarkerHandle + ?Sized>(handle: &H, offset: u64, buf: &[u8]) -> CoreResult<()> {
    let mut written = 0;
    while written < buf.len() {
        match handle.write_at(offset + written as u64, &buf[written..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("marker write stalled after {written} of {} bytes", buf.len()),
                )
                .into())
            }
            Ok(n) => written += n,
            Err(e) if e.is_interrupted() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
