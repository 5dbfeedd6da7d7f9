use crate::error::{ErrorKind, Result};
use crate::{Progress, ProgressFn};
use exn::ResultExt;
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::ops::ControlFlow;

const CHUNK_SIZE: usize = 64 * 1024;

/// Copy `reader` into `sink`, reporting progress after every chunk.
///
/// Used by every [`Archive`](crate::Archive) implementation, and usable for
/// plain file copies that should report progress the same way.
///
/// Read failures are attributed to the source ([`ErrorKind::Corrupt`]) and
/// write failures to the destination ([`ErrorKind::Io`]).
pub fn copy_with_progress(
    reader: &mut dyn Read,
    sink: &mut dyn Write,
    total: u64,
    on_progress: &mut ProgressFn<'_>,
) -> Result<u64> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut processed = 0u64;
    if on_progress(Progress { processed, total }).is_break() {
        exn::bail!(ErrorKind::Cancelled);
    }
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => return Err(e).or_raise(|| ErrorKind::Corrupt),
        };
        sink.write_all(&buffer[..read]).or_raise(|| ErrorKind::Io)?;
        processed += read as u64;
        if let ControlFlow::Break(()) = on_progress(Progress { processed, total }) {
            exn::bail!(ErrorKind::Cancelled);
        }
    }
    sink.flush().or_raise(|| ErrorKind::Io)?;
    Ok(processed)
}
