//! Non-blocking full-duplex byte pipe

use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const BUFFER_SIZE: usize = 16 * 1024;
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Write all of `buf` to a non-blocking writer, retrying on `WouldBlock`
fn write_all_nonblocking<W: Write>(writer: &mut W, mut buf: &[u8], running: &AtomicBool) -> io::Result<()> {
    while !buf.is_empty() {
        if !running.load(Ordering::SeqCst) {
            return Err(io::Error::new(ErrorKind::Interrupted, "tunnel stopped"));
        }
        match writer.write(buf) {
            Ok(0) => return Err(io::Error::new(ErrorKind::WriteZero, "peer closed")),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(IDLE_SLEEP),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(IDLE_SLEEP),
            Err(e) => return Err(e),
        }
    }
}

/// Copy bytes in both directions until either side closes or `running` clears
///
/// Both endpoints must already be in non-blocking mode. Returns the number
/// of bytes moved local→remote and remote→local.
pub fn pipe_bidirectional<L, R>(
    local: &mut L,
    remote: &mut R,
    running: &AtomicBool,
) -> io::Result<(u64, u64)>
where
    L: Read + Write,
    R: Read + Write,
{
    let mut local_buf = vec![0u8; BUFFER_SIZE];
    let mut remote_buf = vec![0u8; BUFFER_SIZE];
    let mut sent = 0u64;
    let mut received = 0u64;

    while running.load(Ordering::SeqCst) {
        let mut activity = false;

        match local.read(&mut local_buf) {
            Ok(0) => break,
            Ok(n) => {
                write_all_nonblocking(remote, &local_buf[..n], running)?;
                sent += n as u64;
                activity = true;
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
            Err(e) => return Err(e),
        }

        match remote.read(&mut remote_buf) {
            Ok(0) => break,
            Ok(n) => {
                write_all_nonblocking(local, &remote_buf[..n], running)?;
                received += n as u64;
                activity = true;
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
            Err(e) => return Err(e),
        }

        if !activity {
            thread::sleep(IDLE_SLEEP);
        }
    }

    Ok((sent, received))
}
