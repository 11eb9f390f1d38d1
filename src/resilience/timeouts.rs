//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every network step (resolve, connect, read, write) with a deadline
//! - Surface an elapsed deadline as `io::ErrorKind::TimedOut`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors stay `io::Error` so callers keep one error path per step

use std::future::Future;
use std::io;
use std::time::Duration;

/// Run `fut` with a deadline, flattening the elapsed case into an `io::Error`.
pub async fn io_timeout<T, F>(limit: Duration, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("operation timed out after {:?}", limit),
        )),
    }
}

/// True when `err` came from an elapsed deadline.
pub fn is_timeout(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::TimedOut
}
