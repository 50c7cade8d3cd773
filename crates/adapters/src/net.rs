// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP reachability probes.

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};

/// Try one TCP connect to `host:port`, bounded by `limit`.
pub async fn probe(host: &str, port: u16, limit: Duration) -> io::Result<()> {
    match timeout(limit, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, format!("no answer within {limit:?}"))),
    }
}

/// Probe `host:port` every `interval` until it accepts a connection.
///
/// Returns the time waited on success. On failure, returns the last probe
/// error, and only once `deadline` has fully elapsed.
pub async fn await_port(host: &str, port: u16, deadline: Duration, interval: Duration) -> io::Result<Duration> {
    let start = Instant::now();
    let end = start + deadline;
    let interval = interval.max(Duration::from_millis(10));
    let mut last_error = io::Error::new(io::ErrorKind::TimedOut, "not probed");

    loop {
        let now = Instant::now();
        if now >= end {
            return Err(last_error);
        }
        match probe(host, port, interval.min(end - now)).await {
            Ok(()) => return Ok(start.elapsed()),
            Err(e) => last_error = e,
        }
        let now = Instant::now();
        if now < end {
            sleep(interval.min(end - now)).await;
        }
    }
}

#[cfg(test)]
#[path = "net_tests.rs"]
mod tests;
