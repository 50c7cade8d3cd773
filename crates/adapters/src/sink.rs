// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Destination for forwarded command output.
//!
//! Build output is not log data: it is echoed line by line with the
//! stage label in front, the way an operator watching the console
//! expects to read a compiler.

use std::io::Write;
use std::sync::Arc;

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

lc_core::simple_display! {
    Stream {
        Stdout => "stdout",
        Stderr => "stderr",
    }
}

/// Receives labelled lines from local and remote commands.
pub trait OutputSink: Send + Sync + 'static {
    fn line(&self, label: &str, stream: Stream, text: &str);
}

/// Sink shared between concurrently running stages.
pub type SharedSink = Arc<dyn OutputSink>;

/// Prints `"{label}{text}"` to stdout for both streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn shared() -> SharedSink {
        Arc::new(Self)
    }
}

impl OutputSink for ConsoleSink {
    fn line(&self, label: &str, _stream: Stream, text: &str) {
        // One locked write per line keeps concurrent stages from splicing
        // into each other mid-line.
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{label}{text}");
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{OutputSink, SharedSink, Stream};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// A line captured by [`MemorySink`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SinkLine {
        pub label: String,
        pub stream: Stream,
        pub text: String,
    }

    /// Sink that records every line for assertions
    #[derive(Clone, Default)]
    pub struct MemorySink {
        lines: Arc<Mutex<Vec<SinkLine>>>,
    }

    impl MemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn shared(&self) -> SharedSink {
            Arc::new(self.clone())
        }

        pub fn lines(&self) -> Vec<SinkLine> {
            self.lines.lock().clone()
        }

        /// Text of every line on `stream`, in arrival order.
        pub fn texts(&self, stream: Stream) -> Vec<String> {
            self.lines.lock().iter().filter(|l| l.stream == stream).map(|l| l.text.clone()).collect()
        }
    }

    impl OutputSink for MemorySink {
        fn line(&self, label: &str, stream: Stream, text: &str) {
            self.lines.lock().push(SinkLine {
                label: label.to_string(),
                stream,
                text: text.to_string(),
            });
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{MemorySink, SinkLine};
