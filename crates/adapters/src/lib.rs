// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the outside world: local processes, SSH, libvirt, the
//! commit API and the publish step.

pub mod commits;
pub mod hypervisor;
pub mod net;
pub mod publish;
pub mod remote;
pub mod rsync;
pub mod sink;
pub mod subprocess;

pub use commits::{parse_commit_body, CommitSource, CommitSourceError, GitHubCommitSource};
pub use hypervisor::{lease_ip, quota_for, VirshController, VmController, VmError};
pub use publish::{CommandPublisher, PublishError, Publisher};
pub use remote::{ssh_command, RemoteError, RemoteRunner, SshRunner};
pub use sink::{ConsoleSink, OutputSink, SharedSink, Stream};
pub use subprocess::{CapturedOutput, CommandSpec, LocalProcessRunner, ProcessError, ProcessRunner};

#[cfg(any(test, feature = "test-support"))]
pub use commits::FakeCommitSource;
#[cfg(any(test, feature = "test-support"))]
pub use hypervisor::{FakeVmController, VmCall};
#[cfg(any(test, feature = "test-support"))]
pub use publish::FakePublisher;
#[cfg(any(test, feature = "test-support"))]
pub use remote::{FakeRemoteResult, FakeRemoteRunner, RemoteCall};
#[cfg(any(test, feature = "test-support"))]
pub use sink::{MemorySink, SinkLine};
#[cfg(any(test, feature = "test-support"))]
pub use subprocess::FakeProcessRunner;
