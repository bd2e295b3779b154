//! Scripted [`CommandRunner`] fake for this crate's own tests.
//!
//! Orchestrator and balancer tests script each expected shell invocation
//! and its outcome up front; the fake records every command it receives so
//! tests can assert on the exact invocation order.
//!
//! This lives inside `helmsman-core` (rather than `helmsman-test-utils`)
//! because it implements `helmsman-core`'s own [`CommandRunner`] trait. A
//! dev-dependency on `helmsman-test-utils` — which itself depends on
//! `helmsman-core` — would pull a second copy of this crate into the test
//! graph, making that copy's `CommandRunner` a distinct, incompatible
//! trait. Keeping the fake in-crate guarantees it implements the same
//! trait the tests observe.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{BoxFuture, CommandRunner, RunOutput};

enum Outcome {
    Output(RunOutput),
    SpawnError,
}

struct Step {
    expect: String,
    outcome: Outcome,
}

/// A [`CommandRunner`] that replays a script instead of shelling out.
///
/// Each scripted step names a substring the incoming command must contain;
/// a mismatch, or a command beyond the script (without a fallback), panics
/// the test.
#[derive(Default)]
pub struct FakeRunner {
    script: Mutex<VecDeque<Step>>,
    fallback: Mutex<Option<RunOutput>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, expect: &str, outcome: Outcome) -> Self {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Step {
                expect: expect.to_string(),
                outcome,
            });
        self
    }

    /// Next command succeeds with the given stdout.
    pub fn expect_ok(self, expect: &str, stdout: &str) -> Self {
        self.push(expect, Outcome::Output(RunOutput::ok(stdout)))
    }

    /// Next command exits zero but writes to stderr.
    pub fn expect_warn(self, expect: &str, stderr: &str) -> Self {
        self.push(
            expect,
            Outcome::Output(RunOutput {
                status: 0,
                stdout: String::new(),
                stderr: stderr.to_string(),
            }),
        )
    }

    /// Next command exits non-zero.
    pub fn expect_fail(self, expect: &str, status: i32, stderr: &str) -> Self {
        self.push(
            expect,
            Outcome::Output(RunOutput {
                status,
                stdout: String::new(),
                stderr: stderr.to_string(),
            }),
        )
    }

    /// Next command fails to spawn at all.
    pub fn expect_spawn_error(self, expect: &str) -> Self {
        self.push(expect, Outcome::SpawnError)
    }

    /// Once the script is exhausted, answer every further command with a
    /// clean zero-exit and the given stdout (for open-ended polling).
    pub fn always_ok(self, stdout: &str) -> Self {
        *self.fallback.lock().expect("fallback lock") = Some(RunOutput::ok(stdout));
        self
    }

    /// Every command received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &str) -> BoxFuture<'_, std::io::Result<RunOutput>> {
        let command = command.to_string();
        self.calls.lock().expect("calls lock").push(command.clone());

        let step = self.script.lock().expect("script lock").pop_front();
        let result = match step {
            Some(step) => {
                assert!(
                    command.contains(&step.expect),
                    "command {command:?} does not contain expected {:?}",
                    step.expect
                );
                match step.outcome {
                    Outcome::Output(output) => Ok(output),
                    Outcome::SpawnError => Err(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "scripted spawn failure",
                    )),
                }
            }
            None => match self.fallback.lock().expect("fallback lock").clone() {
                Some(output) => Ok(output),
                None => panic!("unexpected command: {command:?}"),
            },
        };

        Box::pin(async move { result })
    }
}
