#![deny(unsafe_code)]

//! Helmsman core — control plane for an external load balancer.
//!
//! Three cooperating pieces: the [`admin`] module speaks the balancer's
//! one-command-per-connection admin-socket protocol, the [`orchestrator`]
//! module drives the balancer's OS process lifecycle, and the
//! [`balancer::Balancer`] facade composes both with the configuration
//! store from `helmsman-config`.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future — the standard return type for async
/// trait methods that require dynamic dispatch (`dyn Trait`).
///
/// Native `async fn` in traits produces opaque return types that are **not**
/// object-safe. Traits consumed via `Arc<dyn Trait>` must return a concrete
/// `Pin<Box<dyn Future>>` instead. This alias keeps those signatures readable.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Admin-socket protocol client and response decoders.
pub mod admin;
/// Facade composing admin client, config store, and orchestrator.
pub mod balancer;
/// Process lifecycle state machine and shell-out discipline.
pub mod orchestrator;

/// Scripted [`CommandRunner`] fake used by this crate's own tests.
#[cfg(test)]
mod fake_runner;

pub use admin::{AdminClient, AdminError, Decoder, DownEvent, Reply};
pub use balancer::{Balancer, BalancerError, BalancerOptions, ServerWeight};
pub use orchestrator::{
    CommandRunner, LifecycleState, Orchestrator, OrchestratorError, PollPolicy, RunOutput,
    ShellRunner,
};
