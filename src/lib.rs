//! Interactive, interactively-extendable tool for doing things to lines.
//!
//! `sedshell` reads lines (usually file paths) and asks the operator what to
//! do with each one, a single key at a time. A command can be run once on a
//! line with `!`, and when it turns out to be the right one, bound to a key
//! with `>` so the remaining lines need just that key. Bindings are written
//! to disk as soon as they are made and are back on the next run.
//!
//! The pieces, leaf first:
//! - [`store`]: the [`BindingStore`] and its on-disk format.
//! - [`executor`]: the [`CommandRunner`] that runs templates through a shell.
//! - [`controller`]: the per-line keystroke state machine.
//! - [`session`]: the loop feeding lines to the controller.
//!
//! [`operator`] abstracts the terminal, and [`io_adapters`] provides a
//! scripted operator for driving sessions without one.

pub mod binding;
pub mod config;
pub mod controller;
pub mod env;
pub mod error;
pub mod executor;
pub mod io_adapters;
pub mod operator;
pub mod session;
pub mod skip;
pub mod store;

pub use controller::PromptController;
pub use executor::{CommandRunner, ShellExecutor};
pub use session::{Session, SessionEnd, SessionSummary};
pub use store::{BindingStore, FileStore, MemoryStore};
