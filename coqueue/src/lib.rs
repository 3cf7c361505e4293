//! # coqueue
//!
//! **coqueue** lets asynchronous code run on top of execution queues.
//!
//! Three awaitable kinds sit on a single producer/consumer handoff:
//!
//! - [`Task`]: an eagerly started computation that yields one value,
//! - [`Generator`]: a lazily started body that yields a sequence,
//! - [`Call`]: a closure on a queue, or a callback based operation.
//!
//! Queues are anything implementing [`Executor`]. The crate ships
//! [`SerialQueue`], a queue with one dedicated thread, built through
//! [`QueueBuilder`]. Code moves between queues with [`switch_to`], and any
//! awaited result can be delivered on a chosen queue with `resume_on`.
//!
//! Nothing is polled by a runtime loop. A suspended body is resumed inline
//! by whoever completes what it waits for, or by a work item posted to the
//! queue it asked for.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use coqueue::{QueueBuilder, spawn_generator, spawn_task, switch_to};
//!
//! #[coqueue::main]
//! async fn main() {
//!     let worker = QueueBuilder::new().label("worker").build();
//!
//!     let sum = spawn_task({
//!         let worker = worker.clone();
//!         async move {
//!             switch_to(&worker).await;
//!             (1..=10).sum::<u32>()
//!         }
//!     })
//!     .await;
//!
//!     let squares = spawn_generator(|co| async move {
//!         for i in 1..=3u32 {
//!             co.yield_(i * i).await;
//!         }
//!     });
//!
//!     let mut cursor = squares.begin_on(&worker).await;
//!     while let Some(value) = cursor.take() {
//!         println!("{sum} {value}");
//!         cursor.advance().await.unwrap();
//!     }
//! }
//! ```
//!
//! ## Errors
//!
//! By default a panic in a producer is captured and re-raised where its
//! result is read ([`Propagate`]). With [`Abort`] the process terminates
//! instead. Misuse the types cannot prevent is reported as [`Error`].
//!
//! ## Modules
//!
//! - [`queue`]: the executor contract and the serial queue
//! - [`io`]: awaitable file descriptor reads and writes (unix, feature `io`)

mod call;
mod error;
mod generator;
mod handoff;
mod policy;
mod switch;
mod task;

pub mod queue;

#[cfg(all(unix, feature = "io"))]
pub mod io;

pub use call::{
    Call, CallFuture, CallResult, Completion, call_on, call_on_with, call_with_callback,
};
pub use error::{Error, Failure};
pub use generator::{Advance, Begin, Cursor, Generator, YieldNow, Yielder, spawn_generator};
pub use handoff::ValueToken;
pub use policy::{Abort, ErrorPolicy, Propagate};
pub use queue::{Executor, Queue, QueueBuilder, SerialQueue, Work, block_on};
pub use switch::{SwitchTo, switch_to, switch_to_after};
pub use task::{Task, TaskFuture, TaskResult, spawn_task, spawn_task_with};

pub use coqueue_macros::*;
