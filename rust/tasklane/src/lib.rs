//! Tasklane - fire-and-forget task dispatch and a periodic scheduler
//!
//! This crate provides two cooperating primitives for multi-core devices:
//!
//! - **Task dispatch**: run a closure once on its own freshly created
//!   execution context, with an optional completion callback receiving the
//!   result. The caller never waits.
//! - **Periodic scheduling**: a single background loop that owns a list of
//!   recurring jobs, sleeps exactly until the next one is due and fires due
//!   jobs as independent dispatches. It can be paused, resumed and stopped
//!   from any context.
//!
//! # Architecture
//!
//! - [`config`]: Execution configuration and settings loading
//! - [`runtime`]: Execution-context host (thread-backed by default)
//! - [`task`]: Dispatchable tasks and their call shapes
//! - [`schedule`]: Recurrence rules
//! - [`scheduler`]: The control loop and its lifecycle
//! - [`logging`]: Tracing setup and job timing
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use tasklane::{Every, Scheduler, Task};
//!
//! fn main() -> anyhow::Result<()> {
//!     let scheduler = Scheduler::new()?;
//!     scheduler.add_task(
//!         Task::new(|| 21 * 2).on_complete(|v: i32| println!("answer {v}")),
//!         Every::seconds(10),
//!     );
//!     scheduler.run(None)?;
//!
//!     Task::new(|name: &'static str| println!("hello {name}")).dispatch(("world",))?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod schedule;
pub mod scheduler;
pub mod task;

pub use config::{Core, ExecConfig, Settings};
pub use error::{DispatchError, DispatchResult};
pub use runtime::{ContextId, ContextProvider, ThreadProvider};
pub use schedule::{Every, Recurrence, TimeUnit, every};
pub use scheduler::{Lifecycle, Scheduler, StatsSnapshot};
pub use task::Task;
