//! `taskflow` — a concurrent dependency-graph task executor.
//!
//! Callers register named tasks, each declaring the names of the tasks it
//! depends on, then run the whole graph. The engine guarantees that a task's
//! function is never invoked before every declared dependency has produced
//! its value, while mutually-independent tasks run concurrently. The run
//! yields a map from task name to produced value, or the first error any
//! task returned, after cancelling all work still outstanding.
//!
//! ```
//! use taskflow::Flow;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), taskflow::FlowError> {
//! let results = Flow::new()
//!     .add("fetch", &[], |_| async { Ok(json!("data")) })
//!     .add("render", &["fetch"], |deps| async move { Ok(deps["fetch"].clone()) })
//!     .run()
//!     .await?;
//!
//! assert_eq!(results["fetch"], json!("data"));
//! assert_eq!(results["render"], json!("data"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod flow;
pub mod mock;
pub mod task;

mod dag;
mod executor;

pub use error::FlowError;
pub use flow::Flow;
pub use mock::MockTask;
pub use task::{Results, Task};
