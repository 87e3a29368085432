//! The two stage planners (§4.3, §4.4): pure functions from `(graph,
//! events)` to the set of steps ready to dispatch, plus a terminal signal.
//! Neither planner performs I/O or suspends; all state is re-derived from
//! an event log snapshot on every call.

mod cleanup_stage;
mod run_stage;
mod state;

pub use cleanup_stage::plan as plan_cleanup_stage;
pub use run_stage::plan as plan_run_stage;
pub use state::{derive_state, NodeState, PlanResult, Terminal};
