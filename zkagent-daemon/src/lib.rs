//! zkagent runtime: initial mirror, watch routing, reload orchestration and
//! the outward event stream.

pub mod command;
mod error;
pub mod orchestrator;
mod router;
mod runtime;

pub use command::{run_command, CommandError, CommandOutput};
pub use error::DaemonError;
pub use orchestrator::{CommandReport, Orchestrator, ReloadPlan, ReloadReport};
pub use router::{AgentEvent, OUTWARD_CAPACITY};
pub use runtime::{
    connect, init_tracing, render_once, render_once_blocking, start, start_blocking, Agent,
    RenderOnce,
};
