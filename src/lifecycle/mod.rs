//! Pool lifecycle
//!
//! Every candidate pool moves through a fixed set of stages, from the
//! creation log to a terminal Done, Skipped or Failed. The orchestrator
//! owns the records and is the only writer; pool tasks report to it.

pub mod events;
pub mod orchestrator;
pub mod stage;
pub mod state;

pub use events::{ChannelSink, EventSink, LifecycleEvent, TracingSink};
pub use orchestrator::{
    ConcurrencyStats, Orchestrator, OrchestratorHandle, PipelineSnapshot, StatsSnapshot,
};
pub use stage::Stage;
pub use state::{OrchestratorState, PoolRecord, RecordPatch, StateUpdate};
