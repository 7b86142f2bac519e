//! Worker pool, server protocol, and the session that ties world, workers and renderer together.
#![forbid(unsafe_code)]

pub mod pool;
pub mod protocol;
pub mod session;

pub use pool::{
    BuildOutcome, BuildReply, BuildRequest, DispatchError, DispatchPolicy, PoolConfig, PoolError,
    PoolStats, Ticket, WorkerMessage, WorkerPool,
};
pub use protocol::{SectionPayload, ServerMessage};
pub use session::{DrainStats, NullSink, RenderSink, Session, SessionError};
