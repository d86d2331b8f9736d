//! Source Adapter — the boundary behind which the simulator's shared-memory
//! binding is erased. Deliberately thin: spec §4.1 treats the adapter as an
//! opaque dependency this crate does not own the internals of.

mod mock;
#[cfg(feature = "live")]
mod pitwall_adapter;

pub use mock::MockAdapter;
#[cfg(feature = "live")]
pub use pitwall_adapter::PitwallAdapter;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{PhysicsSample, ScoringSnapshot};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("simulator is not running or shared memory is unavailable")]
    Unavailable,
    #[error("failed to open source: {0}")]
    OpenFailed(String),
    #[error("source disconnected")]
    Disconnected,
}

/// Implemented once per concrete simulator binding. The agent only ever
/// depends on this trait, never on a specific crate's wire types.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Establish the connection. Idempotent — calling it again while already
    /// open is a no-op.
    async fn open(&mut self) -> Result<(), SourceError>;

    /// Read the most recent physics tick. Returns `Unavailable` if no frame
    /// has arrived yet.
    fn read_physics(&self) -> Result<PhysicsSample, SourceError>;

    /// Read the most recent scoring data, pre-tagged with the lap id and
    /// trigger the caller is about to assign (the adapter itself has no
    /// notion of triggers — see `crate::sampling::scoring`).
    fn read_scoring(&self) -> Result<ScoringSnapshot, SourceError>;

    /// True while the sim reports the session paused/not running; samplers
    /// stop producing while this holds.
    fn is_paused(&self) -> bool;
}
