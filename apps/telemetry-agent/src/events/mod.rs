//! The agent's event enum and its `eventbus::EventLike` wiring.
//!
//! Only two kinds exist: raw samples flowing from the samplers into the Lap
//! Lifecycle Manager, and validated laps flowing from the Manager into the
//! Upload Pipeline. Everything else in the pipeline (validation, batching)
//! happens as a direct function call rather than another bus hop, per
//! spec §4.4 ("the Validator, inline").

use eventbus::EventLike;

use crate::model::{LapOutcome, RawSample, ValidatedLap};

#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Published by the Physics/Scoring samplers, consumed only by the Lap
    /// Lifecycle Manager.
    Raw(RawSample),
    /// Published by the Lap Lifecycle Manager once a closed lap has passed
    /// validation, consumed by the Upload Pipeline handler.
    LapValidated(ValidatedLap),
    /// Published by the Upload Pipeline once an upload attempt concludes
    /// (success or final failure), consumed by the Supervisor for status
    /// accounting.
    LapOutcome(LapOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentEventKind {
    Raw,
    LapValidated,
    LapOutcome,
}

impl EventLike for AgentEvent {
    type Kind = AgentEventKind;

    fn kind(&self) -> Self::Kind {
        match self {
            AgentEvent::Raw(_) => AgentEventKind::Raw,
            AgentEvent::LapValidated(_) => AgentEventKind::LapValidated,
            AgentEvent::LapOutcome(_) => AgentEventKind::LapOutcome,
        }
    }

    fn all_kinds() -> impl Iterator<Item = Self::Kind> {
        [
            AgentEventKind::Raw,
            AgentEventKind::LapValidated,
            AgentEventKind::LapOutcome,
        ]
        .into_iter()
    }
}

pub type EventBus = eventbus::EventBus<AgentEvent>;
pub type HandlerContext = eventbus::HandlerContext<AgentEvent>;
pub type HandlerRegistry = eventbus::HandlerRegistry<AgentEvent>;
pub use eventbus::EventHandler;
