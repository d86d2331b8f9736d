use uuid::Uuid;

use super::LifecycleConfig;
use crate::buffer::BatchBuffer;
use crate::model::{PhysicsSample, ScoringSnapshot, SessionInfo};

/// Mutable state the Lifecycle Manager guards behind an `RwLock`, mirroring
/// `handlers/lap.rs`'s `LapState`.
pub struct LifecycleState {
    pub session: Option<SessionInfo>,
    pub current_lap_number: i32,
    pub lap_id: Uuid,
    pub physics_buffer: BatchBuffer<PhysicsSample>,
    pub scoring_buffer: BatchBuffer<ScoringSnapshot>,
    pub physics_history: Vec<PhysicsSample>,
    pub scoring_history: Vec<ScoringSnapshot>,
}

impl LifecycleState {
    pub fn new(config: &LifecycleConfig) -> Self {
        Self {
            session: None,
            current_lap_number: -1,
            lap_id: Uuid::new_v4(),
            physics_buffer: BatchBuffer::new(config.physics_batch_size, config.physics_flush_interval),
            scoring_buffer: BatchBuffer::new(config.scoring_batch_size, config.scoring_flush_interval),
            physics_history: Vec::new(),
            scoring_history: Vec::new(),
        }
    }
}
