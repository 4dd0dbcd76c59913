// Play schedule - Loop count → play mode switches

use crate::bridge::protocol::PlayMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Play mode to select when the loop counter reaches a given value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaySchedule(BTreeMap<u32, PlayMode>);

impl PlaySchedule {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, loop_count: u32, mode: PlayMode) -> Self {
        self.0.insert(loop_count, mode);
        self
    }

    pub fn mode_for(&self, loop_count: u32) -> Option<PlayMode> {
        self.0.get(&loop_count).copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (u32, PlayMode)> + '_ {
        self.0.iter().map(|(count, mode)| (*count, *mode))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for PlaySchedule {
    fn default() -> Self {
        Self::new()
            .with(8, PlayMode::FillerOnly)
            .with(10, PlayMode::OriginalOnly)
            .with(18, PlayMode::FillerOnly)
            .with(20, PlayMode::OriginalOnly)
    }
}
