use crate::catalog::PRACTICE_SIZE;
use crate::types::{Participant, Phase, TrialResponse};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Progress record for one participant, keyed in the store by session token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    pub participant: Option<Participant>,
    pub trial_order: Vec<usize>,
    pub current_trial: usize,
    pub responses: Vec<TrialResponse>,
    pub practice_index: usize,
    pub debrief_comment: Option<String>,
    pub data_file: Option<PathBuf>,
    pub comment_file: Option<PathBuf>,
    pub notices: Vec<String>,
}

impl SessionState {
    pub fn has_participant(&self) -> bool {
        self.participant
            .as_ref()
            .is_some_and(|participant| !participant.id.is_empty())
    }

    /// Phase implied by the progress cursors.
    pub fn phase(&self) -> Phase {
        if !self.has_participant() {
            return if self.data_file.is_some() {
                Phase::Complete
            } else {
                Phase::Intro
            };
        }
        if self.practice_index < PRACTICE_SIZE {
            Phase::Practice
        } else if self.current_trial < self.trial_order.len() {
            Phase::Main
        } else {
            Phase::Debrief
        }
    }

    /// Fresh progress for a participant who just consented.
    pub fn begin(&mut self, participant: Participant, trial_order: Vec<usize>) {
        *self = Self {
            participant: Some(participant),
            trial_order,
            ..Self::default()
        };
    }

    /// Drops everything except the two output paths shown on completion.
    pub fn finish(&mut self) {
        let data_file = self.data_file.take();
        let comment_file = self.comment_file.take();
        *self = Self {
            data_file,
            comment_file,
            ..Self::default()
        };
    }

    pub fn push_notice(&mut self, notice: impl Into<String>) {
        self.notices.push(notice.into());
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }
}
