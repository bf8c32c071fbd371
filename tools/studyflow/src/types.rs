use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    #[serde(rename = "FP")]
    FalsePositive,
    #[serde(rename = "FN")]
    FalseNegative,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FalsePositive => "FP",
            Self::FalseNegative => "FN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExplanationQuality {
    Poor,
    Good,
}

impl ExplanationQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Poor => "Poor",
            Self::Good => "Good",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Intro,
    Practice,
    Main,
    Debrief,
    Complete,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Practice => "practice",
            Self::Main => "main",
            Self::Debrief => "debrief",
            Self::Complete => "complete",
        }
    }

    pub fn route(self) -> &'static str {
        match self {
            Self::Intro => "/",
            Self::Practice => "/practice",
            Self::Main => "/experiment",
            Self::Debrief => "/debrief",
            Self::Complete => "/complete",
        }
    }

    /// Practice, main and debrief need an active participant.
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Practice | Self::Main | Self::Debrief)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub control_var: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratings {
    pub clarity: i64,
    pub sufficiency: i64,
    pub predictive_capability: i64,
    pub actionability: i64,
    pub trustworthiness: i64,
    pub accountability: i64,
    pub satisfaction: i64,
}

impl Ratings {
    /// Column order of the persisted file.
    pub fn as_array(&self) -> [i64; 7] {
        [
            self.clarity,
            self.sufficiency,
            self.predictive_capability,
            self.actionability,
            self.trustworthiness,
            self.accountability,
            self.satisfaction,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialResponse {
    pub trial_idx: usize,
    #[serde(flatten)]
    pub ratings: Ratings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFiles {
    pub data_file: PathBuf,
    pub comment_file: Option<PathBuf>,
}
