use crate::catalog::{Trial, TrialCatalog, TRIALS_PER_SESSION};
use crate::errors::StudyError;
use crate::logging::append_run_log;
use crate::recorder::ResponseRecorder;
use crate::runtime::RandomSource;
use crate::session::SessionState;
use crate::types::{Participant, Phase, Ratings, TrialResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

pub const CONSENT_AFFIRMATION: &str = "yes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    ConsentRequired,
    ParticipantIdRequired,
    PracticeIncomplete,
    TrialIncomplete,
    SessionExpired,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Self::ConsentRequired => "Please check the consent box to continue.",
            Self::ParticipantIdRequired => "Please enter your participant ID or alias.",
            Self::PracticeIncomplete => {
                "Please complete all ratings in the practice trials to continue."
            }
            Self::TrialIncomplete => "Please rate all items before moving on.",
            Self::SessionExpired => "Session expired. Please restart the study.",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConsentForm {
    pub consent: Option<String>,
    pub participant_id: Option<String>,
    pub control_var: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RatingForm {
    pub clarity: Option<String>,
    pub sufficiency: Option<String>,
    pub predictive_capability: Option<String>,
    pub actionability: Option<String>,
    pub trustworthiness: Option<String>,
    pub accountability: Option<String>,
    pub satisfaction: Option<String>,
}

impl RatingForm {
    /// All seven ratings, or `None` if any field is missing or not an integer.
    pub fn complete(&self) -> Option<Ratings> {
        Some(Ratings {
            clarity: parse_rating(&self.clarity)?,
            sufficiency: parse_rating(&self.sufficiency)?,
            predictive_capability: parse_rating(&self.predictive_capability)?,
            actionability: parse_rating(&self.actionability)?,
            trustworthiness: parse_rating(&self.trustworthiness)?,
            accountability: parse_rating(&self.accountability)?,
            satisfaction: parse_rating(&self.satisfaction)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DebriefForm {
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialView {
    pub id: &'static str,
    pub description: &'static str,
    pub ai_decision: &'static str,
    pub ground_truth: &'static str,
    pub explanation: &'static str,
}

impl From<&Trial> for TrialView {
    fn from(trial: &Trial) -> Self {
        Self {
            id: trial.id,
            description: trial.description,
            ai_decision: trial.ai_decision,
            ground_truth: trial.ground_truth,
            explanation: trial.explanation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// What the front-end needs to draw one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub step: Phase,
    pub notices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial: Option<TrialView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_file: Option<PathBuf>,
}

impl StepView {
    fn bare(step: Phase, notices: Vec<String>) -> Self {
        Self {
            step,
            notices,
            trial: None,
            progress: None,
            data_file: None,
            comment_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Render(StepView),
    Redirect(Phase),
}

pub struct FlowController {
    catalog: TrialCatalog,
    recorder: ResponseRecorder,
    random: Arc<dyn RandomSource>,
}

impl FlowController {
    pub fn new(
        catalog: TrialCatalog,
        recorder: ResponseRecorder,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            catalog,
            recorder,
            random,
        }
    }

    /// Handles a GET of `requested`.
    pub fn show(
        &self,
        state: &mut SessionState,
        requested: Phase,
    ) -> Result<StepOutcome, StudyError> {
        if let Some(redirect) = self.guard(state, requested) {
            return Ok(redirect);
        }
        self.render(state, requested).map(StepOutcome::Render)
    }

    pub fn accept_consent(
        &self,
        state: &mut SessionState,
        form: &ConsentForm,
    ) -> Result<StepOutcome, StudyError> {
        if form.consent.as_deref() != Some(CONSENT_AFFIRMATION) {
            return self.reject(state, Phase::Intro, Notice::ConsentRequired);
        }
        let participant_id = trimmed(&form.participant_id);
        if participant_id.is_empty() {
            return self.reject(state, Phase::Intro, Notice::ParticipantIdRequired);
        }

        let mut order = self
            .random
            .sample_indices(self.catalog.main.len(), TRIALS_PER_SESSION);
        self.random.shuffle(&mut order);

        validate_transition(Phase::Intro, Phase::Practice)?;
        state.begin(
            Participant {
                id: participant_id,
                control_var: trimmed(&form.control_var),
            },
            order,
        );
        append_run_log(
            "info",
            "flow.consent.accepted",
            json!({
                "participant_id": state.participant.as_ref().map(|p| p.id.as_str()),
                "trial_order": state.trial_order,
            }),
        );
        Ok(StepOutcome::Redirect(Phase::Practice))
    }

    pub fn submit_practice(
        &self,
        state: &mut SessionState,
        form: &RatingForm,
    ) -> Result<StepOutcome, StudyError> {
        if let Some(redirect) = self.guard(state, Phase::Practice) {
            return Ok(redirect);
        }
        if form.complete().is_none() {
            return self.reject(state, Phase::Practice, Notice::PracticeIncomplete);
        }

        state.practice_index += 1;
        let next = state.phase();
        validate_transition(Phase::Practice, next)?;
        append_run_log(
            "info",
            "flow.practice.advanced",
            json!({
                "participant_id": participant_id(state),
                "practice_index": state.practice_index,
                "next": next.as_str(),
            }),
        );
        Ok(StepOutcome::Redirect(next))
    }

    pub fn submit_trial(
        &self,
        state: &mut SessionState,
        form: &RatingForm,
    ) -> Result<StepOutcome, StudyError> {
        if let Some(redirect) = self.guard(state, Phase::Main) {
            return Ok(redirect);
        }
        let Some(ratings) = form.complete() else {
            return self.reject(state, Phase::Main, Notice::TrialIncomplete);
        };

        let trial_idx = self.current_main_index(state)?;
        state.responses.push(TrialResponse { trial_idx, ratings });
        state.current_trial += 1;
        let next = state.phase();
        validate_transition(Phase::Main, next)?;
        append_run_log(
            "info",
            "flow.trial.recorded",
            json!({
                "participant_id": participant_id(state),
                "trial_idx": trial_idx,
                "trial_number": state.current_trial,
                "next": next.as_str(),
            }),
        );
        Ok(StepOutcome::Redirect(next))
    }

    pub fn submit_debrief(
        &self,
        state: &mut SessionState,
        form: &DebriefForm,
    ) -> Result<StepOutcome, StudyError> {
        if let Some(redirect) = self.guard(state, Phase::Debrief) {
            return Ok(redirect);
        }
        validate_transition(Phase::Debrief, Phase::Complete)?;

        let comment = trimmed(&form.comment);
        state.debrief_comment = Some(comment.clone());
        let recorded = self.recorder.record(
            &self.catalog,
            state.participant.as_ref(),
            &state.responses,
            &state.trial_order,
            &comment,
        )?;
        if let Some(files) = recorded {
            state.data_file = Some(files.data_file);
            state.comment_file = files.comment_file;
        }

        append_run_log(
            "info",
            "flow.debrief.completed",
            json!({
                "participant_id": participant_id(state),
                "responses": state.responses.len(),
                "data_file": state.data_file.as_ref().map(|p| p.display().to_string()),
            }),
        );
        state.finish();
        Ok(StepOutcome::Redirect(Phase::Complete))
    }

    /// Redirect for a request the session cannot serve, if any.
    fn guard(&self, state: &mut SessionState, requested: Phase) -> Option<StepOutcome> {
        if !requested.is_protected() {
            return None;
        }
        if !state.has_participant() {
            state.push_notice(Notice::SessionExpired.message());
            append_run_log(
                "warn",
                "flow.session.expired",
                json!({ "requested": requested.as_str() }),
            );
            return Some(StepOutcome::Redirect(Phase::Intro));
        }
        let current = state.phase();
        if current != requested {
            append_run_log(
                "debug",
                "flow.redirect.out_of_order",
                json!({
                    "requested": requested.as_str(),
                    "current": current.as_str(),
                }),
            );
            return Some(StepOutcome::Redirect(current));
        }
        None
    }

    fn reject(
        &self,
        state: &mut SessionState,
        phase: Phase,
        notice: Notice,
    ) -> Result<StepOutcome, StudyError> {
        append_run_log(
            "info",
            "flow.step.rejected",
            json!({
                "phase": phase.as_str(),
                "notice": notice.message(),
            }),
        );
        state.push_notice(notice.message());
        self.render(state, phase).map(StepOutcome::Render)
    }

    fn render(&self, state: &mut SessionState, phase: Phase) -> Result<StepView, StudyError> {
        let mut view = StepView::bare(phase, state.take_notices());
        match phase {
            Phase::Intro | Phase::Debrief => {}
            Phase::Practice => {
                let trial = self
                    .catalog
                    .practice_trial(state.practice_index)
                    .ok_or_else(|| {
                        StudyError::Catalog(format!(
                            "practice index {} outside practice set",
                            state.practice_index
                        ))
                    })?;
                view.trial = Some(TrialView::from(trial));
                view.progress = Some(Progress {
                    current: state.practice_index + 1,
                    total: self.catalog.practice.len(),
                });
            }
            Phase::Main => {
                let trial = self.catalog.main_trial(self.current_main_index(state)?)?;
                view.trial = Some(TrialView::from(trial));
                view.progress = Some(Progress {
                    current: state.current_trial + 1,
                    total: state.trial_order.len(),
                });
            }
            Phase::Complete => {
                view.data_file = state.data_file.clone();
                view.comment_file = state.comment_file.clone();
            }
        }
        Ok(view)
    }

    fn current_main_index(&self, state: &SessionState) -> Result<usize, StudyError> {
        state
            .trial_order
            .get(state.current_trial)
            .copied()
            .ok_or_else(|| {
                StudyError::InvalidTransition(format!(
                    "trial cursor {} past trial order of {}",
                    state.current_trial,
                    state.trial_order.len()
                ))
            })
    }
}

pub fn validate_transition(from: Phase, to: Phase) -> Result<(), StudyError> {
    use Phase as P;

    let allowed = match from {
        P::Intro => matches!(to, P::Practice),
        P::Practice => matches!(to, P::Practice | P::Main),
        P::Main => matches!(to, P::Main | P::Debrief),
        P::Debrief => matches!(to, P::Complete),
        P::Complete => false,
    };

    if !allowed {
        return Err(StudyError::InvalidTransition(format!(
            "illegal transition: {:?} -> {:?}",
            from, to
        )));
    }
    Ok(())
}

fn parse_rating(value: &Option<String>) -> Option<i64> {
    let value = value.as_deref()?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse().ok()
}

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().unwrap_or_default().trim().to_string()
}

fn participant_id(state: &SessionState) -> Option<&str> {
    state.participant.as_ref().map(|p| p.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{FakeClock, FakeFileSystem, SeededRandom};

    fn controller() -> FlowController {
        FlowController::new(
            TrialCatalog::standard(),
            ResponseRecorder::new(
                "/data",
                Arc::new(FakeFileSystem::default()),
                Arc::new(FakeClock::default()),
            ),
            Arc::new(SeededRandom::from_seed(11)),
        )
    }

    fn full_ratings() -> RatingForm {
        RatingForm {
            clarity: Some("4".to_string()),
            sufficiency: Some("5".to_string()),
            predictive_capability: Some("3".to_string()),
            actionability: Some("2".to_string()),
            trustworthiness: Some("6".to_string()),
            accountability: Some("1".to_string()),
            satisfaction: Some("7".to_string()),
        }
    }

    #[test]
    fn transition_validator_rejects_skipping_phases() {
        let err = validate_transition(Phase::Intro, Phase::Debrief).expect_err("must reject");
        assert!(
            matches!(err, StudyError::InvalidTransition(message) if message.contains("illegal transition"))
        );
        assert!(validate_transition(Phase::Complete, Phase::Intro).is_err());
        assert!(validate_transition(Phase::Main, Phase::Debrief).is_ok());
    }

    #[test]
    fn rating_form_requires_every_field_as_integer() {
        assert!(full_ratings().complete().is_some());

        let blank = RatingForm {
            actionability: Some("   ".to_string()),
            ..full_ratings()
        };
        assert!(blank.complete().is_none());

        let words = RatingForm {
            satisfaction: Some("seven".to_string()),
            ..full_ratings()
        };
        assert!(words.complete().is_none());

        let out_of_scale = RatingForm {
            clarity: Some("42".to_string()),
            ..full_ratings()
        };
        assert_eq!(out_of_scale.complete().map(|r| r.clarity), Some(42));
    }

    #[test]
    fn consent_checks_affirmation_before_identifier() {
        let flow = controller();
        let mut state = SessionState::default();
        let outcome = flow
            .accept_consent(
                &mut state,
                &ConsentForm {
                    consent: Some("no".to_string()),
                    participant_id: Some(String::new()),
                    control_var: None,
                },
            )
            .expect("rejected");
        let StepOutcome::Render(view) = outcome else {
            panic!("expected intro re-render");
        };
        assert_eq!(view.step, Phase::Intro);
        assert_eq!(view.notices, vec![Notice::ConsentRequired.message().to_string()]);
        assert!(state.participant.is_none());
    }

    #[test]
    fn consent_trims_identifier_and_control_variable() {
        let flow = controller();
        let mut state = SessionState::default();
        let outcome = flow
            .accept_consent(
                &mut state,
                &ConsentForm {
                    consent: Some("yes".to_string()),
                    participant_id: Some("  P7 ".to_string()),
                    control_var: Some(" evening ".to_string()),
                },
            )
            .expect("accepted");
        assert_eq!(outcome, StepOutcome::Redirect(Phase::Practice));
        assert_eq!(
            state.participant,
            Some(Participant {
                id: "P7".to_string(),
                control_var: "evening".to_string(),
            })
        );
    }

    #[test]
    fn practice_view_reports_step_progress() {
        let flow = controller();
        let mut state = SessionState::default();
        state.begin(
            Participant {
                id: "P1".to_string(),
                control_var: String::new(),
            },
            (0..TRIALS_PER_SESSION).collect(),
        );
        state.practice_index = 1;
        let StepOutcome::Render(view) = flow.show(&mut state, Phase::Practice).expect("show")
        else {
            panic!("expected render");
        };
        assert_eq!(view.progress, Some(Progress { current: 2, total: 2 }));
        assert_eq!(view.trial.map(|t| t.id), Some("PRAC_FN"));
    }

    #[test]
    fn out_of_order_request_redirects_to_current_phase() {
        let flow = controller();
        let mut state = SessionState::default();
        state.begin(
            Participant {
                id: "P1".to_string(),
                control_var: String::new(),
            },
            (0..TRIALS_PER_SESSION).collect(),
        );
        let outcome = flow
            .submit_debrief(&mut state, &DebriefForm::default())
            .expect("guarded");
        assert_eq!(outcome, StepOutcome::Redirect(Phase::Practice));
        assert!(state.notices.is_empty());
        assert!(state.participant.is_some());
    }

    #[test]
    fn complete_view_is_not_guarded() {
        let flow = controller();
        let mut state = SessionState::default();
        let StepOutcome::Render(view) = flow.show(&mut state, Phase::Complete).expect("show")
        else {
            panic!("expected render");
        };
        assert_eq!(view.step, Phase::Complete);
        assert!(view.data_file.is_none());
    }
}
