use std::collections::BTreeSet;
use std::sync::Arc;

use studyflow::catalog::{TrialCatalog, MAIN_POOL_SIZE, TRIALS_PER_SESSION};
use studyflow::errors::StudyError;
use studyflow::flow::{
    validate_transition, ConsentForm, DebriefForm, FlowController, Notice, RatingForm, StepOutcome,
};
use studyflow::recorder::ResponseRecorder;
use studyflow::runtime::{FakeClock, FakeFileSystem, SeededRandom};
use studyflow::session::SessionState;
use studyflow::types::Phase;

fn controller(seed: u64) -> (FlowController, FakeFileSystem) {
    let fs = FakeFileSystem::default();
    let recorder = ResponseRecorder::new(
        "/data",
        Arc::new(fs.clone()),
        Arc::new(FakeClock::default()),
    );
    let flow = FlowController::new(
        TrialCatalog::standard(),
        recorder,
        Arc::new(SeededRandom::from_seed(seed)),
    );
    (flow, fs)
}

fn consent(id: &str) -> ConsentForm {
    ConsentForm {
        consent: Some("yes".to_string()),
        participant_id: Some(id.to_string()),
        control_var: Some("group-a".to_string()),
    }
}

fn full_ratings() -> RatingForm {
    RatingForm {
        clarity: Some("1".to_string()),
        sufficiency: Some("2".to_string()),
        predictive_capability: Some("3".to_string()),
        actionability: Some("4".to_string()),
        trustworthiness: Some("5".to_string()),
        accountability: Some("6".to_string()),
        satisfaction: Some("7".to_string()),
    }
}

fn consented(flow: &FlowController) -> SessionState {
    let mut state = SessionState::default();
    let outcome = flow.accept_consent(&mut state, &consent("P1")).expect("consent");
    assert_eq!(outcome, StepOutcome::Redirect(Phase::Practice));
    state
}

fn finish_practice(flow: &FlowController, state: &mut SessionState) {
    flow.submit_practice(state, &full_ratings()).expect("practice 1");
    flow.submit_practice(state, &full_ratings()).expect("practice 2");
    assert_eq!(state.phase(), Phase::Main);
}

#[test]
fn blank_participant_ids_never_create_a_session() {
    let (flow, _fs) = controller(1);
    for blank in ["", " ", "\t\n  "] {
        let mut state = SessionState::default();
        let outcome = flow
            .accept_consent(&mut state, &consent(blank))
            .expect("rejection renders");
        match outcome {
            StepOutcome::Render(view) => {
                assert_eq!(view.step, Phase::Intro);
                assert_eq!(view.notices, vec![Notice::ParticipantIdRequired.message()]);
            }
            other => panic!("expected render, got {other:?}"),
        }
        assert!(!state.has_participant());
        assert!(state.trial_order.is_empty());
    }
}

#[test]
fn consent_draws_sixteen_unique_main_trials() {
    for seed in 0..20 {
        let (flow, _fs) = controller(seed);
        let state = consented(&flow);
        assert_eq!(state.trial_order.len(), TRIALS_PER_SESSION);
        assert_eq!(state.current_trial, 0);
        assert!(state.trial_order.iter().all(|&idx| idx < MAIN_POOL_SIZE));
        let unique: BTreeSet<_> = state.trial_order.iter().collect();
        assert_eq!(unique.len(), TRIALS_PER_SESSION);
    }
}

#[test]
fn same_seed_gives_same_trial_order() {
    let (left, _) = controller(42);
    let (right, _) = controller(42);
    assert_eq!(consented(&left).trial_order, consented(&right).trial_order);
}

#[test]
fn any_missing_rating_leaves_cursor_unchanged() {
    let (flow, _fs) = controller(3);
    let mut state = consented(&flow);
    finish_practice(&flow, &mut state);

    let blankers: [fn(&mut RatingForm); 7] = [
        |f| f.clarity = None,
        |f| f.sufficiency = None,
        |f| f.predictive_capability = None,
        |f| f.actionability = None,
        |f| f.trustworthiness = None,
        |f| f.accountability = None,
        |f| f.satisfaction = Some("  ".to_string()),
    ];
    for blank in blankers {
        let mut form = full_ratings();
        blank(&mut form);
        let outcome = flow.submit_trial(&mut state, &form).expect("re-render");
        match outcome {
            StepOutcome::Render(view) => {
                assert_eq!(view.step, Phase::Main);
                assert_eq!(view.notices, vec![Notice::TrialIncomplete.message()]);
                assert_eq!(view.progress.map(|p| p.current), Some(1));
            }
            other => panic!("expected render, got {other:?}"),
        }
        assert_eq!(state.current_trial, 0);
        assert!(state.responses.is_empty());
    }
}

#[test]
fn sixteen_trials_reach_debrief_once_with_responses_in_order() {
    let (flow, _fs) = controller(8);
    let mut state = consented(&flow);
    finish_practice(&flow, &mut state);

    let mut debrief_redirects = 0;
    for _ in 0..TRIALS_PER_SESSION {
        if flow.submit_trial(&mut state, &full_ratings()).expect("trial")
            == StepOutcome::Redirect(Phase::Debrief)
        {
            debrief_redirects += 1;
        }
    }
    assert_eq!(debrief_redirects, 1);
    assert_eq!(state.phase(), Phase::Debrief);
    let answered: Vec<usize> = state.responses.iter().map(|r| r.trial_idx).collect();
    assert_eq!(answered, state.trial_order);

    let extra = flow.submit_trial(&mut state, &full_ratings()).expect("guarded");
    assert_eq!(extra, StepOutcome::Redirect(Phase::Debrief));
    assert_eq!(state.responses.len(), TRIALS_PER_SESSION);
}

#[test]
fn completion_is_idempotent() {
    let (flow, fs) = controller(9);
    let mut state = consented(&flow);
    finish_practice(&flow, &mut state);
    for _ in 0..TRIALS_PER_SESSION {
        flow.submit_trial(&mut state, &full_ratings()).expect("trial");
    }
    let done = flow
        .submit_debrief(
            &mut state,
            &DebriefForm {
                comment: Some("fine".to_string()),
            },
        )
        .expect("debrief");
    assert_eq!(done, StepOutcome::Redirect(Phase::Complete));

    let first = flow.show(&mut state, Phase::Complete).expect("complete");
    let second = flow.show(&mut state, Phase::Complete).expect("complete again");
    assert_eq!(first, second);
    assert_eq!(fs.file_paths().len(), 2);

    let StepOutcome::Render(view) = first else {
        panic!("complete must render");
    };
    assert!(view.data_file.is_some());
    assert!(view.comment_file.is_some());

    let resubmit = flow
        .submit_debrief(&mut state, &DebriefForm::default())
        .expect("guarded");
    assert_eq!(resubmit, StepOutcome::Redirect(Phase::Intro));
    assert_eq!(fs.file_paths().len(), 2);
}

#[test]
fn failed_write_keeps_the_participant_at_debrief() {
    let (flow, fs) = controller(10);
    let mut state = consented(&flow);
    finish_practice(&flow, &mut state);
    for _ in 0..TRIALS_PER_SESSION {
        flow.submit_trial(&mut state, &full_ratings()).expect("trial");
    }

    fs.set_fail_next(StudyError::Io("disk full".to_string()));
    let err = flow
        .submit_debrief(
            &mut state,
            &DebriefForm {
                comment: Some("late note".to_string()),
            },
        )
        .expect_err("write failure surfaces");
    assert!(matches!(err, StudyError::Io(_)));
    assert_eq!(state.phase(), Phase::Debrief);
    assert!(state.has_participant());
    assert_eq!(state.responses.len(), TRIALS_PER_SESSION);
    assert!(state.data_file.is_none());
    assert!(fs.file_paths().is_empty());

    let retry = flow
        .submit_debrief(&mut state, &DebriefForm::default())
        .expect("retry succeeds");
    assert_eq!(retry, StepOutcome::Redirect(Phase::Complete));
    assert_eq!(fs.file_paths().len(), 1);
}

#[test]
fn transition_table_matches_step_order() {
    assert!(validate_transition(Phase::Intro, Phase::Practice).is_ok());
    assert!(validate_transition(Phase::Practice, Phase::Main).is_ok());
    assert!(validate_transition(Phase::Main, Phase::Debrief).is_ok());
    assert!(validate_transition(Phase::Debrief, Phase::Complete).is_ok());
    assert!(validate_transition(Phase::Intro, Phase::Main).is_err());
    assert!(validate_transition(Phase::Complete, Phase::Intro).is_err());
}
