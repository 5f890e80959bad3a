mod common;

use common::{RIGHT, Reply, ScriptedEvaluator, WRONG, harness, id};
use learn_core::exercise::{ExerciseError, ExerciseStep, REVEAL_GUIDANCE, SubmitRejected};
use learn_core::model::{ChatRole, GENERIC_RETRY_FEEDBACK};
use services::ExerciseServiceError;
use storage::repository::{ProgressKey, ProgressRepository};

#[tokio::test]
async fn three_misses_reveal_then_tutor_and_completion() {
    let h = harness(ScriptedEvaluator::new([
        Reply::Text(WRONG),
        Reply::Text(WRONG),
        Reply::Text(WRONG),
    ]))
    .await;
    let exercises = h.app.exercises();
    let mut session = exercises.start(&id("reverse")).unwrap();

    for (n, draft) in ["one", "two", "three"].into_iter().enumerate() {
        session.edit_draft(draft);
        let step = exercises.submit(&mut session).await.unwrap();
        if n < 2 {
            assert!(matches!(step, ExerciseStep::Retry { .. }));
        } else {
            assert!(matches!(step, ExerciseStep::Revealed { .. }));
        }
    }

    assert!(session.is_revealed());
    assert_eq!(session.attempt_count(), 3);
    assert_eq!(session.guidance(), Some(&REVEAL_GUIDANCE));
    assert_eq!(session.transcript().map(<[_]>::len), Some(3));
    assert!(matches!(
        exercises.submission_gate(&session),
        Err(ExerciseServiceError::Rejected(SubmitRejected::Revealed))
    ));

    let reply = exercises.escalate(&session, None).await.unwrap();
    assert!(!reply.is_empty());
    {
        let seen = h.tutor.seen.lock().unwrap();
        let (context, history, _query) = &seen[0];
        assert!(context.contains("Reverse a string"));
        assert_eq!(history.len(), 6);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[0].content, "one");
    }

    let solved = exercises.finish(&mut session).await.unwrap();
    assert!(!solved);
    let stored = h
        .repo
        .load_progress(&ProgressKey::new("learner-1").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_completed(&id("reverse")));
}

#[tokio::test]
async fn correct_submission_resolves() {
    let h = harness(ScriptedEvaluator::new([Reply::Text(RIGHT)])).await;
    let exercises = h.app.exercises();
    let mut session = exercises.start(&id("reverse")).unwrap();

    session.edit_draft("s.chars().rev().collect()");
    let step = exercises.submit(&mut session).await.unwrap();
    assert_eq!(
        step,
        ExerciseStep::Resolved {
            feedback: "Well done.".into()
        }
    );
    assert!(session.is_resolved());
    assert_eq!(session.attempt_count(), 0);
    assert!(exercises.escalate(&session, None).await.is_err());
    assert!(exercises.finish(&mut session).await.unwrap());
}

#[tokio::test]
async fn evaluator_failure_counts_exactly_one_attempt() {
    let h = harness(ScriptedEvaluator::new([Reply::Fail])).await;
    let exercises = h.app.exercises();
    let mut session = exercises.start(&id("reverse")).unwrap();

    session.edit_draft("attempt");
    let step = exercises.submit(&mut session).await.unwrap();

    assert_eq!(
        step,
        ExerciseStep::Retry {
            attempt: 1,
            feedback: GENERIC_RETRY_FEEDBACK.into()
        }
    );
    assert_eq!(session.attempt_count(), 1);
    assert_eq!(h.evaluator.calls(), 1);
}

#[tokio::test]
async fn missing_configuration_disables_submission_without_attempts() {
    let h = harness(ScriptedEvaluator::unconfigured()).await;
    let exercises = h.app.exercises();
    let mut session = exercises.start(&id("reverse")).unwrap();

    session.edit_draft("attempt");
    assert!(!exercises.is_configured());
    assert!(matches!(
        exercises.submit(&mut session).await,
        Err(ExerciseServiceError::ConfigurationMissing)
    ));
    assert_eq!(session.attempt_count(), 0);
    assert!(!session.is_pending());
    assert_eq!(h.evaluator.calls(), 0);
}

#[tokio::test]
async fn second_submission_while_pending_is_rejected() {
    let h = harness(ScriptedEvaluator::new([Reply::Text(WRONG)])).await;
    let exercises = h.app.exercises();
    let mut session = exercises.start(&id("reverse")).unwrap();

    session.edit_draft("first");
    let ticket = exercises.begin(&mut session).unwrap();
    assert!(matches!(
        exercises.begin(&mut session),
        Err(ExerciseServiceError::Rejected(SubmitRejected::Pending))
    ));

    let receipt = exercises.evaluate(ticket).await.unwrap();
    exercises.apply(&mut session, receipt).unwrap();
    assert_eq!(session.attempt_count(), 1);
    assert_eq!(h.evaluator.calls(), 1);
}

#[tokio::test]
async fn result_arriving_after_reset_is_dropped() {
    let h = harness(ScriptedEvaluator::new([Reply::Text(WRONG)])).await;
    let exercises = h.app.exercises();
    let mut session = exercises.start(&id("reverse")).unwrap();

    session.edit_draft("first");
    let ticket = exercises.begin(&mut session).unwrap();
    exercises.reset(&mut session);

    let receipt = exercises.evaluate(ticket).await.unwrap();
    assert!(matches!(
        exercises.apply(&mut session, receipt),
        Err(ExerciseServiceError::Exercise(ExerciseError::StaleResult))
    ));
    assert_eq!(session.attempt_count(), 0);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn result_for_a_replaced_session_is_dropped() {
    let h = harness(ScriptedEvaluator::new([Reply::Text(RIGHT)])).await;
    let exercises = h.app.exercises();
    let mut old = exercises.start(&id("reverse")).unwrap();
    old.edit_draft("draft");
    let ticket = exercises.begin(&mut old).unwrap();

    let mut replacement = exercises.start(&id("reverse")).unwrap();
    let receipt = exercises.evaluate(ticket).await.unwrap();
    assert!(matches!(
        exercises.apply(&mut replacement, receipt),
        Err(ExerciseServiceError::Exercise(ExerciseError::StaleResult))
    ));
    assert!(!replacement.is_resolved());
}

#[tokio::test]
async fn locked_or_mistyped_lessons_cannot_start() {
    let h = harness(ScriptedEvaluator::default()).await;
    let exercises = h.app.exercises();
    assert!(matches!(
        exercises.start(&id("intro")),
        Err(ExerciseServiceError::Progress(_))
    ));
    assert!(matches!(
        exercises.start(&id("for-loops")),
        Err(ExerciseServiceError::Progress(_))
    ));
}

#[tokio::test]
async fn reset_after_reveal_reopens_submission_and_can_be_solved() {
    let h = harness(ScriptedEvaluator::new([
        Reply::Text(WRONG),
        Reply::Text(WRONG),
        Reply::Text(WRONG),
        Reply::Text(RIGHT),
    ]))
    .await;
    let exercises = h.app.exercises();
    let mut session = exercises.start(&id("reverse")).unwrap();
    for draft in ["one", "two", "three"] {
        session.edit_draft(draft);
        exercises.submit(&mut session).await.unwrap();
    }
    assert!(session.is_revealed());

    exercises.reset(&mut session);
    assert!(!session.is_revealed());
    assert_eq!(session.attempt_count(), 0);
    assert!(matches!(
        exercises.submission_gate(&session),
        Err(ExerciseServiceError::Rejected(SubmitRejected::EmptyDraft))
    ));

    session.edit_draft("fixed");
    assert!(exercises.submission_gate(&session).is_ok());
    let step = exercises.submit(&mut session).await.unwrap();
    assert!(matches!(step, ExerciseStep::Resolved { .. }));
    assert!(exercises.finish(&mut session).await.unwrap());
    assert!(h.app.progression().is_completed(&id("reverse")));
}
