//! End-to-end conversations through extraction, dialogue and rules.

use std::sync::Arc;

use super::*;
use crate::models::{AdaptationKind, CaseField, HeadacheCase, Onset, Profile, ProvenanceSource, Sex, Urgency};
use crate::pipeline::nlu::NluOrchestrator;
use crate::pipeline::vocabulary::Vocabulary;
use crate::rules::RuleEngine;

const MAX_TURNS: usize = 30;

fn engine() -> DialogueEngine {
    let vocabulary = Arc::new(Vocabulary::builtin().unwrap());
    DialogueEngine::new(NluOrchestrator::new(vocabulary), RuleEngine::builtin().unwrap())
}

/// Default replies: a mid score for scales, "no" for everything else.
fn deny_everything(question: &Question) -> String {
    match question.answer_kind {
        AnswerKind::Scale => "6".to_string(),
        _ => "no".to_string(),
    }
}

/// Run a conversation until completion, returning the questions asked and
/// the final outcome.
fn converse(
    engine: &DialogueEngine,
    session: &mut Session,
    first: &str,
    mut reply: impl FnMut(&Question) -> String,
) -> (Vec<CaseField>, TurnOutcome) {
    let mut outcome = engine.process_message(session, first).unwrap();
    let mut asked = Vec::new();
    for _ in 0..MAX_TURNS {
        let Some(question) = outcome.next_question.clone() else {
            return (asked, outcome);
        };
        asked.push(question.field);
        outcome = engine.process_message(session, &reply(&question)).unwrap();
    }
    panic!("dialogue did not complete in {MAX_TURNS} turns, asked {asked:?}");
}

#[test]
fn pregnant_thunderclap_gets_non_ionizing_emergency_imaging() {
    let engine = engine();
    let mut session = Session::new();
    let first = engine
        .process_message(&mut session, "female 28, pregnant 8 weeks, thunderclap headache since 2 hours")
        .unwrap();

    let case = &first.updated_case;
    assert_eq!(case.age, Some(28));
    assert_eq!(case.sex, Some(Sex::Female));
    assert_eq!(case.pregnancy_trimester, Some(1));
    assert_eq!(case.onset, Some(Onset::Thunderclap));
    assert_eq!(case.duration_hours, Some(2.0));
    assert!(!first.dialogue_complete);

    let (_, outcome) = converse(&engine, &mut session, "no", deny_everything);
    let recommendation = outcome.recommendation.expect("complete dialogue has a recommendation");
    assert_eq!(recommendation.rule_id, "HSA_001");
    assert_eq!(recommendation.urgency, Urgency::Immediate);
    assert!(recommendation.imaging.iter().all(|id| !id.starts_with("ct_")), "{:?}", recommendation.imaging);
    assert!(recommendation.has_adaptation(AdaptationKind::NonIonizingSubstitution));
    assert!(recommendation.has_adaptation(AdaptationKind::GadoliniumAvoidance));
}

#[test]
fn meningeal_presentation_asks_onset_then_selects_meningitis_rule() {
    let engine = engine();
    let mut session = Session::new();
    let first = engine
        .process_message(&mut session, "patient with fever and neck stiffness")
        .unwrap();
    assert_eq!(first.updated_case.fever, Some(true));
    assert_eq!(first.updated_case.meningeal_signs, Some(true));
    assert!(!first.dialogue_complete);
    assert_eq!(first.next_question.as_ref().map(|q| q.field), Some(CaseField::Onset));

    let mut outcome = engine.process_message(&mut session, "no").unwrap();
    assert_eq!(outcome.updated_case.onset, None);
    assert!(session.was_asked(CaseField::Onset));
    while let Some(question) = outcome.next_question.clone() {
        assert_ne!(question.field, CaseField::Onset, "onset asked twice");
        outcome = engine.process_message(&mut session, &deny_everything(&question)).unwrap();
    }

    assert!(outcome.dialogue_complete);
    assert_eq!(outcome.updated_case.onset, None);
    let recommendation = outcome.recommendation.unwrap();
    assert_eq!(recommendation.rule_id, "MNG_001");
    assert_eq!(recommendation.urgency, Urgency::Urgent);
}

#[test]
fn unresolved_seizure_never_triggers_seizure_rule() {
    let engine = engine();
    let mut session = Session::new();
    let (asked, outcome) = converse(
        &engine,
        &mut session,
        "progressive headache for 3 weeks, no fever, no neck stiffness, pain 5/10, no projectile vomiting, no weakness on one side",
        |question| match question.field {
            CaseField::Seizure => "I don't know".to_string(),
            _ => deny_everything(question),
        },
    );
    assert!(asked.contains(&CaseField::Seizure));
    assert_eq!(outcome.updated_case.seizure, None);
    assert_eq!(outcome.updated_case.profile, Some(Profile::Subacute));

    let trace = engine.rules().explain(&outcome.updated_case).unwrap();
    assert!(!trace.matching_rules.iter().any(|id| id == "FOCAL_001"));
    assert_eq!(trace.selected, "SUBACUTE_PROGRESSIVE_001");
}

#[test]
fn overlapping_rules_resolve_by_priority() {
    let engine = engine();
    let case = HeadacheCase {
        fever: Some(true),
        meningeal_signs: Some(true),
        htic_pattern: Some(true),
        ..Default::default()
    };
    let session = Session::from_snapshot(case);
    let trace = engine.rules().explain(&session.case).unwrap();
    assert_eq!(trace.matching_rules, vec!["MNG_001", "HTIC_001"]);
    assert_eq!(trace.selected, "MNG_001");
}

#[test]
fn answers_one_by_one_equal_a_single_message() {
    let engine = engine();

    let mut single = Session::new();
    let all_at_once = engine
        .process_message(
            &mut single,
            "thunderclap headache with fever, no neck stiffness, pain 7/10, no projectile vomiting, \
             no weakness on one side, no seizure",
        )
        .unwrap();
    assert!(all_at_once.dialogue_complete, "asked {:?}", all_at_once.next_question);

    let mut stepwise = Session::new();
    let (_, step_by_step) = converse(&engine, &mut stepwise, "headache", |question| {
        match question.field {
            CaseField::Onset | CaseField::Fever => "yes",
            CaseField::Intensity => "7",
            _ => "no",
        }
        .to_string()
    });

    assert_eq!(all_at_once.updated_case.known_values(), step_by_step.updated_case.known_values());
    assert_eq!(
        all_at_once.recommendation.map(|r| r.rule_id),
        step_by_step.recommendation.map(|r| r.rule_id)
    );
}

#[test]
fn answered_field_survives_later_mentions() {
    let engine = engine();
    let mut session = Session::new();
    engine.process_message(&mut session, "headache").unwrap();
    engine.process_message(&mut session, "no").unwrap();
    assert_eq!(session.last_asked, Some(CaseField::Fever));
    engine.process_message(&mut session, "no").unwrap();
    assert_eq!(session.case.fever, Some(false));

    let outcome = engine
        .process_message(&mut session, "no, although the nurse wrote down fever this morning")
        .unwrap();
    assert_eq!(outcome.updated_case.fever, Some(false));
    assert_eq!(
        outcome.updated_case.provenance_of(CaseField::Fever).map(|p| p.source),
        Some(ProvenanceSource::Answer)
    );
    assert!(outcome.metadata.kept_fields.contains(&CaseField::Fever));
}

#[test]
fn same_first_message_gives_same_turn() {
    let engine = engine();
    let text = "male 45, progressive headache for 2 weeks, worse in the morning, 6/10";
    let mut a = Session::new();
    let mut b = Session::new();
    let first = engine.process_message(&mut a, text).unwrap();
    let second = engine.process_message(&mut b, text).unwrap();
    assert_eq!(first.updated_case, second.updated_case);
    assert_eq!(first.next_question, second.next_question);
    assert_eq!(first.metadata, second.metadata);
}

#[test]
fn pregnancy_is_not_asked_for_men() {
    let engine = engine();
    let mut session = Session::new();
    let (asked, outcome) = converse(&engine, &mut session, "man aged 40 with a headache", |question| {
        match question.field {
            CaseField::Onset => "I don't know".to_string(),
            _ => deny_everything(question),
        }
    });
    assert_eq!(outcome.updated_case.sex, Some(Sex::Male));
    assert!(!asked.contains(&CaseField::PregnancyPostpartum));
    assert!(asked.contains(&CaseField::Trauma));
}

#[tokio::test]
async fn registry_turns_are_serialized_per_session() {
    let registry = Arc::new(SessionRegistry::new());
    let engine = Arc::new(engine());
    let (id, _) = registry.create(None).await;

    let mut tasks = Vec::new();
    for message in ["headache", "no", "no"] {
        let registry = Arc::clone(&registry);
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            let handle = registry.get(id).await.unwrap();
            let mut session = handle.lock().await;
            engine.process_message(&mut session, message).map(|o| o.dialogue_complete)
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let handle = registry.get(id).await.unwrap();
    let session = handle.lock().await;
    assert_eq!(session.history.iter().filter(|u| u.role == crate::models::Role::User).count(), 3);
    let mut asked = session.asked_fields.clone();
    asked.dedup();
    assert_eq!(asked.len(), session.asked_fields.len());
}

#[test]
fn findings_in_a_short_reply_are_not_lost() {
    let engine = engine();

    let mut session = Session::new();
    engine.process_message(&mut session, "headache").unwrap();
    engine.process_message(&mut session, "no").unwrap();
    assert_eq!(session.last_asked, Some(CaseField::Fever));
    let outcome = engine.process_message(&mut session, "no, stiff neck").unwrap();
    assert_eq!(outcome.updated_case.fever, Some(false));
    assert_eq!(outcome.updated_case.meningeal_signs, Some(true));

    let mut session = Session::new();
    engine.process_message(&mut session, "headache").unwrap();
    assert_eq!(session.last_asked, Some(CaseField::Onset));
    let outcome = engine.process_message(&mut session, "no fever, seizure").unwrap();
    assert_eq!(outcome.updated_case.onset, None);
    assert_eq!(outcome.updated_case.fever, Some(false));
    assert_eq!(outcome.updated_case.seizure, Some(true));
    assert!(outcome.updated_case.red_flags().contains(&CaseField::Seizure));
}

#[test]
fn form_style_negative_is_read_as_absent() {
    let engine = engine();
    let mut session = Session::new();
    let outcome = engine.process_message(&mut session, "headache. fever: no").unwrap();
    assert_eq!(outcome.updated_case.fever, Some(false));
    assert_ne!(outcome.next_question.map(|q| q.field), Some(CaseField::Fever));
}

#[test]
fn arteritis_signs_in_older_patient_select_arteritis_rule() {
    let engine = engine();
    let mut session = Session::new();
    let (asked, outcome) = converse(
        &engine,
        &mut session,
        "74-year-old woman, headache for 2 weeks, pain when chewing",
        deny_everything,
    );
    assert_eq!(outcome.updated_case.age, Some(74));
    assert_eq!(outcome.updated_case.horton_criteria, Some(true));
    assert!(!asked.contains(&CaseField::HortonCriteria));
    let recommendation = outcome.recommendation.unwrap();
    assert_eq!(recommendation.rule_id, "HORTON_001");
    assert_eq!(recommendation.urgency, Urgency::Urgent);
}

#[test]
fn vision_loss_answer_makes_the_case_an_emergency() {
    let engine = engine();
    let mut session = Session::from_snapshot(HeadacheCase {
        age: Some(40),
        sex: Some(Sex::Male),
        onset: Some(Onset::Progressive),
        profile: Some(Profile::Acute),
        fever: Some(false),
        meningeal_signs: Some(false),
        intensity: Some(5),
        htic_pattern: Some(false),
        neuro_deficit: Some(false),
        ..Default::default()
    });
    let (asked, outcome) = converse(&engine, &mut session, "headache", |question| match question.field {
        CaseField::Seizure => "I don't know".to_string(),
        CaseField::VisualDisturbance => "he cannot see anything from his left eye".to_string(),
        _ => deny_everything(question),
    });
    assert!(!asked.contains(&CaseField::HortonCriteria));
    assert!(asked.contains(&CaseField::VisualDisturbance));
    assert_eq!(
        outcome.updated_case.visual_disturbance_type,
        Some(crate::models::VisualDisturbance::Blindness)
    );
    let recommendation = outcome.recommendation.unwrap();
    assert_eq!(recommendation.rule_id, "VISUAL_LOSS_001");
    assert_eq!(recommendation.urgency, Urgency::Immediate);
}
