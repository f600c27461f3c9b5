use std::sync::Arc;

use serde::Serialize;

use crate::models::{HeadacheCase, Recommendation, RecommendationSource};

use super::adaptation::{adapt, AdaptationSettings};
use super::types::{Rule, RuleRecommendation, RuleSet};
use super::{DecisionError, RuleConfigError};

/// Why a recommendation was produced, for audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionTrace {
    /// Id of the selected rule, or `fallback_<profile>`.
    pub selected: String,
    pub source: RecommendationSource,
    /// Every rule the case satisfied, in evaluation order.
    pub matching_rules: Vec<String>,
    pub recommendation: Recommendation,
}

/// Evaluates a case against a rule set. Rules are tried in priority order
/// and the first full match wins; the outcome depends only on the case.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Arc<RuleSet>,
    settings: AdaptationSettings,
}

impl RuleEngine {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            rules,
            settings: AdaptationSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AdaptationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn builtin() -> Result<Self, RuleConfigError> {
        Ok(Self::new(Arc::new(RuleSet::builtin()?)))
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    pub fn settings(&self) -> &AdaptationSettings {
        &self.settings
    }

    /// Highest-priority rule the case satisfies.
    pub fn select(&self, case: &HeadacheCase) -> Option<&Rule> {
        self.rules.rules().iter().find(|rule| rule.matches(case))
    }

    pub fn matching_rules(&self, case: &HeadacheCase) -> Vec<&str> {
        self.rules
            .rules()
            .iter()
            .filter(|rule| rule.matches(case))
            .map(|rule| rule.id.as_str())
            .collect()
    }

    pub fn decide(&self, case: &HeadacheCase) -> Result<Recommendation, DecisionError> {
        let (rule_id, source, base) = match self.select(case) {
            Some(rule) => (rule.id.clone(), RecommendationSource::Rule, &rule.recommendation),
            None => {
                let profile = case.profile.map_or("unknown", |p| p.as_str());
                let base = self
                    .rules
                    .fallbacks()
                    .for_profile(case.profile)
                    .ok_or_else(|| {
                        tracing::error!(profile, "No rule and no profile fallback");
                        DecisionError::NoMatchingRule {
                            profile: profile.to_string(),
                        }
                    })?;
                (format!("fallback_{profile}"), RecommendationSource::ProfileFallback, base)
            }
        };

        let mut recommendation = instantiate(rule_id, source, base);
        adapt(&mut recommendation, case, &self.rules, &self.settings);

        tracing::info!(
            rule_id = %recommendation.rule_id,
            source = ?recommendation.source,
            urgency = %recommendation.urgency,
            imaging = recommendation.imaging.len(),
            adaptations = recommendation.adaptations.len(),
            "Recommendation produced"
        );
        Ok(recommendation)
    }

    pub fn explain(&self, case: &HeadacheCase) -> Result<DecisionTrace, DecisionError> {
        let recommendation = self.decide(case)?;
        Ok(DecisionTrace {
            selected: recommendation.rule_id.clone(),
            source: recommendation.source,
            matching_rules: self.matching_rules(case).into_iter().map(str::to_string).collect(),
            recommendation,
        })
    }
}

fn instantiate(rule_id: String, source: RecommendationSource, base: &RuleRecommendation) -> Recommendation {
    Recommendation {
        rule_id,
        source,
        imaging: base.imaging.clone(),
        urgency: base.urgency,
        rationale: base.rationale.clone(),
        adaptations: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AdaptationKind, CaseField, FieldProvenance, FieldValue, Onset, Profile, ProvenanceSource, Sex, Urgency,
    };

    fn engine() -> RuleEngine {
        RuleEngine::builtin().unwrap()
    }

    fn extracted() -> FieldProvenance {
        FieldProvenance::new(ProvenanceSource::Extracted, 0.9)
    }

    fn case_of(fields: &[(CaseField, FieldValue)]) -> HeadacheCase {
        let mut case = HeadacheCase::new();
        for (field, value) in fields {
            case.set(*field, value.clone(), extracted()).unwrap();
        }
        case
    }

    fn synthetic(rules: &str) -> RuleEngine {
        let json = format!(
            r#"{{
                "version": "synthetic",
                "imaging_catalog": [
                    {{"id": "ct", "label": "CT", "ionizing": true, "contrast": "none", "non_ionizing_equivalent": "mri"}},
                    {{"id": "mri", "label": "MRI", "ionizing": false, "contrast": "none"}}
                ],
                "rules": {rules}
            }}"#
        );
        RuleEngine::new(Arc::new(RuleSet::from_json(&json).unwrap()))
    }

    #[test]
    fn thunderclap_in_first_trimester_uses_non_ionizing_imaging() {
        let case = case_of(&[
            (CaseField::Age, FieldValue::Number(28.0)),
            (CaseField::Sex, FieldValue::Text("female".into())),
            (CaseField::PregnancyPostpartum, FieldValue::Bool(true)),
            (CaseField::PregnancyTrimester, FieldValue::Number(1.0)),
            (CaseField::Onset, FieldValue::Text("thunderclap".into())),
            (CaseField::DurationHours, FieldValue::Number(2.0)),
        ]);
        let rec = engine().decide(&case).unwrap();
        assert_eq!(rec.rule_id, "HSA_001");
        assert_eq!(rec.source, RecommendationSource::Rule);
        assert_eq!(rec.urgency, Urgency::Immediate);
        assert_eq!(rec.imaging, vec!["mri_brain", "mr_angiography", "mr_venography"]);
        assert!(rec.has_adaptation(AdaptationKind::NonIonizingSubstitution));
        assert!(rec.has_adaptation(AdaptationKind::GadoliniumAvoidance));
        assert!(!rec.has_adaptation(AdaptationKind::PregnancyTest));
    }

    #[test]
    fn meningitis_rule_ignores_unknown_onset() {
        let case = case_of(&[
            (CaseField::Fever, FieldValue::Bool(true)),
            (CaseField::MeningealSigns, FieldValue::Bool(true)),
        ]);
        let rec = engine().decide(&case).unwrap();
        assert_eq!(rec.rule_id, "MNG_001");
        assert_eq!(rec.urgency, Urgency::Urgent);
    }

    #[test]
    fn unknown_field_does_not_satisfy_a_condition() {
        let engine = synthetic(
            r#"[{"id": "SEIZURE", "priority": 10, "logic": "all", "conditions": {"seizure": true},
                 "recommendation": {"imaging": ["ct"], "urgency": "immediate", "rationale": "seizure"}}]"#,
        );
        let case = case_of(&[(CaseField::Fever, FieldValue::Bool(false))]);
        assert!(engine.select(&case).is_none());
        assert!(matches!(
            engine.decide(&case),
            Err(DecisionError::NoMatchingRule { profile }) if profile == "unknown"
        ));
    }

    #[test]
    fn higher_priority_rule_wins_overlap() {
        let engine = synthetic(
            r#"[{"id": "LOW", "priority": 10, "logic": "all", "conditions": {"fever": true},
                 "recommendation": {"imaging": ["mri"], "urgency": "delayed", "rationale": "low"}},
                {"id": "HIGH", "priority": 20, "logic": "all", "conditions": {"fever": true},
                 "recommendation": {"imaging": ["ct"], "urgency": "urgent", "rationale": "high"}}]"#,
        );
        let case = case_of(&[(CaseField::Fever, FieldValue::Bool(true))]);
        let trace = engine.explain(&case).unwrap();
        assert_eq!(trace.selected, "HIGH");
        assert_eq!(trace.matching_rules, vec!["HIGH", "LOW"]);
        assert_eq!(trace.recommendation.imaging, vec!["ct"]);
    }

    #[test]
    fn equal_priority_breaks_ties_by_id() {
        let engine = synthetic(
            r#"[{"id": "ZETA", "priority": 5, "logic": "any", "conditions": {"trauma": true},
                 "recommendation": {"imaging": [], "urgency": "none", "rationale": "z"}},
                {"id": "ALPHA", "priority": 5, "logic": "any", "conditions": {"trauma": true},
                 "recommendation": {"imaging": [], "urgency": "none", "rationale": "a"}}]"#,
        );
        let case = case_of(&[(CaseField::Trauma, FieldValue::Bool(true))]);
        for _ in 0..3 {
            assert_eq!(engine.select(&case).map(|r| r.id.as_str()), Some("ALPHA"));
        }
    }

    #[test]
    fn profile_fallback_when_no_rule_matches() {
        let mut case = HeadacheCase::new();
        case.profile = Some(Profile::Subacute);
        case.provenance.insert(CaseField::Profile, extracted());
        let rec = engine().decide(&case).unwrap();
        assert_eq!(rec.rule_id, "fallback_subacute");
        assert_eq!(rec.source, RecommendationSource::ProfileFallback);
        assert_eq!(rec.imaging, vec!["mri_brain"]);

        let rec = engine().decide(&HeadacheCase::new()).unwrap();
        assert_eq!(rec.rule_id, "fallback_unknown");
    }

    #[test]
    fn fallback_recommendation_is_adapted_too() {
        let case = case_of(&[
            (CaseField::Age, FieldValue::Number(34.0)),
            (CaseField::Sex, FieldValue::Text(Sex::Female.as_str().into())),
        ]);
        let rec = engine().decide(&case).unwrap();
        assert_eq!(rec.rule_id, "fallback_unknown");
        assert!(rec.has_adaptation(AdaptationKind::PregnancyTest));
    }

    #[test]
    fn immunosuppression_escalates_selected_rule() {
        let case = case_of(&[
            (CaseField::Fever, FieldValue::Bool(true)),
            (CaseField::MeningealSigns, FieldValue::Bool(true)),
            (CaseField::Immunosuppression, FieldValue::Bool(true)),
        ]);
        let rec = engine().decide(&case).unwrap();
        assert_eq!(rec.rule_id, "MNG_001");
        assert_eq!(rec.urgency, Urgency::Immediate);
        assert!(rec.has_adaptation(AdaptationKind::UrgencyEscalation));
    }

    #[test]
    fn stable_chronic_headache_needs_no_imaging() {
        let case = case_of(&[
            (CaseField::Profile, FieldValue::Text("chronic".into())),
            (CaseField::RecentPatternChange, FieldValue::Bool(false)),
        ]);
        let rec = engine().decide(&case).unwrap();
        assert_eq!(rec.rule_id, "CHRONIC_STABLE_001");
        assert!(!rec.requires_imaging());
        assert_eq!(rec.urgency, Urgency::None);
    }

    #[test]
    fn age_bound_is_applied() {
        let older = case_of(&[
            (CaseField::Age, FieldValue::Number(67.0)),
            (CaseField::Profile, FieldValue::Text("acute".into())),
        ]);
        assert_eq!(engine().decide(&older).unwrap().rule_id, "AGE_NEW_001");

        let younger = case_of(&[
            (CaseField::Age, FieldValue::Number(35.0)),
            (CaseField::Profile, FieldValue::Text("acute".into())),
        ]);
        assert_eq!(engine().decide(&younger).unwrap().rule_id, "fallback_acute");
    }

    #[test]
    fn arteritis_signs_only_count_from_fifty() {
        let older = case_of(&[
            (CaseField::Age, FieldValue::Number(72.0)),
            (CaseField::HortonCriteria, FieldValue::Bool(true)),
            (CaseField::Profile, FieldValue::Text("subacute".into())),
        ]);
        let rec = engine().decide(&older).unwrap();
        assert_eq!(rec.rule_id, "HORTON_001");
        assert_eq!(rec.urgency, Urgency::Urgent);
        assert!(!rec.requires_imaging());

        let younger = case_of(&[
            (CaseField::Age, FieldValue::Number(38.0)),
            (CaseField::HortonCriteria, FieldValue::Bool(true)),
            (CaseField::Profile, FieldValue::Text("subacute".into())),
        ]);
        assert_eq!(engine().decide(&younger).unwrap().rule_id, "fallback_subacute");
    }

    #[test]
    fn vision_loss_is_immediate() {
        let case = case_of(&[
            (CaseField::Age, FieldValue::Number(72.0)),
            (CaseField::HortonCriteria, FieldValue::Bool(true)),
            (CaseField::VisualDisturbance, FieldValue::Text("blindness".into())),
        ]);
        let trace = engine().explain(&case).unwrap();
        assert_eq!(trace.selected, "VISUAL_LOSS_001");
        assert_eq!(trace.matching_rules, vec!["VISUAL_LOSS_001", "HORTON_001"]);
        assert_eq!(trace.recommendation.urgency, Urgency::Immediate);

        let blur = case_of(&[(CaseField::VisualDisturbance, FieldValue::Text("blur".into()))]);
        assert_eq!(engine().decide(&blur).unwrap().rule_id, "fallback_unknown");
    }

    #[test]
    fn decision_is_deterministic() {
        let mut case = case_of(&[(CaseField::NeuroDeficit, FieldValue::Bool(true))]);
        case.onset = Some(Onset::Progressive);
        case.provenance.insert(CaseField::Onset, extracted());
        let first = engine().explain(&case).unwrap();
        let second = engine().explain(&case).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.selected, "FOCAL_001");
    }
}
