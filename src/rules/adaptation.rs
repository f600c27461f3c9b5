//! Contextual adaptation of the selected recommendation.
//!
//! Applied in a fixed order after selection, never changing which rule was
//! selected:
//!
//! 1. pregnancy: ionizing imaging replaced by its non-ionizing equivalent,
//!    venous imaging added, gadolinium avoided in the first trimester
//! 2. age: renal function check before contrast
//! 3. women of childbearing age: pregnancy test before ionizing imaging
//! 4. immunosuppression: urgency raised one level

use serde::{Deserialize, Serialize};

use crate::models::{AdaptationKind, AdaptationNote, HeadacheCase, Recommendation, Sex};

use super::types::RuleSet;

/// Catalog id of the venous imaging added for pregnant patients.
pub const VENOUS_IMAGING_ID: &str = "mr_venography";

/// Age thresholds used by the adaptations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationSettings {
    /// Above this age, contrast needs a renal function check.
    pub renal_precaution_age: u8,
    /// Below this age, women get a pregnancy test before ionizing imaging.
    pub pregnancy_test_age: u8,
}

impl Default for AdaptationSettings {
    fn default() -> Self {
        Self {
            renal_precaution_age: 60,
            pregnancy_test_age: 50,
        }
    }
}

/// Youngest age at which a pregnancy test is suggested.
const CHILDBEARING_MIN_AGE: u8 = 12;

fn note(recommendation: &mut Recommendation, kind: AdaptationKind, text: String) {
    tracing::debug!(rule_id = %recommendation.rule_id, adaptation = ?kind, "Adaptation applied");
    recommendation.adaptations.push(AdaptationNote { kind, note: text });
}

pub fn adapt(
    recommendation: &mut Recommendation,
    case: &HeadacheCase,
    catalog: &RuleSet,
    settings: &AdaptationSettings,
) {
    if case.is_pregnant() {
        adapt_for_pregnancy(recommendation, case, catalog);
    }
    adapt_for_age(recommendation, case, catalog, settings);
    adapt_for_childbearing_age(recommendation, case, catalog, settings);
    if case.immunosuppression == Some(true) {
        let before = recommendation.urgency;
        let after = before.escalated();
        if after != before {
            recommendation.urgency = after;
            note(
                recommendation,
                AdaptationKind::UrgencyEscalation,
                format!("Immunosuppressed patient: urgency raised from {before} to {after}"),
            );
        }
    }
}

fn adapt_for_pregnancy(recommendation: &mut Recommendation, case: &HeadacheCase, catalog: &RuleSet) {
    let mut substituted = Vec::new();
    let mut imaging: Vec<String> = Vec::with_capacity(recommendation.imaging.len());
    for id in &recommendation.imaging {
        let replacement = catalog
            .imaging(id)
            .filter(|m| m.ionizing)
            .and_then(|m| m.non_ionizing_equivalent.clone());
        let chosen = match replacement {
            Some(equivalent) => {
                substituted.push(format!("{id} -> {equivalent}"));
                equivalent
            }
            None => id.clone(),
        };
        if !imaging.contains(&chosen) {
            imaging.push(chosen);
        }
    }
    recommendation.imaging = imaging;
    if !substituted.is_empty() {
        let text = format!(
            "Pregnancy: ionizing imaging replaced by non-ionizing equivalent ({})",
            substituted.join(", ")
        );
        note(recommendation, AdaptationKind::NonIonizingSubstitution, text);
    }

    if !recommendation.requires_imaging() {
        return;
    }
    if catalog.imaging(VENOUS_IMAGING_ID).is_some()
        && !recommendation.imaging.iter().any(|id| id == VENOUS_IMAGING_ID)
    {
        recommendation.imaging.push(VENOUS_IMAGING_ID.to_string());
        note(
            recommendation,
            AdaptationKind::VenousImaging,
            "Pregnancy or postpartum: MR venography added to look for cerebral venous thrombosis".to_string(),
        );
    }
    if case.pregnancy_trimester == Some(1) {
        note(
            recommendation,
            AdaptationKind::GadoliniumAvoidance,
            "First trimester: avoid gadolinium contrast; perform MRI without injection".to_string(),
        );
    }
}

fn adapt_for_age(
    recommendation: &mut Recommendation,
    case: &HeadacheCase,
    catalog: &RuleSet,
    settings: &AdaptationSettings,
) {
    let Some(age) = case.age else {
        return;
    };
    let uses_contrast = recommendation
        .imaging
        .iter()
        .any(|id| catalog.imaging(id).is_some_and(|m| m.uses_contrast()));
    if age > settings.renal_precaution_age && uses_contrast {
        note(
            recommendation,
            AdaptationKind::RenalPrecaution,
            format!("Age over {}: check creatinine and eGFR before contrast injection", settings.renal_precaution_age),
        );
    }
}

fn adapt_for_childbearing_age(
    recommendation: &mut Recommendation,
    case: &HeadacheCase,
    catalog: &RuleSet,
    settings: &AdaptationSettings,
) {
    let childbearing = case.sex == Some(Sex::Female)
        && case
            .age
            .is_some_and(|a| (CHILDBEARING_MIN_AGE..settings.pregnancy_test_age).contains(&a));
    if !childbearing || case.is_pregnant() {
        return;
    }
    let ionizing = recommendation
        .imaging
        .iter()
        .any(|id| catalog.imaging(id).is_some_and(|m| m.ionizing));
    if ionizing {
        note(
            recommendation,
            AdaptationKind::PregnancyTest,
            "Woman of childbearing age: check for pregnancy (beta-hCG) before ionizing imaging".to_string(),
        );
    }
}
