//! Which missing field to ask about next.
//!
//! Fields are grouped in tiers; the engine asks the first unresolved,
//! applicable, not-yet-asked field of the highest tier. Order inside a tier
//! is fixed.

use crate::models::{CaseField, HeadacheCase, Profile, Sex};

/// Question tiers, most urgent first.
pub const TIERS: [&[CaseField]; 5] = [
    // immediate-danger discriminators
    &[CaseField::Onset, CaseField::Fever, CaseField::MeningealSigns, CaseField::Intensity],
    // secondary red flags
    &[CaseField::HticPattern, CaseField::NeuroDeficit, CaseField::Seizure],
    // temporal classification
    &[CaseField::Profile, CaseField::DurationHours],
    // risk contexts
    &[
        CaseField::PregnancyPostpartum,
        CaseField::PregnancyTrimester,
        CaseField::Trauma,
        CaseField::RecentLumbarPuncture,
        CaseField::Immunosuppression,
        CaseField::CancerHistory,
        CaseField::HortonCriteria,
        CaseField::VisualDisturbance,
    ],
    // chronic pattern
    &[CaseField::RecentPatternChange, CaseField::HeadacheProfile],
];

/// Tiers that must be resolved before the dialogue can complete on its own.
pub const CRITICAL_TIERS: usize = 2;

/// 1-based tier of a field; `None` for fields never asked (age, sex).
pub fn tier_of(field: CaseField) -> Option<usize> {
    TIERS
        .iter()
        .position(|tier| tier.contains(&field))
        .map(|idx| idx + 1)
}

/// Whether asking about `field` makes sense for this case.
pub fn is_applicable(field: CaseField, case: &HeadacheCase) -> bool {
    let chronic = case.profile == Some(Profile::Chronic);
    match field {
        CaseField::PregnancyPostpartum => case.sex != Some(Sex::Male),
        CaseField::PregnancyTrimester => case.pregnancy_postpartum == Some(true) && case.sex != Some(Sex::Male),
        CaseField::DurationHours | CaseField::RecentPatternChange | CaseField::HeadacheProfile => chronic,
        // Arteritis is a diagnosis of the over-fifties.
        CaseField::HortonCriteria => case.age.map_or(true, |age| age >= 50),
        _ => tier_of(field).is_some(),
    }
}

/// Applicable fields still unknown, in asking order.
pub fn missing_fields(case: &HeadacheCase) -> Vec<CaseField> {
    TIERS
        .iter()
        .flat_map(|tier| tier.iter().copied())
        .filter(|f| !case.is_known(*f) && is_applicable(*f, case))
        .collect()
}

/// Missing fields that have not been asked yet.
pub fn askable_fields(case: &HeadacheCase, asked: &[CaseField]) -> Vec<CaseField> {
    missing_fields(case)
        .into_iter()
        .filter(|f| !asked.contains(f))
        .collect()
}

pub fn next_field(case: &HeadacheCase, asked: &[CaseField]) -> Option<CaseField> {
    askable_fields(case, asked).into_iter().next()
}

/// Every tier-1 and tier-2 field holds a value. An asked field answered
/// with "don't know" stays unresolved.
pub fn critical_fields_resolved(case: &HeadacheCase) -> bool {
    TIERS[..CRITICAL_TIERS]
        .iter()
        .flat_map(|tier| tier.iter())
        .all(|f| case.is_known(*f))
}
