use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::enums::{
    CaseField, FieldKind, HeadachePhenotype, InvalidEnumValue, Onset, Profile, ProvenanceSource,
    Sex, VisualDisturbance,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaseError {
    #[error("Field {field} expects {expected}")]
    TypeMismatch { field: CaseField, expected: String },

    #[error("Field {field} value {value} is out of range")]
    OutOfRange { field: CaseField, value: f64 },

    #[error(transparent)]
    InvalidEnum(#[from] InvalidEnumValue),
}

/// Dynamically-typed value of one case field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// How a field got its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub source: ProvenanceSource,
    pub confidence: f32,
    /// Text the value was read from, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
}

impl FieldProvenance {
    pub fn new(source: ProvenanceSource, confidence: f32) -> Self {
        Self {
            source,
            confidence: confidence.clamp(0.0, 1.0),
            matched_text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.matched_text = Some(text.into());
        self
    }
}

/// The patient case under construction.
///
/// `None` means unknown. A field holding `Some(false)` was explicitly
/// negated and always carries a provenance entry, so the two are never
/// confused. Mutation goes through [`HeadacheCase::set`] so that the value
/// and its provenance stay in step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadacheCase {
    pub age: Option<u8>,
    pub sex: Option<Sex>,
    pub onset: Option<Onset>,
    pub profile: Option<Profile>,
    pub duration_hours: Option<f64>,
    pub intensity: Option<u8>,

    pub fever: Option<bool>,
    pub meningeal_signs: Option<bool>,
    pub neuro_deficit: Option<bool>,
    pub seizure: Option<bool>,
    pub htic_pattern: Option<bool>,
    pub visual_disturbance_type: Option<VisualDisturbance>,
    /// Giant-cell arteritis signs: jaw claudication, tender temporal
    /// artery, raised ESR/CRP.
    pub horton_criteria: Option<bool>,

    pub pregnancy_postpartum: Option<bool>,
    pub pregnancy_trimester: Option<u8>,
    pub trauma: Option<bool>,
    pub recent_lumbar_puncture: Option<bool>,
    pub immunosuppression: Option<bool>,
    pub cancer_history: Option<bool>,
    pub recent_pattern_change: Option<bool>,
    pub headache_profile: Option<HeadachePhenotype>,

    #[serde(default)]
    pub provenance: BTreeMap<CaseField, FieldProvenance>,
}

impl HeadacheCase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: CaseField) -> Option<FieldValue> {
        let text = |s: &'static str| FieldValue::Text(s.to_string());
        match field {
            CaseField::Age => self.age.map(|v| FieldValue::Number(v as f64)),
            CaseField::Sex => self.sex.map(|v| text(v.as_str())),
            CaseField::Onset => self.onset.map(|v| text(v.as_str())),
            CaseField::Profile => self.profile.map(|v| text(v.as_str())),
            CaseField::DurationHours => self.duration_hours.map(FieldValue::Number),
            CaseField::Intensity => self.intensity.map(|v| FieldValue::Number(v as f64)),
            CaseField::PregnancyTrimester => {
                self.pregnancy_trimester.map(|v| FieldValue::Number(v as f64))
            }
            CaseField::HeadacheProfile => self.headache_profile.map(|v| text(v.as_str())),
            CaseField::VisualDisturbance => self.visual_disturbance_type.map(|v| text(v.as_str())),
            _ => self.flag(field).map(FieldValue::Bool),
        }
    }

    pub fn is_known(&self, field: CaseField) -> bool {
        self.get(field).is_some()
    }

    pub fn provenance_of(&self, field: CaseField) -> Option<&FieldProvenance> {
        self.provenance.get(&field)
    }

    /// Store `value` in `field` together with its provenance.
    ///
    /// The value is checked against the field's kind and range first; on
    /// error the case is left untouched.
    pub fn set(
        &mut self,
        field: CaseField,
        value: FieldValue,
        provenance: FieldProvenance,
    ) -> Result<(), CaseError> {
        match (field.kind(), &value) {
            (FieldKind::Boolean, FieldValue::Bool(b)) => {
                *self.flag_slot(field) = Some(*b);
            }
            (FieldKind::Numeric { min, max }, FieldValue::Number(n)) => {
                if !n.is_finite() || *n < min || *n > max {
                    return Err(CaseError::OutOfRange { field, value: *n });
                }
                match field {
                    CaseField::Age => self.age = Some(n.round() as u8),
                    CaseField::Intensity => self.intensity = Some(n.round() as u8),
                    CaseField::PregnancyTrimester => self.pregnancy_trimester = Some(n.round() as u8),
                    _ => self.duration_hours = Some(*n),
                }
            }
            (FieldKind::Categorical(_), FieldValue::Text(s)) => match field {
                CaseField::Sex => self.sex = Some(Sex::from_str(s)?),
                CaseField::Onset => self.onset = Some(Onset::from_str(s)?),
                CaseField::Profile => self.profile = Some(Profile::from_str(s)?),
                CaseField::VisualDisturbance => {
                    self.visual_disturbance_type = Some(VisualDisturbance::from_str(s)?)
                }
                _ => self.headache_profile = Some(HeadachePhenotype::from_str(s)?),
            },
            (kind, _) => {
                return Err(CaseError::TypeMismatch {
                    field,
                    expected: kind.describe(),
                })
            }
        }
        self.provenance.insert(field, provenance);
        Ok(())
    }

    /// Reset a field to unknown and drop its provenance.
    pub fn clear(&mut self, field: CaseField) {
        match field {
            CaseField::Age => self.age = None,
            CaseField::Sex => self.sex = None,
            CaseField::Onset => self.onset = None,
            CaseField::Profile => self.profile = None,
            CaseField::DurationHours => self.duration_hours = None,
            CaseField::Intensity => self.intensity = None,
            CaseField::PregnancyTrimester => self.pregnancy_trimester = None,
            CaseField::HeadacheProfile => self.headache_profile = None,
            CaseField::VisualDisturbance => self.visual_disturbance_type = None,
            _ => *self.flag_slot(field) = None,
        }
        self.provenance.remove(&field);
    }

    /// Known field values, without provenance. Two cases that hold the same
    /// information compare equal here even if they were built differently.
    pub fn known_values(&self) -> BTreeMap<CaseField, FieldValue> {
        CaseField::all()
            .iter()
            .filter_map(|f| self.get(*f).map(|v| (*f, v)))
            .collect()
    }

    /// Restore the provenance invariant on a case received from outside:
    /// known fields without an entry get one from `source`, and entries for
    /// unknown fields are dropped.
    pub fn repair_provenance(&mut self, source: ProvenanceSource) {
        for field in CaseField::all() {
            if self.is_known(*field) {
                self.provenance
                    .entry(*field)
                    .or_insert_with(|| FieldProvenance::new(source, 1.0));
            }
        }
        let known: Vec<CaseField> = self.known_values().into_keys().collect();
        self.provenance.retain(|field, _| known.contains(field));
    }

    /// True when every known field has provenance and no provenance entry
    /// points at an unknown field.
    pub fn provenance_consistent(&self) -> bool {
        CaseField::all()
            .iter()
            .all(|f| self.is_known(*f) == self.provenance.contains_key(f))
    }

    pub fn is_pregnant(&self) -> bool {
        self.pregnancy_postpartum == Some(true) || self.pregnancy_trimester.is_some()
    }

    /// Red-flag findings currently present in the case.
    pub fn red_flags(&self) -> Vec<CaseField> {
        let mut flags = Vec::new();
        if self.onset == Some(Onset::Thunderclap) {
            flags.push(CaseField::Onset);
        }
        for field in [
            CaseField::Fever,
            CaseField::MeningealSigns,
            CaseField::NeuroDeficit,
            CaseField::Seizure,
            CaseField::HticPattern,
            CaseField::Immunosuppression,
            CaseField::CancerHistory,
            CaseField::RecentPatternChange,
            CaseField::HortonCriteria,
        ] {
            if self.flag(field) == Some(true) {
                flags.push(field);
            }
        }
        if self.visual_disturbance_type == Some(VisualDisturbance::Blindness) {
            flags.push(CaseField::VisualDisturbance);
        }
        if self.age.is_some_and(|a| a > 50) && self.profile == Some(Profile::Acute) {
            flags.push(CaseField::Age);
        }
        flags
    }

    pub fn has_red_flags(&self) -> bool {
        !self.red_flags().is_empty()
    }

    /// Presentations that warrant imaging without delay.
    pub fn is_emergency(&self) -> bool {
        let yes = |v: Option<bool>| v == Some(true);
        let acute = self.profile == Some(Profile::Acute);
        self.onset == Some(Onset::Thunderclap)
            || (yes(self.fever) && yes(self.meningeal_signs))
            || (acute && yes(self.neuro_deficit))
            || (acute && yes(self.seizure))
            || (acute && self.visual_disturbance_type == Some(VisualDisturbance::Blindness))
            || (yes(self.htic_pattern) && (yes(self.neuro_deficit) || yes(self.seizure)))
    }

    fn flag(&self, field: CaseField) -> Option<bool> {
        match field {
            CaseField::Fever => self.fever,
            CaseField::MeningealSigns => self.meningeal_signs,
            CaseField::NeuroDeficit => self.neuro_deficit,
            CaseField::Seizure => self.seizure,
            CaseField::HticPattern => self.htic_pattern,
            CaseField::PregnancyPostpartum => self.pregnancy_postpartum,
            CaseField::Trauma => self.trauma,
            CaseField::RecentLumbarPuncture => self.recent_lumbar_puncture,
            CaseField::Immunosuppression => self.immunosuppression,
            CaseField::CancerHistory => self.cancer_history,
            CaseField::RecentPatternChange => self.recent_pattern_change,
            CaseField::HortonCriteria => self.horton_criteria,
            _ => None,
        }
    }

    // Only called with boolean fields; anything else lands on the
    // pattern-change slot, which `set` never reaches with a non-boolean.
    fn flag_slot(&mut self, field: CaseField) -> &mut Option<bool> {
        match field {
            CaseField::Fever => &mut self.fever,
            CaseField::MeningealSigns => &mut self.meningeal_signs,
            CaseField::NeuroDeficit => &mut self.neuro_deficit,
            CaseField::Seizure => &mut self.seizure,
            CaseField::HticPattern => &mut self.htic_pattern,
            CaseField::PregnancyPostpartum => &mut self.pregnancy_postpartum,
            CaseField::Trauma => &mut self.trauma,
            CaseField::RecentLumbarPuncture => &mut self.recent_lumbar_puncture,
            CaseField::Immunosuppression => &mut self.immunosuppression,
            CaseField::CancerHistory => &mut self.cancer_history,
            CaseField::HortonCriteria => &mut self.horton_criteria,
            _ => &mut self.recent_pattern_change,
        }
    }
}
