use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{CaseField, FieldValue, HeadacheCase, Profile, Urgency};

/// How a rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logic {
    All,
    Any,
}

/// Requirement on a single case field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Boolean field equals the value.
    Equals { value: bool },
    /// Categorical field is one of the values.
    OneOf { values: Vec<String> },
    /// Numeric field within inclusive bounds.
    Range { min: Option<f64>, max: Option<f64> },
}

impl Condition {
    /// An unknown field never satisfies a condition.
    pub fn is_satisfied_by(&self, value: Option<&FieldValue>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            Self::Equals { value: expected } => value.as_bool() == Some(*expected),
            Self::OneOf { values } => value
                .as_text()
                .is_some_and(|v| values.iter().any(|allowed| allowed == v)),
            Self::Range { min, max } => value.as_number().is_some_and(|n| {
                min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi)
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: CaseField,
    pub condition: Condition,
}

impl FieldCondition {
    pub fn is_satisfied_by(&self, case: &HeadacheCase) -> bool {
        self.condition.is_satisfied_by(case.get(self.field).as_ref())
    }
}

/// What a rule recommends before contextual adaptation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleRecommendation {
    pub imaging: Vec<String>,
    pub urgency: Urgency,
    pub rationale: String,
}

/// A validated decision rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub priority: i32,
    pub logic: Logic,
    pub conditions: Vec<FieldCondition>,
    pub recommendation: RuleRecommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Rule {
    pub fn matches(&self, case: &HeadacheCase) -> bool {
        match self.logic {
            Logic::All => self.conditions.iter().all(|c| c.is_satisfied_by(case)),
            Logic::Any => self.conditions.iter().any(|c| c.is_satisfied_by(case)),
        }
    }

    /// Fields the rule looks at.
    pub fn fields(&self) -> Vec<CaseField> {
        self.conditions.iter().map(|c| c.field).collect()
    }
}

/// Contrast agent used by an imaging modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contrast {
    None,
    Iodine,
    Gadolinium,
}

/// Catalog entry describing one imaging modality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImagingModality {
    pub id: String,
    pub label: String,
    pub ionizing: bool,
    pub contrast: Contrast,
    /// Replacement when ionizing radiation must be avoided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_ionizing_equivalent: Option<String>,
}

impl ImagingModality {
    pub fn uses_contrast(&self) -> bool {
        self.contrast != Contrast::None
    }
}

/// Recommendation per temporal profile when no rule matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileFallbacks {
    #[serde(default)]
    pub acute: Option<RuleRecommendation>,
    #[serde(default)]
    pub subacute: Option<RuleRecommendation>,
    #[serde(default)]
    pub chronic: Option<RuleRecommendation>,
    /// Used when the profile itself is unknown.
    #[serde(default)]
    pub unknown: Option<RuleRecommendation>,
}

impl ProfileFallbacks {
    pub fn for_profile(&self, profile: Option<Profile>) -> Option<&RuleRecommendation> {
        match profile {
            Some(Profile::Acute) => self.acute.as_ref(),
            Some(Profile::Subacute) => self.subacute.as_ref(),
            Some(Profile::Chronic) => self.chronic.as_ref(),
            None => self.unknown.as_ref(),
        }
    }

    pub(crate) fn entries(&self) -> [(&'static str, Option<&RuleRecommendation>); 4] {
        [
            ("acute", self.acute.as_ref()),
            ("subacute", self.subacute.as_ref()),
            ("chronic", self.chronic.as_ref()),
            ("unknown", self.unknown.as_ref()),
        ]
    }
}

/// Versioned, validated, immutable rule configuration. Rules are kept in
/// evaluation order: priority descending, then id ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub(crate) version: String,
    pub(crate) imaging: BTreeMap<String, ImagingModality>,
    pub(crate) rules: Vec<Rule>,
    pub(crate) fallbacks: ProfileFallbacks,
}

impl RuleSet {
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn imaging(&self, id: &str) -> Option<&ImagingModality> {
        self.imaging.get(id)
    }

    pub fn fallbacks(&self) -> &ProfileFallbacks {
        &self.fallbacks
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
