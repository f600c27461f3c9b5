use serde::{Deserialize, Serialize};

/// How soon imaging should happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    Urgent,
    #[serde(alias = "standard")]
    Delayed,
    None,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Urgent => "urgent",
            Self::Delayed => "delayed",
            Self::None => "none",
        }
    }

    /// One level more urgent; `Immediate` stays put.
    pub fn escalated(self) -> Self {
        match self {
            Self::None => Self::Delayed,
            Self::Delayed => Self::Urgent,
            Self::Urgent | Self::Immediate => Self::Immediate,
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationKind {
    NonIonizingSubstitution,
    VenousImaging,
    GadoliniumAvoidance,
    RenalPrecaution,
    PregnancyTest,
    UrgencyEscalation,
}

/// One contextual modification applied after rule selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationNote {
    pub kind: AdaptationKind,
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    Rule,
    ProfileFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub rule_id: String,
    pub source: RecommendationSource,
    pub imaging: Vec<String>,
    pub urgency: Urgency,
    pub rationale: String,
    pub adaptations: Vec<AdaptationNote>,
}

impl Recommendation {
    pub fn requires_imaging(&self) -> bool {
        !self.imaging.is_empty()
    }

    pub fn is_emergency(&self) -> bool {
        self.urgency == Urgency::Immediate
    }

    pub fn has_adaptation(&self, kind: AdaptationKind) -> bool {
        self.adaptations.iter().any(|a| a.kind == kind)
    }
}
