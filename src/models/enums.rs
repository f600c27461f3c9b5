use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A string did not name any variant of the target enum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} value: {value}")]
pub struct InvalidEnumValue {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            pub fn all() -> &'static [Self] {
                &[$(Self::$variant),+]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnumValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnumValue {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Sex {
    Male => "male",
    Female => "female",
    Unspecified => "unspecified",
});

str_enum!(Onset {
    Thunderclap => "thunderclap",
    Progressive => "progressive",
    Chronic => "chronic",
});

str_enum!(
    /// Temporal profile of the headache episode.
    Profile {
        Acute => "acute",
        Subacute => "subacute",
        Chronic => "chronic",
    }
);

str_enum!(
    /// Primary-headache phenotype, only meaningful for chronic presentations.
    HeadachePhenotype {
        MigraineLike => "migraine_like",
        TensionLike => "tension_like",
        ClusterLike => "cluster_like",
    }
);

str_enum!(
    /// Kind of visual symptom accompanying the headache. `Absent` is an
    /// explicit "no visual symptoms", distinct from unknown.
    VisualDisturbance {
        Stroboscopic => "stroboscopic",
        Blur => "blur",
        Blindness => "blindness",
        Absent => "none",
    }
);

str_enum!(ConceptCategory {
    Symptom => "symptom",
    Profile => "profile",
    Context => "context",
    RedFlag => "red_flag",
});

str_enum!(
    /// Where a case field value came from. Declaration order is the merge
    /// rank: a later variant outranks an earlier one.
    ProvenanceSource {
        Fallback => "fallback",
        Inferred => "inferred",
        Extracted => "extracted",
        Answer => "answer",
    }
);

str_enum!(Role {
    User => "user",
    Assistant => "assistant",
});

str_enum!(
    /// Every field of the case record, addressable by name from rule and
    /// corpus configuration.
    CaseField {
        Age => "age",
        Sex => "sex",
        Onset => "onset",
        Profile => "profile",
        DurationHours => "duration_hours",
        Intensity => "intensity",
        Fever => "fever",
        MeningealSigns => "meningeal_signs",
        NeuroDeficit => "neuro_deficit",
        Seizure => "seizure",
        HticPattern => "htic_pattern",
        PregnancyPostpartum => "pregnancy_postpartum",
        PregnancyTrimester => "pregnancy_trimester",
        Trauma => "trauma",
        RecentLumbarPuncture => "recent_lumbar_puncture",
        Immunosuppression => "immunosuppression",
        CancerHistory => "cancer_history",
        RecentPatternChange => "recent_pattern_change",
        HeadacheProfile => "headache_profile",
        HortonCriteria => "horton_criteria",
        VisualDisturbance => "visual_disturbance_type",
    }
);

/// Value shape of a case field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Boolean,
    Categorical(&'static [&'static str]),
    Numeric { min: f64, max: f64 },
}

impl FieldKind {
    pub fn describe(&self) -> String {
        match self {
            Self::Boolean => "boolean".to_string(),
            Self::Categorical(values) => format!("one of [{}]", values.join(", ")),
            Self::Numeric { min, max } => format!("number in [{min}, {max}]"),
        }
    }
}

/// Upper bound on a stated duration: 50 years.
pub const MAX_DURATION_HOURS: f64 = 50.0 * 365.0 * 24.0;

impl CaseField {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Age => FieldKind::Numeric { min: 0.0, max: 120.0 },
            Self::Sex => FieldKind::Categorical(&["male", "female", "unspecified"]),
            Self::Onset => FieldKind::Categorical(&["thunderclap", "progressive", "chronic"]),
            Self::Profile => FieldKind::Categorical(&["acute", "subacute", "chronic"]),
            Self::DurationHours => FieldKind::Numeric { min: 0.0, max: MAX_DURATION_HOURS },
            Self::Intensity => FieldKind::Numeric { min: 0.0, max: 10.0 },
            Self::PregnancyTrimester => FieldKind::Numeric { min: 1.0, max: 3.0 },
            Self::HeadacheProfile => {
                FieldKind::Categorical(&["migraine_like", "tension_like", "cluster_like"])
            }
            Self::VisualDisturbance => FieldKind::Categorical(&["stroboscopic", "blur", "blindness", "none"]),
            Self::Fever
            | Self::MeningealSigns
            | Self::NeuroDeficit
            | Self::Seizure
            | Self::HticPattern
            | Self::PregnancyPostpartum
            | Self::Trauma
            | Self::RecentLumbarPuncture
            | Self::Immunosuppression
            | Self::CancerHistory
            | Self::RecentPatternChange
            | Self::HortonCriteria => FieldKind::Boolean,
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.kind(), FieldKind::Boolean)
    }
}
