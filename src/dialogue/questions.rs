use serde::{Deserialize, Serialize};

use crate::models::{CaseField, HeadacheCase};

/// Below this age the child-directed wording is used.
pub const PEDIATRIC_AGE_LIMIT: u8 = 16;

/// Shape of the reply a question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    YesNo,
    Scale,
    FreeText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub field: CaseField,
    pub text: String,
    pub answer_kind: AnswerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    Anyone,
    Child,
}

impl Audience {
    fn admits(self, case: &HeadacheCase) -> bool {
        match self {
            Self::Anyone => true,
            Self::Child => case.age.is_some_and(|a| a < PEDIATRIC_AGE_LIMIT),
        }
    }
}

struct Template {
    field: CaseField,
    audience: Audience,
    kind: AnswerKind,
    text: &'static str,
}

const fn template(field: CaseField, audience: Audience, kind: AnswerKind, text: &'static str) -> Template {
    Template {
        field,
        audience,
        kind,
        text,
    }
}

use AnswerKind::{FreeText, Scale, YesNo};
use Audience::{Anyone, Child};

/// First template whose audience admits the case wins, so narrower
/// audiences come before `Anyone` for the same field.
static TEMPLATES: &[Template] = &[
    template(
        CaseField::Onset,
        Anyone,
        YesNo,
        "Did the headache start suddenly, reaching its maximum intensity within a minute (thunderclap)?",
    ),
    template(CaseField::Fever, Child, YesNo, "Does the child have a fever?"),
    template(CaseField::Fever, Anyone, YesNo, "Does the patient have a fever?"),
    template(
        CaseField::MeningealSigns,
        Anyone,
        YesNo,
        "Is there neck stiffness, with pain or difficulty bending the head forward?",
    ),
    template(
        CaseField::Intensity,
        Anyone,
        Scale,
        "On a scale from 0 to 10, how intense is the pain?",
    ),
    template(
        CaseField::HticPattern,
        Anyone,
        YesNo,
        "Is the pain worse on waking, with projectile vomiting or worsening on coughing or straining?",
    ),
    template(
        CaseField::NeuroDeficit,
        Anyone,
        YesNo,
        "Is there any weakness, speech disturbance or visual disturbance?",
    ),
    template(CaseField::Seizure, Child, YesNo, "Has the child had a seizure or convulsions?"),
    template(CaseField::Seizure, Anyone, YesNo, "Has the patient had a seizure or convulsions?"),
    template(
        CaseField::Profile,
        Anyone,
        FreeText,
        "How long has the headache been present: hours or days, several weeks, or months to years?",
    ),
    template(
        CaseField::DurationHours,
        Anyone,
        FreeText,
        "How long exactly has this headache been going on (in hours, days or months)?",
    ),
    template(
        CaseField::PregnancyPostpartum,
        Anyone,
        YesNo,
        "Is the patient pregnant or has she given birth in the last 6 weeks?",
    ),
    template(
        CaseField::PregnancyTrimester,
        Anyone,
        FreeText,
        "How far along is the pregnancy (trimester or weeks)?",
    ),
    template(
        CaseField::Trauma,
        Child,
        YesNo,
        "Has the child had a fall or a knock to the head recently?",
    ),
    template(
        CaseField::Trauma,
        Anyone,
        YesNo,
        "Has the patient had a recent head injury (fall, blow, road accident)?",
    ),
    template(
        CaseField::RecentLumbarPuncture,
        Anyone,
        YesNo,
        "Has the patient had a lumbar puncture or an epidural recently?",
    ),
    template(
        CaseField::Immunosuppression,
        Anyone,
        YesNo,
        "Is the patient immunocompromised (HIV, chemotherapy, immunosuppressive treatment, transplant)?",
    ),
    template(
        CaseField::CancerHistory,
        Anyone,
        YesNo,
        "Does the patient have a history of cancer?",
    ),
    template(
        CaseField::HortonCriteria,
        Anyone,
        YesNo,
        "Is there jaw pain when chewing, a tender temporal artery or known raised inflammatory markers?",
    ),
    template(
        CaseField::VisualDisturbance,
        Anyone,
        FreeText,
        "Any visual symptoms: flashing lights or zigzag lines, blurred vision, or loss of vision?",
    ),
    template(
        CaseField::RecentPatternChange,
        Anyone,
        YesNo,
        "Has the usual headache pattern changed recently (worse, more frequent, new symptoms)?",
    ),
    template(
        CaseField::HeadacheProfile,
        Anyone,
        FreeText,
        "Can you describe the pain: one side or both, throbbing or pressing, with nausea or light sensitivity, around one eye?",
    ),
];

/// The question to ask about `field` for this case, if the field is ever
/// asked.
pub fn question_for(field: CaseField, case: &HeadacheCase) -> Option<Question> {
    TEMPLATES
        .iter()
        .find(|t| t.field == field && t.audience.admits(case))
        .map(|t| Question {
            field,
            text: t.text.to_string(),
            answer_kind: t.kind,
        })
}
