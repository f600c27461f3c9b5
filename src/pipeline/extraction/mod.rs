//! Field extractors. Each one reads a single clinical field from free text
//! and reports a typed value with a confidence and the text it matched.

pub mod types;
pub mod confidence;
pub mod demographics;
pub mod temporal;
pub mod intensity;
pub mod pregnancy;
pub mod flags;

pub use types::*;
pub use confidence::*;
pub use demographics::{extract_age, extract_sex};
pub use temporal::{
    classify_duration, extract_duration_hours, extract_onset, extract_profile, extract_profile_with_basis,
    profile_from_onset, ProfileBasis,
};
pub use intensity::{extract_intensity, parse_intensity_answer};
pub use pregnancy::{extract_trimester, trimester_from_weeks};
pub use flags::{
    extract_flag, extract_flags, extract_headache_profile, extract_visual_disturbance, FLAG_FIELDS,
};
