//! Rule configuration loading and validation.
//!
//! Everything is checked here so that evaluation never meets a malformed
//! rule: required keys, known fields, condition types against field kinds,
//! imaging ids against the catalog, unique rule ids.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::{CaseField, FieldKind};

use super::types::{Condition, FieldCondition, ImagingModality, Logic, ProfileFallbacks, Rule, RuleRecommendation, RuleSet};
use super::RuleConfigError;

const BUILTIN_RULES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/rules.json"));

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    version: String,
    imaging_catalog: Vec<ImagingModality>,
    rules: Vec<Value>,
    #[serde(default)]
    fallbacks: ProfileFallbacks,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    id: String,
    priority: i32,
    logic: Logic,
    conditions: Map<String, Value>,
    recommendation: RuleRecommendation,
    #[serde(default)]
    description: Option<String>,
}

impl RuleSet {
    /// The rule set shipped with the crate.
    pub fn builtin() -> Result<Self, RuleConfigError> {
        Self::from_json(BUILTIN_RULES)
    }

    pub fn load(path: &Path) -> Result<Self, RuleConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RuleConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(json: &str) -> Result<Self, RuleConfigError> {
        let file: RuleFile = serde_json::from_str(json).map_err(|e| RuleConfigError::Parse(e.to_string()))?;

        let imaging = build_catalog(file.imaging_catalog)?;

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(file.rules.len());
        for (position, raw) in file.rules.into_iter().enumerate() {
            let rule = parse_rule(raw, position)?;
            check_imaging(&imaging, &rule.id, &rule.recommendation)?;
            if !seen.insert(rule.id.clone()) {
                return Err(RuleConfigError::DuplicateRule(rule.id));
            }
            rules.push(rule);
        }
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

        for (profile, recommendation) in file.fallbacks.entries() {
            if let Some(recommendation) = recommendation {
                check_imaging(&imaging, &format!("fallback {profile}"), recommendation)?;
            }
        }

        tracing::info!(version = %file.version, rules = rules.len(), imaging = imaging.len(), "Rule set loaded");

        Ok(RuleSet {
            version: file.version,
            imaging,
            rules,
            fallbacks: file.fallbacks,
        })
    }
}

fn build_catalog(entries: Vec<ImagingModality>) -> Result<BTreeMap<String, ImagingModality>, RuleConfigError> {
    let mut catalog = BTreeMap::new();
    for entry in entries {
        if entry.id.trim().is_empty() {
            return Err(RuleConfigError::InvalidCatalog("imaging entry with empty id".into()));
        }
        let id = entry.id.clone();
        if catalog.insert(id.clone(), entry).is_some() {
            return Err(RuleConfigError::InvalidCatalog(format!("duplicate imaging id {id}")));
        }
    }
    for modality in catalog.values() {
        if let Some(equivalent) = &modality.non_ionizing_equivalent {
            match catalog.get(equivalent) {
                None => {
                    return Err(RuleConfigError::UnknownImaging {
                        owner: modality.id.clone(),
                        imaging: equivalent.clone(),
                    })
                }
                Some(target) if target.ionizing => {
                    return Err(RuleConfigError::InvalidCatalog(format!(
                        "{} lists {} as non-ionizing equivalent but it is ionizing",
                        modality.id, target.id
                    )))
                }
                Some(_) => {}
            }
        }
    }
    Ok(catalog)
}

fn check_imaging(
    catalog: &BTreeMap<String, ImagingModality>,
    owner: &str,
    recommendation: &RuleRecommendation,
) -> Result<(), RuleConfigError> {
    match recommendation.imaging.iter().find(|id| !catalog.contains_key(*id)) {
        Some(unknown) => Err(RuleConfigError::UnknownImaging {
            owner: owner.to_string(),
            imaging: unknown.clone(),
        }),
        None => Ok(()),
    }
}

fn parse_rule(raw: Value, position: usize) -> Result<Rule, RuleConfigError> {
    let label = raw
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{position}"));

    let rule: RawRule = serde_json::from_value(raw).map_err(|e| RuleConfigError::InvalidRule {
        rule: label.clone(),
        reason: e.to_string(),
    })?;
    if rule.id.trim().is_empty() {
        return Err(RuleConfigError::InvalidRule {
            rule: label,
            reason: "empty id".into(),
        });
    }
    if rule.conditions.is_empty() {
        return Err(RuleConfigError::InvalidRule {
            rule: rule.id,
            reason: "conditions must not be empty".into(),
        });
    }

    let conditions = parse_conditions(&rule.id, &rule.conditions)?;
    Ok(Rule {
        id: rule.id,
        priority: rule.priority,
        logic: rule.logic,
        conditions,
        recommendation: rule.recommendation,
        description: rule.description,
    })
}

/// Resolve a condition key to its field. `age_min` / `age_max` address the
/// bounds of a numeric field.
fn resolve_key(key: &str) -> Option<(CaseField, Option<Bound>)> {
    if let Ok(field) = key.parse::<CaseField>() {
        return Some((field, None));
    }
    if let Some(base) = key.strip_suffix("_min") {
        return base.parse::<CaseField>().ok().map(|f| (f, Some(Bound::Min)));
    }
    if let Some(base) = key.strip_suffix("_max") {
        return base.parse::<CaseField>().ok().map(|f| (f, Some(Bound::Max)));
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Min,
    Max,
}

fn parse_conditions(rule_id: &str, raw: &Map<String, Value>) -> Result<Vec<FieldCondition>, RuleConfigError> {
    let mut conditions: Vec<FieldCondition> = Vec::new();

    for (key, value) in raw {
        let Some((field, bound)) = resolve_key(key) else {
            return Err(RuleConfigError::UnknownField {
                rule: rule_id.to_string(),
                field: key.clone(),
            });
        };
        let mismatch = || RuleConfigError::TypeMismatch {
            rule: rule_id.to_string(),
            field: key.clone(),
            expected: field.kind().describe(),
        };
        let kind = field.kind();

        let condition = match (bound, kind) {
            (Some(bound), FieldKind::Numeric { .. }) => {
                let n = value.as_f64().ok_or_else(mismatch)?;
                match bound {
                    Bound::Min => Condition::Range { min: Some(n), max: None },
                    Bound::Max => Condition::Range { min: None, max: Some(n) },
                }
            }
            (Some(_), _) => return Err(mismatch()),
            (None, FieldKind::Boolean) => Condition::Equals {
                value: value.as_bool().ok_or_else(mismatch)?,
            },
            (None, FieldKind::Categorical(allowed)) => {
                let values = categorical_values(value).ok_or_else(mismatch)?;
                if values.is_empty() || values.iter().any(|v| !allowed.contains(&v.as_str())) {
                    return Err(mismatch());
                }
                Condition::OneOf { values }
            }
            (None, FieldKind::Numeric { .. }) => numeric_condition(value).ok_or_else(mismatch)?,
        };

        if let Condition::Range { min: Some(lo), max: Some(hi) } = condition {
            if lo > hi {
                return Err(RuleConfigError::InvalidRule {
                    rule: rule_id.to_string(),
                    reason: format!("{key}: min {lo} is above max {hi}"),
                });
            }
        }
        push_condition(&mut conditions, rule_id, field, condition)?;
    }

    Ok(conditions)
}

fn categorical_values(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items.iter().map(|v| v.as_str().map(str::to_string)).collect(),
        _ => None,
    }
}

/// A bare number is an exact value; an object gives `min` and/or `max`.
fn numeric_condition(value: &Value) -> Option<Condition> {
    match value {
        Value::Number(n) => {
            let n = n.as_f64()?;
            Some(Condition::Range { min: Some(n), max: Some(n) })
        }
        Value::Object(bounds) => {
            if bounds.keys().any(|k| k != "min" && k != "max") {
                return None;
            }
            let read = |k: &str| match bounds.get(k) {
                None => Some(None),
                Some(v) => v.as_f64().map(Some),
            };
            let (min, max) = (read("min")?, read("max")?);
            if min.is_none() && max.is_none() {
                return None;
            }
            Some(Condition::Range { min, max })
        }
        _ => None,
    }
}

/// `age_min` and `age_max` on the same rule collapse into one range.
fn push_condition(
    conditions: &mut Vec<FieldCondition>,
    rule_id: &str,
    field: CaseField,
    condition: Condition,
) -> Result<(), RuleConfigError> {
    if let Some(existing) = conditions.iter_mut().find(|c| c.field == field) {
        let merged = match (&existing.condition, &condition) {
            (
                Condition::Range { min: a_min, max: a_max },
                Condition::Range { min: b_min, max: b_max },
            ) if (a_min.is_none() || b_min.is_none()) && (a_max.is_none() || b_max.is_none()) => Condition::Range {
                min: a_min.or(*b_min),
                max: a_max.or(*b_max),
            },
            _ => {
                return Err(RuleConfigError::InvalidRule {
                    rule: rule_id.to_string(),
                    reason: format!("{field} has conflicting conditions"),
                })
            }
        };
        if let Condition::Range { min: Some(lo), max: Some(hi) } = merged {
            if lo > hi {
                return Err(RuleConfigError::InvalidRule {
                    rule: rule_id.to_string(),
                    reason: format!("{field}: min {lo} is above max {hi}"),
                });
            }
        }
        existing.condition = merged;
        return Ok(());
    }
    conditions.push(FieldCondition { field, condition });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Urgency;
    use std::io::Write;

    fn with_rules(rules: &str) -> String {
        format!(
            r#"{{
                "version": "test",
                "imaging_catalog": [
                    {{"id": "ct", "label": "CT", "ionizing": true, "contrast": "none", "non_ionizing_equivalent": "mri"}},
                    {{"id": "mri", "label": "MRI", "ionizing": false, "contrast": "none"}}
                ],
                "rules": {rules},
                "fallbacks": {{"acute": {{"imaging": ["ct"], "urgency": "urgent", "rationale": "acute"}}}}
            }}"#
        )
    }

    #[test]
    fn builtin_rules_load_in_evaluation_order() {
        let set = RuleSet::builtin().unwrap();
        assert!(set.len() >= 10);
        for pair in set.rules().windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.priority > b.priority || (a.priority == b.priority && a.id < b.id),
                "{} before {} is out of order",
                a.id,
                b.id
            );
        }
        assert!(set.fallbacks().unknown.is_some());
    }

    #[test]
    fn condition_shapes_are_parsed() {
        let json = with_rules(
            r#"[{"id": "R1", "priority": 10, "logic": "all",
                 "conditions": {"fever": true, "profile": ["acute", "subacute"], "onset": "thunderclap",
                                "age_min": 50, "age_max": 80, "intensity": {"min": 7}, "pregnancy_trimester": 1},
                 "recommendation": {"imaging": ["ct"], "urgency": "standard", "rationale": "r"}}]"#,
        );
        let set = RuleSet::from_json(&json).unwrap();
        let rule = set.rule("R1").unwrap();
        assert_eq!(rule.recommendation.urgency, Urgency::Delayed);
        let condition = |f: CaseField| rule.conditions.iter().find(|c| c.field == f).unwrap().condition.clone();
        assert_eq!(condition(CaseField::Fever), Condition::Equals { value: true });
        assert_eq!(condition(CaseField::Onset), Condition::OneOf { values: vec!["thunderclap".into()] });
        assert_eq!(condition(CaseField::Age), Condition::Range { min: Some(50.0), max: Some(80.0) });
        assert_eq!(condition(CaseField::Intensity), Condition::Range { min: Some(7.0), max: None });
        assert_eq!(
            condition(CaseField::PregnancyTrimester),
            Condition::Range { min: Some(1.0), max: Some(1.0) }
        );
    }

    #[test]
    fn missing_required_key_names_the_rule() {
        let json = with_rules(
            r#"[{"id": "NO_LOGIC", "priority": 1, "conditions": {"fever": true},
                 "recommendation": {"imaging": [], "urgency": "none", "rationale": "r"}}]"#,
        );
        let err = RuleSet::from_json(&json).unwrap_err();
        assert!(matches!(&err, RuleConfigError::InvalidRule { rule, .. } if rule == "NO_LOGIC"), "got {err}");
        assert!(err.to_string().contains("logic"));
    }

    #[test]
    fn rule_without_id_is_named_by_position() {
        let json = with_rules(
            r#"[{"priority": 1, "logic": "all", "conditions": {"fever": true},
                 "recommendation": {"imaging": [], "urgency": "none", "rationale": "r"}}]"#,
        );
        let err = RuleSet::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("#0"), "got {err}");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let json = with_rules(
            r#"[{"id": "R", "priority": 1, "logic": "all", "conditions": {"blood_pressure": true},
                 "recommendation": {"imaging": [], "urgency": "none", "rationale": "r"}}]"#,
        );
        assert!(matches!(
            RuleSet::from_json(&json),
            Err(RuleConfigError::UnknownField { field, .. }) if field == "blood_pressure"
        ));
    }

    #[test]
    fn type_mismatches_are_rejected() {
        for conditions in [
            r#"{"fever": "yes"}"#,
            r#"{"onset": "sudden"}"#,
            r#"{"onset": true}"#,
            r#"{"age": "old"}"#,
            r#"{"fever_min": 1}"#,
            r#"{"intensity": {"above": 3}}"#,
        ] {
            let json = with_rules(&format!(
                r#"[{{"id": "R", "priority": 1, "logic": "any", "conditions": {conditions},
                     "recommendation": {{"imaging": [], "urgency": "none", "rationale": "r"}}}}]"#
            ));
            assert!(
                matches!(RuleSet::from_json(&json), Err(RuleConfigError::TypeMismatch { .. })),
                "{conditions} should be a type mismatch"
            );
        }
    }

    #[test]
    fn inverted_range_is_rejected() {
        let json = with_rules(
            r#"[{"id": "R", "priority": 1, "logic": "all", "conditions": {"age_min": 70, "age_max": 20},
                 "recommendation": {"imaging": [], "urgency": "none", "rationale": "r"}}]"#,
        );
        assert!(matches!(RuleSet::from_json(&json), Err(RuleConfigError::InvalidRule { .. })));
    }

    #[test]
    fn duplicate_rule_ids_are_rejected() {
        let rule = r#"{"id": "DUP", "priority": 1, "logic": "all", "conditions": {"fever": true},
                       "recommendation": {"imaging": [], "urgency": "none", "rationale": "r"}}"#;
        let json = with_rules(&format!("[{rule}, {rule}]"));
        assert!(matches!(RuleSet::from_json(&json), Err(RuleConfigError::DuplicateRule(id)) if id == "DUP"));
    }

    #[test]
    fn unknown_imaging_is_rejected() {
        let json = with_rules(
            r#"[{"id": "R", "priority": 1, "logic": "all", "conditions": {"fever": true},
                 "recommendation": {"imaging": ["pet_scan"], "urgency": "urgent", "rationale": "r"}}]"#,
        );
        assert!(matches!(
            RuleSet::from_json(&json),
            Err(RuleConfigError::UnknownImaging { owner, imaging }) if owner == "R" && imaging == "pet_scan"
        ));
    }

    #[test]
    fn empty_conditions_are_rejected() {
        let json = with_rules(
            r#"[{"id": "R", "priority": 1, "logic": "all", "conditions": {},
                 "recommendation": {"imaging": [], "urgency": "none", "rationale": "r"}}]"#,
        );
        assert!(matches!(RuleSet::from_json(&json), Err(RuleConfigError::InvalidRule { .. })));
    }

    #[test]
    fn equal_priorities_sort_by_id() {
        let json = with_rules(
            r#"[{"id": "B", "priority": 5, "logic": "all", "conditions": {"fever": true},
                 "recommendation": {"imaging": [], "urgency": "none", "rationale": "r"}},
                {"id": "A", "priority": 5, "logic": "all", "conditions": {"fever": true},
                 "recommendation": {"imaging": [], "urgency": "none", "rationale": "r"}}]"#,
        );
        let set = RuleSet::from_json(&json).unwrap();
        let ids: Vec<&str> = set.rules().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(with_rules("[]").as_bytes()).unwrap();
        let set = RuleSet::load(file.path()).unwrap();
        assert_eq!(set.version(), "test");
        assert!(set.is_empty());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RuleSet::load(Path::new("/nonexistent/rules.json")).unwrap_err();
        assert!(matches!(err, RuleConfigError::Io(_)));
    }
}
