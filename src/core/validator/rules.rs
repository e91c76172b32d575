//! Rule file schema and compilation into [`ProtocolRequirement`]s

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::{Condition, ProtocolRequirement, Rule};
use crate::core::dataset::Tag;
use crate::error::ConfigError;

fn default_severity() -> f64 {
    1.0
}

/// Top level of a rule file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFile {
    #[serde(default)]
    pub core: Vec<RequirementDef>,
    #[serde(default)]
    pub protocols: BTreeMap<String, ProtocolDef>,
    #[serde(default)]
    pub modalities: BTreeMap<String, Vec<RequirementDef>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolDef {
    pub name: String,
    #[serde(default)]
    pub modalities: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<RequirementDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    Presence,
    Format,
    Enumeration,
    NumericRange,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionDef {
    pub tag: Tag,
    #[serde(default)]
    pub values: Vec<String>,
}

/// One requirement as written in TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequirementDef {
    pub name: String,
    pub tag: Tag,
    pub rule: RuleKind,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_severity")]
    pub severity: f64,
    #[serde(default)]
    pub optional: bool,
    pub pattern: Option<String>,
    #[serde(default)]
    pub joined: bool,
    pub max_length: Option<usize>,
    #[serde(default)]
    pub values: Vec<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(default)]
    pub exclusive_min: bool,
    #[serde(default)]
    pub exclusive_max: bool,
    #[serde(default)]
    pub integer: bool,
    pub when: Option<ConditionDef>,
}

impl RequirementDef {
    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidRequirement {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Check the definition and build its rule handler
    pub fn compile(&self, modality: Option<&str>) -> Result<ProtocolRequirement, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("name must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.severity) {
            return Err(self.invalid(format!("severity {} is not in [0.0, 1.0]", self.severity)));
        }

        let mut rule = match self.rule {
            RuleKind::Presence => Rule::Presence,
            RuleKind::Format => {
                let source = self
                    .pattern
                    .as_deref()
                    .ok_or_else(|| self.invalid("format rules need a pattern"))?;
                let pattern = Regex::new(source)
                    .map_err(|e| self.invalid(format!("bad pattern: {e}")))?;
                Rule::Format {
                    pattern,
                    joined: self.joined,
                    max_length: self.max_length,
                }
            }
            RuleKind::Enumeration => {
                if self.values.is_empty() {
                    return Err(self.invalid("enumeration rules need at least one value"));
                }
                Rule::Enumeration {
                    allowed: self.values.clone(),
                }
            }
            RuleKind::NumericRange => {
                for (label, bound) in [("min", self.min), ("max", self.max)] {
                    if bound.is_some_and(|b| !b.is_finite()) {
                        return Err(self.invalid(format!("{label} must be a finite number")));
                    }
                }
                if let (Some(min), Some(max)) = (self.min, self.max) {
                    if min > max {
                        return Err(self.invalid(format!("min {min} exceeds max {max}")));
                    }
                }
                Rule::NumericRange {
                    min: self.min,
                    max: self.max,
                    exclusive_min: self.exclusive_min,
                    exclusive_max: self.exclusive_max,
                    integer: self.integer,
                }
            }
        };

        if let Some(when) = &self.when {
            rule = Rule::Conditional {
                condition: Condition {
                    tag: when.tag,
                    values: when.values.clone(),
                },
                rule: Box::new(rule),
            };
        }
        if let Some(modality) = modality {
            rule = Rule::Conditional {
                condition: Condition {
                    tag: Tag::MODALITY,
                    values: vec![modality.to_string()],
                },
                rule: Box::new(rule),
            };
        }

        Ok(ProtocolRequirement {
            name: self.name.clone(),
            tag: self.tag,
            rule,
            severity: self.severity,
            description: self.description.clone(),
            modality: modality.map(str::to_string),
            optional: self.optional,
        })
    }
}
