//! Protocol conformance validation
//!
//! Requirements are data: each one names a tag and a rule drawn from a fixed
//! set of handlers (presence, format, enumeration, numeric range), optionally
//! guarded by a condition on another tag. A [`RequirementValidator`] binds
//! exactly one requirement and reports at most one finding per file.

pub mod registry;
pub mod rules;

use regex::Regex;
use std::path::Path;

use super::dataset::{Dataset, Element, Tag};
use super::finding::Finding;
use super::patterns::displayable;
use crate::error::CheckError;

pub use registry::{ProtocolInfo, ValidatorRegistry};

/// Longest offending value quoted in a finding message
const MESSAGE_VALUE_CHARS: usize = 64;

/// Checks one protocol requirement against one dataset
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    /// `None` when the dataset satisfies the requirement
    fn validate(&self, dataset: &Dataset, source: &Path) -> Result<Option<Finding>, CheckError>;
}

/// Applies when `tag` has one of `values`, or is present at all when `values` is empty
#[derive(Debug, Clone)]
pub struct Condition {
    pub tag: Tag,
    pub values: Vec<String>,
}

impl Condition {
    pub fn holds(&self, dataset: &Dataset) -> bool {
        match dataset.get(self.tag) {
            None => false,
            Some(element) if self.values.is_empty() => !element.is_blank(),
            Some(element) => element
                .values
                .iter()
                .any(|v| self.values.iter().any(|allowed| allowed == v.trim())),
        }
    }
}

/// A compiled rule
#[derive(Debug, Clone)]
pub enum Rule {
    Presence,
    Format {
        pattern: Regex,
        joined: bool,
        max_length: Option<usize>,
    },
    Enumeration {
        allowed: Vec<String>,
    },
    NumericRange {
        min: Option<f64>,
        max: Option<f64>,
        exclusive_min: bool,
        exclusive_max: bool,
        integer: bool,
    },
    Conditional {
        condition: Condition,
        rule: Box<Rule>,
    },
}

impl Rule {
    /// Description of what violates the rule, or `None` when satisfied
    ///
    /// A missing or blank tag violates every rule unless `optional` is set.
    pub fn violation(&self, dataset: &Dataset, tag: Tag, optional: bool) -> Option<String> {
        if let Rule::Conditional { condition, rule } = self {
            return if condition.holds(dataset) {
                rule.violation(dataset, tag, optional)
            } else {
                None
            };
        }

        let element = match dataset.get(tag) {
            None if optional => return None,
            None => return Some("tag missing".to_string()),
            Some(element) if element.is_blank() => {
                return (!optional).then(|| "value missing".to_string());
            }
            Some(element) => element,
        };

        let offending = self.offending_values(element);
        if offending.is_empty() {
            None
        } else {
            let quoted: Vec<String> = offending
                .iter()
                .map(|v| format!("«{}»", displayable(v, MESSAGE_VALUE_CHARS)))
                .collect();
            Some(quoted.join(", "))
        }
    }

    fn offending_values(&self, element: &Element) -> Vec<String> {
        match self {
            Rule::Presence | Rule::Conditional { .. } => Vec::new(),
            Rule::Format {
                pattern,
                joined: true,
                max_length,
            } => {
                let value = element.joined();
                if fits(&value, *max_length) && pattern.is_match(&value) {
                    Vec::new()
                } else {
                    vec![value]
                }
            }
            Rule::Format {
                pattern,
                joined: false,
                max_length,
            } => non_blank(element)
                .filter(|v| !(fits(v, *max_length) && pattern.is_match(v)))
                .map(str::to_string)
                .collect(),
            Rule::Enumeration { allowed } => non_blank(element)
                .filter(|v| !allowed.iter().any(|a| a == v))
                .map(str::to_string)
                .collect(),
            Rule::NumericRange {
                min,
                max,
                exclusive_min,
                exclusive_max,
                integer,
            } => non_blank(element)
                .filter(|v| match v.parse::<f64>() {
                    Ok(n) if n.is_finite() => {
                        let below = min.is_some_and(|m| if *exclusive_min { n <= m } else { n < m });
                        let above = max.is_some_and(|m| if *exclusive_max { n >= m } else { n > m });
                        below || above || (*integer && n.fract() != 0.0)
                    }
                    _ => true,
                })
                .map(str::to_string)
                .collect(),
        }
    }
}

fn non_blank(element: &Element) -> impl Iterator<Item = &str> {
    element.values.iter().map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn fits(value: &str, max_length: Option<usize>) -> bool {
    max_length.map_or(true, |max| value.chars().count() <= max)
}

/// A required tag and the rule it must satisfy
#[derive(Debug, Clone)]
pub struct ProtocolRequirement {
    pub name: String,
    pub tag: Tag,
    pub rule: Rule,
    pub severity: f64,
    pub description: String,
    /// Modality the requirement was declared for, if any
    pub modality: Option<String>,
    pub optional: bool,
}

/// Binds exactly one requirement
#[derive(Debug, Clone)]
pub struct RequirementValidator {
    requirement: ProtocolRequirement,
}

impl RequirementValidator {
    pub fn new(requirement: ProtocolRequirement) -> Self {
        Self { requirement }
    }

    pub fn requirement(&self) -> &ProtocolRequirement {
        &self.requirement
    }
}

impl Validator for RequirementValidator {
    fn name(&self) -> &str {
        &self.requirement.name
    }

    fn validate(&self, dataset: &Dataset, source: &Path) -> Result<Option<Finding>, CheckError> {
        let req = &self.requirement;
        Ok(req.rule.violation(dataset, req.tag, req.optional).map(|detail| {
            tracing::debug!(
                path = %source.display(),
                requirement = %req.name,
                "Requirement violated"
            );
            Finding::validation(
                req.severity,
                format!("{} {} {}: {}", req.tag, req.name, detail, req.description),
                source,
            )
        }))
    }
}
