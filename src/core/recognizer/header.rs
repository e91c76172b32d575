//! Scores PHI/PII in the non-binary header elements of a dataset

use std::collections::BTreeSet;
use std::path::Path;

use super::Recognizer;
use crate::core::dataset::{Dataset, Element, Tag};
use crate::core::finding::{clamp_score, Finding};
use crate::core::patterns::{
    displayable, has_non_person_hint, is_allowed_vendor, is_anonymized, is_high_entropy,
    is_structured_name, PatternClass,
};
use crate::error::CheckError;

const BASE_SCORE: f64 = 0.1;
const FREE_TEXT_BONUS: f64 = 0.15;
const JARGON_PENALTY: f64 = 0.15;
const UNNAMED_PN_PENALTY: f64 = 0.35;
/// Longest value inspected; anything beyond is ignored
const MAX_TEXT_CHARS: usize = 5000;
const MESSAGE_VALUE_CHARS: usize = 80;

/// Text VRs that hold free-form human input
const FREE_TEXT_VRS: &[&str] = &[
    "AE", "AS", "CS", "LO", "LT", "PN", "SH", "ST", "UC", "UT", "UR",
];

/// Numeric and identifier VRs whose digit runs look like phone numbers or SSNs
const SKIPPED_VRS: &[&str] = &[
    "AT", "DS", "FD", "FL", "IS", "SL", "SS", "SV", "UI", "UL", "US", "UV",
];

/// How sensitive a tag is by itself, regardless of its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSensitivity {
    Strict,
    Medium,
    Contextual,
}

impl FieldSensitivity {
    pub fn of(tag: Tag) -> Self {
        let keyword = tag.keyword().unwrap_or_default();
        if STRICT_KEYWORDS.contains(&keyword) {
            FieldSensitivity::Strict
        } else if MEDIUM_KEYWORDS.contains(&keyword) {
            FieldSensitivity::Medium
        } else {
            FieldSensitivity::Contextual
        }
    }

    pub fn bonus(self) -> f64 {
        match self {
            FieldSensitivity::Strict => 0.6,
            FieldSensitivity::Medium => 0.2,
            FieldSensitivity::Contextual => 0.0,
        }
    }
}

const STRICT_KEYWORDS: &[&str] = &[
    "PatientName",
    "PatientBirthDate",
    "OtherPatientIDs",
    "OtherPatientNames",
    "PatientComments",
    "ReferringPhysicianName",
    "PhysiciansOfRecord",
    "PerformingPhysicianName",
    "NameOfPhysiciansReadingStudy",
    "OperatorsName",
];

const MEDIUM_KEYWORDS: &[&str] = &[
    "PatientID",
    "EthnicGroup",
    "Occupation",
    "PatientAddress",
    "PatientBirthName",
    "PatientMotherBirthName",
];

/// Tags where person-name patterns are meaningful
const NAME_KEYWORDS: &[&str] = &[
    "PatientName",
    "OtherPatientNames",
    "PatientBirthName",
    "PatientMotherBirthName",
    "ReferringPhysicianName",
    "PhysiciansOfRecord",
    "PerformingPhysicianName",
    "NameOfPhysiciansReadingStudy",
    "OperatorsName",
    "RequestingPhysician",
];

/// Tags that routinely carry a scanner vendor's name
const VENDOR_KEYWORDS: &[&str] = &[
    "Manufacturer",
    "ManufacturerModelName",
    "StationName",
    "InstitutionName",
];

/// Header recognizer with field-sensitivity and pattern weighting
#[derive(Debug, Clone)]
pub struct HeaderRecognizer {
    suppress_institution_name: bool,
}

impl Default for HeaderRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderRecognizer {
    pub fn new() -> Self {
        Self {
            suppress_institution_name: true,
        }
    }

    /// Also inspect InstitutionName, which is skipped by default
    pub fn with_institution_name(mut self) -> Self {
        self.suppress_institution_name = false;
        self
    }

    fn skips(&self, element: &Element) -> bool {
        element.is_binary()
            || SKIPPED_VRS.contains(&element.vr.as_str())
            || (self.suppress_institution_name && element.tag == Tag::INSTITUTION_NAME)
    }

    fn inspect(&self, element: &Element, text: &str, source: &Path) -> Option<Finding> {
        let keyword = element.tag.keyword().unwrap_or_default();
        let sensitivity = FieldSensitivity::of(element.tag);
        let mut matches: Vec<(&'static str, f64)> = Vec::new();

        if sensitivity == FieldSensitivity::Strict
            && !text.to_lowercase().contains("anonymized")
            && !is_high_entropy(text)
        {
            matches.push(("strict high-risk tag", score_value(element, text, None)));
        }

        let names_allowed = NAME_KEYWORDS.contains(&keyword) || element.vr == "PN";
        if names_allowed && is_structured_name(text) {
            let class = PatternClass::StructuredName;
            matches.push((class.name(), score_value(element, text, Some(class))));
        } else {
            let vendor_context = VENDOR_KEYWORDS.contains(&keyword);
            for class in PatternClass::TEXT_CLASSES {
                if class == PatternClass::PersonName
                    && (!names_allowed || (vendor_context && is_allowed_vendor(text)))
                {
                    continue;
                }
                if class.regex().is_match(text) {
                    matches.push((class.name(), score_value(element, text, Some(class))));
                }
            }
        }

        if matches.is_empty() {
            return None;
        }
        let score = matches.iter().map(|(_, s)| *s).fold(0.0, f64::max);
        let labels: Vec<&str> = matches.iter().map(|(label, _)| *label).collect();
        Some(Finding::header(
            score,
            format!(
                "{} {} «{}»: {}",
                element.tag,
                element.path,
                displayable(text, MESSAGE_VALUE_CHARS),
                labels.join(", ")
            ),
            source,
        ))
    }
}

/// Score of one value, optionally given the pattern class that matched it
pub fn score_value(element: &Element, text: &str, class: Option<PatternClass>) -> f64 {
    if is_anonymized(text) {
        return BASE_SCORE;
    }

    let mut score = BASE_SCORE + FieldSensitivity::of(element.tag).bonus();
    if FREE_TEXT_VRS.contains(&element.vr.as_str()) {
        score += FREE_TEXT_BONUS;
    }
    if let Some(class) = class {
        score += class.weight();
        if class == PatternClass::PersonName && has_non_person_hint(text) {
            score -= JARGON_PENALTY;
        }
    }
    if element.vr == "PN"
        && !is_structured_name(text)
        && !PatternClass::PersonName.regex().is_match(text)
    {
        score -= UNNAMED_PN_PENALTY;
    }
    clamp_score(score)
}

/// Distinct non-blank values of an element, capped in length
fn candidate_texts(element: &Element) -> BTreeSet<String> {
    element
        .values
        .iter()
        .map(|value| value.replace('\0', ""))
        .map(|value| value.trim().chars().take(MAX_TEXT_CHARS).collect::<String>())
        .filter(|value| !value.is_empty())
        .collect()
}

impl Recognizer for HeaderRecognizer {
    fn name(&self) -> &'static str {
        "header"
    }

    fn recognize(&self, dataset: &Dataset, source: &Path) -> Result<Vec<Finding>, CheckError> {
        let mut findings = Vec::new();
        for element in dataset.elements() {
            if self.skips(element) {
                continue;
            }
            for text in candidate_texts(element) {
                if let Some(finding) = self.inspect(element, &text, source) {
                    findings.push(finding);
                }
            }
        }
        tracing::debug!(
            path = %source.display(),
            findings = findings.len(),
            "Header recognizer finished"
        );
        Ok(findings)
    }
}
