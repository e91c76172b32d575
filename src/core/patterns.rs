//! PHI/PII pattern classes shared by the header and pixel recognizers

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A family of identifiers we look for in text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PatternClass {
    Email,
    Phone,
    Ssn,
    MedicalRecordNumber,
    DateOfBirth,
    Address,
    PersonName,
    StructuredName,
    Url,
}

impl PatternClass {
    /// Classes matched by regex against free text
    pub const TEXT_CLASSES: [PatternClass; 8] = [
        PatternClass::Email,
        PatternClass::Phone,
        PatternClass::Ssn,
        PatternClass::MedicalRecordNumber,
        PatternClass::DateOfBirth,
        PatternClass::Address,
        PatternClass::PersonName,
        PatternClass::Url,
    ];

    /// Score contribution when this class matches
    pub fn weight(self) -> f64 {
        match self {
            PatternClass::Email | PatternClass::Phone | PatternClass::Ssn => 0.5,
            PatternClass::MedicalRecordNumber
            | PatternClass::DateOfBirth
            | PatternClass::Address => 0.35,
            PatternClass::StructuredName => 0.3,
            PatternClass::PersonName => 0.2,
            PatternClass::Url => 0.15,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PatternClass::Email => "EMAIL",
            PatternClass::Phone => "PHONE",
            PatternClass::Ssn => "SSN",
            PatternClass::MedicalRecordNumber => "MRN",
            PatternClass::DateOfBirth => "DOB",
            PatternClass::Address => "ADDRESS",
            PatternClass::PersonName => "NAME",
            PatternClass::StructuredName => "PN_STRUCTURED",
            PatternClass::Url => "URL",
        }
    }

    /// Regex for the class; structured names use [`is_structured_name`]
    pub fn regex(self) -> &'static Regex {
        match self {
            PatternClass::StructuredName => &*PN_STRUCTURED,
            other => &TEXT_PATTERNS[&other],
        }
    }
}

impl fmt::Display for PatternClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

lazy_static! {
    static ref TEXT_PATTERNS: HashMap<PatternClass, Regex> = {
        let mut m = HashMap::new();
        m.insert(
            PatternClass::Email,
            Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").unwrap(),
        );
        m.insert(
            PatternClass::Phone,
            Regex::new(r"\b(?:\+?\d{1,3}[-.\s]?)?(?:\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4})\b").unwrap(),
        );
        m.insert(PatternClass::Ssn, Regex::new(r"\b\d{3}[- ]?\d{2}[- ]?\d{4}\b").unwrap());
        m.insert(
            PatternClass::MedicalRecordNumber,
            Regex::new(r"(?i)\b(?:MRN|Med(?:ical)?\s*Record)\s*[:#]?\s*[A-Z0-9\-]{3,}\b").unwrap(),
        );
        m.insert(
            PatternClass::DateOfBirth,
            Regex::new(r"(?i)(?:DOB|Birth\s*Date)\s*[:#]?\s*\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4}").unwrap(),
        );
        m.insert(
            PatternClass::Address,
            Regex::new(
                r"\b\d{1,5}\s+(?:[A-Z][a-z]+\s+){1,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way)\b",
            )
            .unwrap(),
        );
        m.insert(
            PatternClass::PersonName,
            Regex::new(r"\b[A-Z][a-z]+(?:[-'][A-Z][a-z]+)?\s+[A-Z][a-z]+\b").unwrap(),
        );
        m.insert(PatternClass::Url, Regex::new(r"(?i)\bhttps?://\S+").unwrap());
        m
    };

    /// DICOM person names in caret form, e.g. `DOE^JOHN` or `SMITH^ANNE^Q`
    static ref PN_STRUCTURED: Regex =
        Regex::new(r"^[A-Z0-9]{2,}(?:[-'][A-Z0-9]+)*(?:\^[A-Z0-9]+(?:[-'][A-Z0-9]+)*)+$").unwrap();

    /// Values that are already de-identified placeholders
    static ref ANONYMIZED: Vec<Regex> = vec![
        Regex::new(r"(?i)^(ANON|ANONYMOUS|REDACTED|REMOVED|UNKNOWN|N/A|null|NA)$").unwrap(),
        Regex::new(r"(?i)^PATIENT\^TEST$").unwrap(),
        Regex::new(r"(?i)^(TEST|DEMO|SYNTHETIC|DUMMY)$").unwrap(),
    ];

    /// Imaging jargon that looks like a name to the name pattern
    static ref NON_PERSON_HINTS: Regex =
        Regex::new(r"(?i)\b(AXIAL|CORONAL|SAGITTAL|T1|T2|FLAIR|AX|COR|SAG|SE|GRE|B-VALUE|ADC)\b").unwrap();

    static ref NON_ALNUM: Regex = Regex::new(r"[^A-Za-z0-9]+").unwrap();
}

/// Scanner vendors whose names are never treated as person names
const VENDOR_ALLOW_LIST: &[&str] = &[
    "SIEMENS",
    "SIEMENS MEDICAL SYSTEMS",
    "GE",
    "GE HEALTHCARE",
    "GE MEDICAL SYSTEMS",
    "PHILIPS",
    "PHILIPS MEDICAL SYSTEMS",
    "CANON MEDICAL",
    "AGFA",
    "FUJIFILM",
    "VARIAN",
    "HITACHI",
];

pub fn is_structured_name(text: &str) -> bool {
    PN_STRUCTURED.is_match(text)
}

pub fn is_anonymized(text: &str) -> bool {
    ANONYMIZED.iter().any(|rx| rx.is_match(text))
}

pub fn has_non_person_hint(text: &str) -> bool {
    NON_PERSON_HINTS.is_match(text)
}

/// Uppercase, punctuation collapsed to single spaces
pub fn normalize_for_vendor_match(text: &str) -> String {
    NON_ALNUM.replace_all(text, " ").trim().to_uppercase()
}

pub fn is_allowed_vendor(text: &str) -> bool {
    let normalized = normalize_for_vendor_match(text);
    VENDOR_ALLOW_LIST.contains(&normalized.as_str())
}

/// Random-looking strings (tokens, hashes, pseudonymous IDs)
///
/// Normalized Shannon entropy above 0.85 with at least four distinct
/// characters.
pub fn is_high_entropy(text: &str) -> bool {
    let length = text.chars().count();
    if length < 3 {
        return false;
    }
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in text.chars() {
        *counts.entry(c).or_insert(0) += 1;
    }
    if counts.len() < 4 {
        return false;
    }

    let entropy: f64 = counts
        .values()
        .map(|&count| {
            let p = count as f64 / length as f64;
            -p * p.log2()
        })
        .sum();
    let max_entropy = (counts.len() as f64).log2();
    max_entropy > 0.0 && entropy / max_entropy > 0.85
}

/// Every text class that matches somewhere in `text`
pub fn matching_classes(text: &str) -> Vec<PatternClass> {
    PatternClass::TEXT_CLASSES
        .iter()
        .copied()
        .filter(|class| class.regex().is_match(text))
        .collect()
}

/// Cut `text` to `max` characters, marking the cut with an ellipsis
pub fn displayable(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}…")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Contact: john.doe@example.com", PatternClass::Email ; "email")]
    #[test_case("Call (555) 123-4567", PatternClass::Phone ; "phone")]
    #[test_case("SSN 123-45-6789", PatternClass::Ssn ; "ssn")]
    #[test_case("MRN: A12345", PatternClass::MedicalRecordNumber ; "mrn")]
    #[test_case("DOB: 04/12/1961", PatternClass::DateOfBirth ; "dob")]
    #[test_case("lives at 42 Elm Street", PatternClass::Address ; "address")]
    #[test_case("Seen by John Smith", PatternClass::PersonName ; "name")]
    #[test_case("see https://example.org/p/1", PatternClass::Url ; "url")]
    fn test_text_classes_match(text: &str, class: PatternClass) {
        assert!(matching_classes(text).contains(&class), "{class} should match {text:?}");
    }

    #[test]
    fn test_plain_text_matches_nothing() {
        assert!(matching_classes("prostate mri").is_empty());
    }

    #[test]
    fn test_structured_names() {
        assert!(is_structured_name("DOE^JOHN"));
        assert!(is_structured_name("SMITH^ANNE^Q"));
        assert!(!is_structured_name("Doe^John"));
        assert!(!is_structured_name("DOE"));
    }

    #[test]
    fn test_anonymized_placeholders() {
        assert!(is_anonymized("ANONYMOUS"));
        assert!(is_anonymized("patient^test"));
        assert!(!is_anonymized("DOE^JOHN"));
    }

    #[test]
    fn test_high_entropy() {
        assert!(is_high_entropy("a8F3kQ9zL1"));
        assert!(!is_high_entropy("aaaaab"));
        assert!(!is_high_entropy("ab"));
    }

    #[test]
    fn test_vendor_allow_list() {
        assert!(is_allowed_vendor("Siemens Medical Systems"));
        assert!(is_allowed_vendor("GE-Healthcare"));
        assert!(!is_allowed_vendor("Jane Doe"));
    }

    #[test]
    fn test_displayable_truncates() {
        assert_eq!(displayable("abcdef", 3), "abc…");
        assert_eq!(displayable("abc", 3), "abc");
    }
}
