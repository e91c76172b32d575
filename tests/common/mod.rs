//! Shared fixtures for integration tests
//!
//! Datasets are written as text, one element per line:
//! `gggg,eeee VR value1\value2`. A file containing `CORRUPT` fails to load
//! and one containing `SLEEP` takes two seconds to load. [`write_dicom`]
//! turns the same text into a real DICOM Part 10 file.

#![allow(dead_code)]

use dicom_core::value::PrimitiveValue;
use dicom_core::{DataElement, VR};
use dicom_object::mem::InMemElement;
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
use dicom_validator_rs::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// An MR file that satisfies every built-in requirement and carries no PHI/PII
pub const CLEAN_MR: &str = r"0008,0008 CS ORIGINAL\PRIMARY\AXIAL
0008,0016 UI 1.2.840.10008.5.1.4.1.1.4
0008,0018 UI 1.2.3.4.5.6
0008,0020 DA 20240101
0008,0022 DA 20240101
0008,0023 DA 20240101
0008,0032 TM 101500
0008,0033 TM 101500
0008,0060 CS MR
0008,0070 LO SIEMENS
0008,1090 LO Skyra
0008,103E LO T2 AXIAL
0010,0010 PN ANONYMOUS
0018,0050 DS 3.0
0018,1020 LO syngo MR E11
0020,000D UI 1.2.3.4
0020,000E UI 1.2.3.4.1
0020,0011 IS 5
0020,0013 IS 1
0020,0032 DS -100.5\-120.25\30
0020,0037 DS 1\0\0\0\1\0
0020,0052 UI 1.2.3.4.2
0028,0004 CS MONOCHROME2
0028,0010 US 512
0028,0011 US 512
0028,0030 DS 0.5\0.5
0028,0100 US 16
0028,0101 US 12
0028,0102 US 11
0028,0103 US 0
0028,1050 DS 40
0028,1051 DS 400
";

/// [`CLEAN_MR`] with lines replaced (same tag) or appended
pub fn clean_mr_with(overrides: &[&str]) -> String {
    let tag_of = |line: &str| line.split_whitespace().next().unwrap_or("").to_string();
    let override_tags: Vec<String> = overrides.iter().map(|l| tag_of(l)).collect();
    let mut lines: Vec<String> = CLEAN_MR
        .lines()
        .filter(|line| !override_tags.contains(&tag_of(line)))
        .map(str::to_string)
        .collect();
    lines.extend(overrides.iter().map(|l| l.to_string()));
    lines.join("\n")
}

/// Reads the text fixture format
pub struct TextFixtureLoader;

impl DatasetLoader for TextFixtureLoader {
    fn load(&self, path: &Path, _with_pixels: bool) -> Result<Dataset, LoadError> {
        let text = fs::read_to_string(path)?;
        if text.contains("CORRUPT") {
            return Err(LoadError::InvalidDicom("fixture marked corrupt".to_string()));
        }
        if text.contains("SLEEP") {
            thread::sleep(Duration::from_secs(2));
        }

        let mut dataset = Dataset::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let mut parts = line.splitn(3, ' ');
            let (Some(tag), Some(vr)) = (parts.next(), parts.next()) else {
                continue;
            };
            let tag: Tag = tag
                .parse()
                .map_err(|e: String| LoadError::InvalidDicom(e))?;
            let values: Vec<&str> = parts.next().unwrap_or("").split('\\').collect();
            dataset.push(Element::new(tag, vr, values));
        }
        Ok(dataset)
    }
}

/// Write `files` (relative path, content) under a fresh temporary root
pub fn tree(files: &[(&str, &str)]) -> TempDir {
    let root = TempDir::new().unwrap();
    for (relative, content) in files {
        let path = root.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
    }
    root
}

pub fn config(root: &Path, recognizer: &str, concurrency: usize) -> ScanConfig {
    let mut config = ScanConfig::new(root);
    config.recognizer = recognizer.to_string();
    config.concurrency = concurrency;
    config.ocr = None;
    config
}

pub fn scan_with(config: &ScanConfig) -> ScanOutcome {
    config
        .build_scanner(Arc::new(TextFixtureLoader))
        .unwrap()
        .scan(&config.root)
        .unwrap()
}

pub fn scan(root: &Path, recognizer: &str, concurrency: usize) -> ScanOutcome {
    scan_with(&config(root, recognizer, concurrency))
}

pub fn markdown(report: &Report) -> String {
    let mut out = Vec::new();
    dicom_validator_rs::reporting::report_writer::write_markdown(report, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

pub fn stopped_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    flag.store(true, Ordering::SeqCst);
    flag
}

pub fn record<'a>(outcome: &'a ScanOutcome, file: &str) -> &'a FileRecord {
    outcome
        .records
        .iter()
        .find(|r| r.file == file)
        .unwrap_or_else(|| panic!("no record for {file}"))
}

/// Explicit VR Little Endian
pub const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";

/// [`CLEAN_MR`] with lines replaced or appended, minus lines for `removed` tags
pub fn clean_mr_edit(overrides: &[&str], removed: &[&str]) -> String {
    clean_mr_with(overrides)
        .lines()
        .filter(|line| !removed.iter().any(|tag| line.starts_with(tag)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn to_element(line: &str) -> InMemElement {
    let mut parts = line.splitn(3, ' ');
    let tag: Tag = parts.next().unwrap().parse().unwrap();
    let vr: VR = parts.next().unwrap().parse().unwrap();
    let values = parts.next().unwrap_or("").split('\\');
    let value = match vr {
        VR::US => PrimitiveValue::U16(values.map(|v| v.parse().unwrap()).collect()),
        VR::UL => PrimitiveValue::U32(values.map(|v| v.parse().unwrap()).collect()),
        _ => PrimitiveValue::Strs(values.map(str::to_string).collect()),
    };
    DataElement::new(dicom_core::Tag(tag.0, tag.1), vr, value)
}

/// Write the text fixture `text` as a DICOM file at `root/relative`
pub fn write_dicom(root: &Path, relative: &str, text: &str, pixels: Option<&[u8]>) {
    let mut elements: Vec<_> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(to_element)
        .collect();
    if let Some(pixels) = pixels {
        elements.push(DataElement::new(
            dicom_core::Tag(0x7FE0, 0x0010),
            VR::OB,
            PrimitiveValue::U8(pixels.iter().copied().collect()),
        ));
    }
    let object = InMemDicomObject::from_element_iter(elements);
    let sop_class = object
        .element(dicom_core::Tag(0x0008, 0x0016))
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let sop_instance = object
        .element(dicom_core::Tag(0x0008, 0x0018))
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let file = object
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(EXPLICIT_VR_LE)
                .media_storage_sop_class_uid(sop_class)
                .media_storage_sop_instance_uid(sop_instance),
        )
        .unwrap();

    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    file.write_to_file(&path).unwrap();
}

/// Scan `root` with the real DICOM loader
pub fn scan_dicom(root: &Path, recognizer: &str) -> ScanOutcome {
    let config = config(root, recognizer, 2);
    config
        .build_scanner(Arc::new(DicomFileLoader::new()))
        .unwrap()
        .scan(root)
        .unwrap()
}
