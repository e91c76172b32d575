//! DICOM decoding through dicom-rs
//!
//! The rest of the pipeline depends only on [`DatasetLoader`], so tests can
//! swap in fixture loaders without producing real DICOM files.

use dicom_core::header::Header;
use dicom_core::value::{PrimitiveValue, Value};
use dicom_object::{InMemDicomObject, OpenFileOptions};
use std::path::Path;

use super::dataset::{decode_frames, Dataset, Element, Tag, BINARY_VRS};
use crate::error::LoadError;

/// Frames sampled per file for OCR
pub const DEFAULT_MAX_FRAMES: usize = 4;

/// Turns a file on disk into a [`Dataset`]
pub trait DatasetLoader: Send + Sync {
    /// Load metadata, and decoded frames when `with_pixels` is set
    fn load(&self, path: &Path, with_pixels: bool) -> Result<Dataset, LoadError>;
}

/// Loader for DICOM Part 10 files
#[derive(Debug, Clone)]
pub struct DicomFileLoader {
    max_frames: usize,
}

impl DicomFileLoader {
    pub fn new() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames.max(1);
        self
    }
}

impl Default for DicomFileLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetLoader for DicomFileLoader {
    fn load(&self, path: &Path, with_pixels: bool) -> Result<Dataset, LoadError> {
        let options = OpenFileOptions::new();
        let options = if with_pixels {
            options
        } else {
            options.read_until(dicom_core::Tag(0x7FE0, 0x0010))
        };
        let object = options
            .open_file(path)
            .map_err(|e| LoadError::InvalidDicom(e.to_string()))?;

        let mut dataset = Dataset::new();
        flatten(&object, "", 0, &mut dataset);

        if !with_pixels {
            return Ok(dataset);
        }

        // Header checks still run when the pixels cannot be rendered
        match (native_pixel_bytes(&object), dataset.pixel_layout()) {
            (Some(raw), Some(layout)) => match decode_frames(&raw, &layout, self.max_frames) {
                Ok(frames) => Ok(dataset.with_frames(frames)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot render pixel data");
                    Ok(dataset.with_pixel_error(e.to_string()))
                }
            },
            // Encapsulated (compressed) or absent pixel data has nothing to OCR
            _ => {
                tracing::debug!(path = %path.display(), "No native pixel data to render");
                Ok(dataset)
            }
        }
    }
}

/// Copy every element of `object` into `dataset`, recursing into sequences
pub fn flatten(object: &InMemDicomObject, prefix: &str, depth: usize, dataset: &mut Dataset) {
    for elem in object.iter() {
        let dicom_tag = elem.tag();
        let tag = Tag(dicom_tag.0, dicom_tag.1);
        let vr = elem.vr().to_string().to_owned();
        let path = if prefix.is_empty() {
            tag.name()
        } else {
            format!("{prefix}.{}", tag.name())
        };

        match elem.value() {
            Value::Sequence(sequence) => {
                for (idx, item) in sequence.items().iter().enumerate() {
                    flatten(item, &format!("{path}[{idx}]"), depth + 1, dataset);
                }
            }
            Value::PixelSequence(_) => {
                dataset.push(make_element(prefix, depth, tag, &vr, Vec::<String>::new()));
            }
            Value::Primitive(primitive) => {
                let values: Vec<String> = if BINARY_VRS.contains(&vr.as_str()) {
                    Vec::new()
                } else {
                    primitive.to_multi_str().iter().cloned().collect()
                };
                dataset.push(make_element(prefix, depth, tag, &vr, values));
            }
        }
    }
}

fn make_element(prefix: &str, depth: usize, tag: Tag, vr: &str, values: Vec<String>) -> Element {
    if prefix.is_empty() {
        Element::new(tag, vr, values)
    } else {
        Element::nested(prefix, depth, tag, vr, values)
    }
}

fn native_pixel_bytes(object: &InMemDicomObject) -> Option<Vec<u8>> {
    let elem = object
        .element(dicom_core::Tag(0x7FE0, 0x0010))
        .ok()?;
    match elem.value() {
        Value::Primitive(PrimitiveValue::Empty) => None,
        Value::Primitive(primitive) => Some(primitive.to_bytes().into_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{DataElement, VR};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flatten_copies_text_elements() {
        let object = InMemDicomObject::from_element_iter([
            DataElement::new(
                dicom_core::Tag(0x0010, 0x0010),
                VR::PN,
                PrimitiveValue::from("DOE^JOHN"),
            ),
            DataElement::new(
                dicom_core::Tag(0x0008, 0x0060),
                VR::CS,
                PrimitiveValue::from("MR"),
            ),
        ]);

        let mut dataset = Dataset::new();
        flatten(&object, "", 0, &mut dataset);

        assert_eq!(dataset.first_value(Tag::PATIENT_NAME), Some("DOE^JOHN"));
        assert_eq!(dataset.first_value(Tag::MODALITY), Some("MR"));
        assert_eq!(dataset.get(Tag::PATIENT_NAME).unwrap().vr, "PN");
    }

    #[test]
    fn test_garbage_file_is_invalid_dicom() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"This is not a DICOM file at all").unwrap();
        temp_file.flush().unwrap();

        let result = DicomFileLoader::new().load(temp_file.path(), true);
        assert!(matches!(result, Err(LoadError::InvalidDicom(_))));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = DicomFileLoader::new().load(Path::new("/tmp/no_such_file_xyz123.dcm"), false);
        assert!(result.is_err());
    }
}
