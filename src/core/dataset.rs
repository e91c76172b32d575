//! In-memory view of a decoded imaging file
//!
//! Recognizers and validators only see this model, never the DICOM decoder,
//! which keeps them testable with hand-built datasets.

use dicom_core::dictionary::DataDictionary;
use dicom_dictionary_std::StandardDataDictionary;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LoadError;

/// A DICOM attribute tag `(group,element)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(pub u16, pub u16);

impl Tag {
    pub const MODALITY: Tag = Tag(0x0008, 0x0060);
    pub const INSTITUTION_NAME: Tag = Tag(0x0008, 0x0080);
    pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
    pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
    pub const PLANAR_CONFIGURATION: Tag = Tag(0x0028, 0x0006);
    pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
    pub const ROWS: Tag = Tag(0x0028, 0x0010);
    pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
    pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
    pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
    pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

    /// Keyword from the standard data dictionary
    pub fn keyword(self) -> Option<&'static str> {
        let dictionary: &'static StandardDataDictionary = &StandardDataDictionary;
        dictionary
            .by_tag(dicom_core::Tag(self.0, self.1))
            .map(|entry| entry.alias)
    }

    /// Keyword if known, otherwise `gggg,eeee`
    pub fn name(self) -> String {
        match self.keyword() {
            Some(keyword) => keyword.to_string(),
            None => format!("{:04X},{:04X}", self.0, self.1),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

impl FromStr for Tag {
    type Err = String;

    /// Accepts `0010,0010` or `(0010,0010)`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        let (group, element) = trimmed
            .split_once(',')
            .ok_or_else(|| format!("tag '{s}' must look like 'gggg,eeee'"))?;
        let parse = |part: &str| {
            let part = part.trim();
            if part.len() != 4 {
                return Err(format!("tag '{s}' must use four hex digits per part"));
            }
            u16::from_str_radix(part, 16).map_err(|e| format!("tag '{s}': {e}"))
        };
        Ok(Tag(parse(group)?, parse(element)?))
    }
}

impl TryFrom<String> for Tag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        format!("{:04X},{:04X}", tag.0, tag.1)
    }
}

/// Value representations that carry raw bytes rather than text
pub const BINARY_VRS: &[&str] = &["OB", "OW", "OF", "OD", "OL", "OV", "UN"];

/// One attribute, flattened out of any enclosing sequences
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: Tag,
    pub vr: String,
    /// Keyword path such as `ReferencedImageSequence[0].ReferencedSOPInstanceUID`
    pub path: String,
    /// Nesting depth; zero for top-level attributes
    pub depth: usize,
    pub values: Vec<String>,
}

impl Element {
    /// Top-level element; values are stripped of DICOM padding
    pub fn new<I, S>(tag: Tag, vr: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tag,
            vr: vr.to_string(),
            path: tag.name(),
            depth: 0,
            values: values
                .into_iter()
                .map(|v| strip_padding(v.as_ref()).to_string())
                .collect(),
        }
    }

    /// Element found inside a sequence item
    pub fn nested<I, S>(parent_path: &str, depth: usize, tag: Tag, vr: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut element = Self::new(tag, vr, values);
        element.path = format!("{parent_path}.{}", tag.name());
        element.depth = depth;
        element
    }

    pub fn is_binary(&self) -> bool {
        BINARY_VRS.contains(&self.vr.as_str())
    }

    /// True when there is no non-whitespace text in any value
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| v.trim().is_empty())
    }

    /// Multi-valued attributes joined with the DICOM backslash delimiter
    pub fn joined(&self) -> String {
        self.values.join("\\")
    }
}

/// Remove DICOM even-length padding (trailing spaces and NULs)
pub fn strip_padding(value: &str) -> &str {
    value.trim_end_matches([' ', '\0'])
}

/// An 8-bit grayscale rendition of one image frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Metadata and (optionally) rendered frames of one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    elements: Vec<Element>,
    frames: Vec<Frame>,
    /// Why pixel data could not be rendered, when it could not
    pixel_error: Option<String>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: Vec<Element>) -> Self {
        Self {
            elements,
            ..Self::default()
        }
    }

    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = frames;
        self
    }

    /// Record that pixel data exists but could not be rendered
    pub fn with_pixel_error(mut self, error: impl Into<String>) -> Self {
        self.frames.clear();
        self.pixel_error = Some(error.into());
        self
    }

    pub fn pixel_error(&self) -> Option<&str> {
        self.pixel_error.as_deref()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Top-level element with the given tag
    pub fn get(&self, tag: Tag) -> Option<&Element> {
        self.elements
            .iter()
            .find(|e| e.depth == 0 && e.tag == tag)
    }

    /// First value of a top-level element
    pub fn first_value(&self, tag: Tag) -> Option<&str> {
        self.get(tag)
            .and_then(|e| e.values.first())
            .map(String::as_str)
    }

    fn number(&self, tag: Tag) -> Option<u32> {
        self.first_value(tag).and_then(|v| v.trim().parse().ok())
    }

    /// Pixel geometry declared by the image pixel module, if complete
    pub fn pixel_layout(&self) -> Option<PixelLayout> {
        Some(PixelLayout {
            rows: self.number(Tag::ROWS)?,
            columns: self.number(Tag::COLUMNS)?,
            bits_allocated: self.number(Tag::BITS_ALLOCATED)?,
            samples_per_pixel: self.number(Tag::SAMPLES_PER_PIXEL).unwrap_or(1),
            frames: self.number(Tag::NUMBER_OF_FRAMES).unwrap_or(1).max(1),
            signed: self.number(Tag::PIXEL_REPRESENTATION) == Some(1),
            planar: self.number(Tag::PLANAR_CONFIGURATION) == Some(1),
        })
    }
}

/// Geometry needed to slice native pixel data into frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    pub rows: u32,
    pub columns: u32,
    pub bits_allocated: u32,
    pub samples_per_pixel: u32,
    pub frames: u32,
    pub signed: bool,
    /// Colour samples stored plane by plane (R..., G..., B...)
    pub planar: bool,
}

impl PixelLayout {
    fn frame_bytes(&self) -> usize {
        self.rows as usize
            * self.columns as usize
            * self.samples_per_pixel as usize
            * (self.bits_allocated as usize / 8)
    }
}

/// Evenly spaced frame indexes, at most `max` of them
pub fn sample_indices(total: usize, max: usize) -> Vec<usize> {
    if total <= max {
        return (0..total).collect();
    }
    let step = (total / max).max(1);
    (0..max).map(|i| i * step).collect()
}

/// Slice native (uncompressed, little-endian) pixel data into 8-bit frames
pub fn decode_frames(
    raw: &[u8],
    layout: &PixelLayout,
    max_frames: usize,
) -> Result<Vec<Frame>, LoadError> {
    if layout.bits_allocated != 8 && layout.bits_allocated != 16 {
        return Err(LoadError::UnsupportedPixels(format!(
            "{} bits allocated",
            layout.bits_allocated
        )));
    }
    if layout.samples_per_pixel != 1 && layout.samples_per_pixel != 3 {
        return Err(LoadError::UnsupportedPixels(format!(
            "{} samples per pixel",
            layout.samples_per_pixel
        )));
    }
    let frame_bytes = layout.frame_bytes();
    if frame_bytes == 0 {
        return Err(LoadError::UnsupportedPixels("empty frame geometry".to_string()));
    }
    let available = (raw.len() / frame_bytes).min(layout.frames as usize);
    if available == 0 {
        return Err(LoadError::UnsupportedPixels(format!(
            "{} bytes of pixel data is less than one {}x{} frame",
            raw.len(),
            layout.columns,
            layout.rows
        )));
    }

    let frames = sample_indices(available, max_frames)
        .into_iter()
        .map(|index| {
            let chunk = &raw[index * frame_bytes..(index + 1) * frame_bytes];
            Frame {
                index,
                width: layout.columns,
                height: layout.rows,
                pixels: to_gray8(chunk, layout),
            }
        })
        .collect();
    Ok(frames)
}

fn to_gray8(chunk: &[u8], layout: &PixelLayout) -> Vec<u8> {
    let samples: Vec<i32> = if layout.bits_allocated == 8 {
        chunk.iter().map(|&b| i32::from(b)).collect()
    } else {
        chunk
            .chunks_exact(2)
            .map(|pair| {
                let raw = u16::from_le_bytes([pair[0], pair[1]]);
                if layout.signed {
                    i32::from(raw as i16)
                } else {
                    i32::from(raw)
                }
            })
            .collect()
    };

    let luminance: Vec<i32> = if layout.samples_per_pixel == 3 && layout.planar {
        let plane = samples.len() / 3;
        (0..plane)
            .map(|i| luma(samples[i], samples[plane + i], samples[2 * plane + i]))
            .collect()
    } else if layout.samples_per_pixel == 3 {
        samples
            .chunks_exact(3)
            .map(|rgb| luma(rgb[0], rgb[1], rgb[2]))
            .collect()
    } else {
        samples
    };

    if layout.bits_allocated == 8 && !layout.signed {
        return luminance.into_iter().map(|v| v.clamp(0, 255) as u8).collect();
    }

    let min = luminance.iter().copied().min().unwrap_or(0);
    let max = luminance.iter().copied().max().unwrap_or(0);
    let range = (max - min).max(1) as i64;
    luminance
        .into_iter()
        .map(|v| ((i64::from(v - min) * 255) / range) as u8)
        .collect()
}

fn luma(r: i32, g: i32, b: i32) -> i32 {
    (299 * r + 587 * g + 114 * b) / 1000
}
