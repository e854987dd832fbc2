//! Best-effort structural probes for the formats the catalogue knows about.
//!
//! Every guard is a pure predicate over raw bytes. A guard may reject an
//! unusual but valid document; it never panics and never has side effects.

use serde::Deserialize;
use std::fmt;
use xml::reader::{EventReader, XmlEvent};

/// Input family a group of mutators targets.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FormatFamily {
    Plaintext,
    Csv,
    Json,
    Xml,
    Jpeg,
    /// ELF executables, PDF documents and any other opaque binary container.
    Binary,
}

impl FormatFamily {
    pub const ALL: [FormatFamily; 6] = [
        FormatFamily::Plaintext,
        FormatFamily::Csv,
        FormatFamily::Json,
        FormatFamily::Xml,
        FormatFamily::Jpeg,
        FormatFamily::Binary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatFamily::Plaintext => "plaintext",
            FormatFamily::Csv => "csv",
            FormatFamily::Json => "json",
            FormatFamily::Xml => "xml",
            FormatFamily::Jpeg => "jpeg",
            FormatFamily::Binary => "binary",
        }
    }
}

impl fmt::Display for FormatFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks the most specific family whose guard accepts `bytes`.
///
/// Binary magic numbers are checked first since they are the cheapest and least
/// ambiguous, then the text formats from strictest to loosest.
pub fn detect(bytes: &[u8]) -> FormatFamily {
    if is_jpeg(bytes) {
        FormatFamily::Jpeg
    } else if is_elf(bytes) || is_pdf(bytes) {
        FormatFamily::Binary
    } else if is_json(bytes) {
        FormatFamily::Json
    } else if is_xml(bytes) {
        FormatFamily::Xml
    } else if is_csv(bytes) {
        FormatFamily::Csv
    } else {
        FormatFamily::Plaintext
    }
}

pub fn is_json(bytes: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(bytes).is_ok()
}

/// UTF-8 tabular text with at least two rows and at least two fields in the first row.
pub fn is_csv(bytes: &[u8]) -> bool {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut rows = 0usize;
    for (i, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                if i == 0 && record.len() < 2 {
                    return false;
                }
                rows += 1;
            }
            Err(_) => return false,
        }
    }
    rows >= 2
}

/// A complete, well-formed XML document with a root element.
pub fn is_xml(bytes: &[u8]) -> bool {
    for event in EventReader::new(bytes) {
        match event {
            Ok(XmlEvent::EndDocument) => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
    false
}

/// A JPEG stream with a frame header, a start-of-scan marker and a trailing end-of-image marker.
pub fn is_jpeg(bytes: &[u8]) -> bool {
    jpeg_layout(bytes).is_some() && bytes.ends_with(&[0xFF, JPEG_EOI])
}

pub fn is_elf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"\x7fELF")
}

/// A `%PDF-` header with a `%%EOF` trailer in the last kilobyte.
pub fn is_pdf(bytes: &[u8]) -> bool {
    if !bytes.starts_with(b"%PDF-") {
        return false;
    }
    let tail = &bytes[bytes.len().saturating_sub(1024)..];
    tail.windows(5).any(|w| w == b"%%EOF")
}

const JPEG_SOI: u8 = 0xD8;
const JPEG_EOI: u8 = 0xD9;
pub(crate) const JPEG_SOS: u8 = 0xDA;

/// Offsets of the segments a JPEG mutator needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JpegLayout {
    /// Offset of the first frame header's `FF Cx` marker.
    pub frame: usize,
    /// Offset of the first `FF DA` start-of-scan marker.
    pub scan: usize,
}

impl JpegLayout {
    /// Offset of the 16-bit big-endian image height within the frame header.
    pub fn height_offset(&self) -> usize {
        self.frame + 5
    }

    /// Offset of the 16-bit big-endian image width within the frame header.
    pub fn width_offset(&self) -> usize {
        self.frame + 7
    }
}

fn is_frame_marker(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

/// Walks the marker segments from SOI up to SOS.
///
/// Returns `None` if the header is truncated, a length field is inconsistent,
/// EOI shows up before any scan, or no frame header precedes the scan.
pub(crate) fn jpeg_layout(bytes: &[u8]) -> Option<JpegLayout> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != JPEG_SOI {
        return None;
    }
    let mut pos = 2;
    let mut frame = None;
    loop {
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        // Fill bytes may pad any marker.
        while *bytes.get(pos + 1)? == 0xFF {
            pos += 1;
        }
        let marker_at = pos;
        let marker = bytes[pos + 1];
        match marker {
            JPEG_SOS => {
                return frame.map(|frame| JpegLayout {
                    frame,
                    scan: marker_at,
                });
            }
            JPEG_EOI | JPEG_SOI | 0x00 => return None,
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            _ => {}
        }
        let len = usize::from(u16::from_be_bytes([*bytes.get(pos + 2)?, *bytes.get(pos + 3)?]));
        if len < 2 || pos + 2 + len > bytes.len() {
            return None;
        }
        if is_frame_marker(marker) && frame.is_none() {
            // Marker, length, precision, height, width, component count.
            if len < 8 {
                return None;
            }
            frame = Some(marker_at);
        }
        pos += 2 + len;
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    /// A structurally valid baseline JPEG skeleton: SOI, APP0, SOF0 (height 16,
    /// width 32, one component), SOS, two bytes of entropy data and EOI.
    pub(crate) fn tiny_jpeg() -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        // APP0 "JFIF"
        out.extend_from_slice(&[
            0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01,
            0x00, 0x01, 0x00, 0x00,
        ]);
        // SOF0: len 11, precision 8, height 16, width 32, 1 component
        out.extend_from_slice(&[
            0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x00, 0x10, 0x00, 0x20, 0x01, 0x01, 0x11, 0x00,
        ]);
        // SOS: len 8, 1 component
        out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
        out.extend_from_slice(&[0x12, 0x34]);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::tiny_jpeg;
    use super::*;

    #[test]
    fn json_guard_accepts_documents_and_scalars() {
        assert!(is_json(br#"{"a": [1, 2.5, "x"]}"#));
        assert!(is_json(b"42"));
        assert!(!is_json(b"{\"a\": "));
        assert!(!is_json(b""));
    }

    #[test]
    fn csv_guard_requires_two_rows_and_two_columns() {
        assert!(is_csv(b"a,b\n1,2\n"));
        assert!(!is_csv(b"a,b\n"));
        assert!(!is_csv(b"a\nb\n"));
        assert!(!is_csv(b"a,\xff\n1,2\n"));
    }

    #[test]
    fn xml_guard_requires_complete_document() {
        assert!(is_xml(b"<root><a href=\"x\">t</a></root>"));
        assert!(!is_xml(b"<root><a></root>"));
        assert!(!is_xml(b"plain words"));
        assert!(!is_xml(b""));
    }

    #[test]
    fn jpeg_guard_walks_segments() {
        let jpeg = tiny_jpeg();
        assert!(is_jpeg(&jpeg));
        let layout = jpeg_layout(&jpeg).unwrap();
        assert_eq!(&jpeg[layout.frame..layout.frame + 2], &[0xFF, 0xC0]);
        assert_eq!(&jpeg[layout.scan..layout.scan + 2], &[0xFF, 0xDA]);
        assert_eq!(
            u16::from_be_bytes([jpeg[layout.width_offset()], jpeg[layout.width_offset() + 1]]),
            32
        );

        let truncated = &jpeg[..jpeg.len() - 2];
        assert!(!is_jpeg(truncated));
        assert!(!is_jpeg(b"\xFF\xD8\xFF\xD9"));
        assert!(!is_jpeg(b"not a jpeg"));
    }

    #[test]
    fn binary_magic_guards() {
        assert!(is_elf(b"\x7fELF\x02\x01\x01"));
        assert!(!is_elf(b"ELF"));
        assert!(is_pdf(b"%PDF-1.7\n1 0 obj\nendobj\n%%EOF\n"));
        assert!(!is_pdf(b"%PDF-1.7\n"));
    }

    #[test]
    fn guards_are_stable_across_calls() {
        let bad = b"{not json";
        let first = is_json(bad);
        assert_eq!(first, is_json(bad));
        assert_eq!(is_csv(bad), is_csv(bad));
        assert_eq!(is_xml(bad), is_xml(bad));
    }

    #[test]
    fn detect_prefers_specific_families() {
        assert_eq!(detect(&tiny_jpeg()), FormatFamily::Jpeg);
        assert_eq!(detect(b"\x7fELF\x02"), FormatFamily::Binary);
        assert_eq!(detect(br#"[1, 2]"#), FormatFamily::Json);
        assert_eq!(detect(b"<a/>"), FormatFamily::Xml);
        assert_eq!(detect(b"x,y\n1,2\n"), FormatFamily::Csv);
        assert_eq!(detect(b"hello"), FormatFamily::Plaintext);
    }
}
