//! Info dictionary handling for the merged output.

use lopdf::{Dictionary, Document, Object};
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::options::DocMetadata;

/// Writes and reads document properties.
#[derive(Debug, Default)]
pub struct MetadataWriter;

impl MetadataWriter {
    /// Create a new metadata writer.
    pub fn new() -> Self {
        Self
    }

    /// Write metadata to a document's Info dictionary.
    ///
    /// Only set fields are written; Producer and the dates are always
    /// stamped. The metadata must already be validated.
    pub fn apply(&self, doc: &mut Document, metadata: &DocMetadata) -> Result<()> {
        metadata.validate()?;

        // Get or create the Info dictionary behind the trailer.
        let info_id =
            if let Ok(info_ref) = doc.trailer.get(b"Info").and_then(|i| i.as_reference()) {
                info_ref
            } else {
                let new_id = doc.new_object_id();
                doc.trailer.set("Info", Object::Reference(new_id));
                new_id
            };

        if !matches!(doc.get_object(info_id), Ok(Object::Dictionary(_))) {
            doc.objects
                .insert(info_id, Object::Dictionary(Dictionary::new()));
        }
        let info = match doc.get_object_mut(info_id) {
            Ok(Object::Dictionary(dict)) => dict,
            _ => {
                return Err(Error::other("Info dictionary could not be created"));
            }
        };

        for (key, value) in [
            ("Title", &metadata.title),
            ("Author", &metadata.author),
            ("Subject", &metadata.subject),
            ("Keywords", &metadata.keywords),
        ] {
            if let Some(value) = value {
                info.set(key, Object::string_literal(value.as_str()));
            }
        }

        info.set(
            "Producer",
            Object::string_literal(format!("pdfmeld {}", env!("CARGO_PKG_VERSION"))),
        );
        let date = format_pdf_date(SystemTime::now());
        info.set("CreationDate", Object::string_literal(date.as_str()));
        info.set("ModDate", Object::string_literal(date.as_str()));

        Ok(())
    }

    /// Read metadata back from a document's Info dictionary.
    pub fn read(&self, doc: &Document) -> DocMetadata {
        let Ok(info_ref) = doc.trailer.get(b"Info").and_then(|i| i.as_reference()) else {
            return DocMetadata::default();
        };
        let Ok(Object::Dictionary(info)) = doc.get_object(info_ref) else {
            return DocMetadata::default();
        };

        DocMetadata::new(
            string_field(info, b"Title"),
            string_field(info, b"Author"),
            string_field(info, b"Subject"),
            string_field(info, b"Keywords"),
        )
    }
}

fn string_field(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key) {
        Ok(Object::String(bytes, _)) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    }
}

/// Split a unix timestamp into approximate civil UTC fields
/// (year, month, day, hour, minute, second). Informational stamps only.
pub(crate) fn civil_utc(secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    let year = 1970 + (secs / 31_556_926);
    let remainder = secs % 31_556_926;
    let month = 1 + (remainder / 2_629_743).min(11);
    let day_remainder = remainder % 2_629_743;
    let day = 1 + (day_remainder / 86_400).min(30);
    let time_remainder = day_remainder % 86_400;
    (
        year,
        month,
        day,
        time_remainder / 3_600,
        (time_remainder % 3_600) / 60,
        time_remainder % 60,
    )
}

/// Format a time as a PDF date string, D:YYYYMMDDHHMMSSZ.
fn format_pdf_date(time: SystemTime) -> String {
    use std::time::UNIX_EPOCH;

    let secs = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let (year, month, day, hour, minute, second) = civil_utc(secs);
    format!("D:{year:04}{month:02}{day:02}{hour:02}{minute:02}{second:02}Z")
}
