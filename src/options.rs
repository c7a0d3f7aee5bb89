//! Output options: compression levels, document metadata, page selections.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How aggressively the merged document is compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Leave streams as imported.
    None,
    /// Compress content streams only.
    Fast,
    /// Compress content streams (default).
    #[default]
    Normal,
    /// Compress and drop unreachable objects.
    High,
    /// Compress, drop unreachable objects, renumber densely.
    Maximum,
}

impl CompressionLevel {
    /// Whether any compression work happens at this level.
    pub fn is_enabled(&self) -> bool {
        *self != Self::None
    }

    /// Whether unreachable objects are pruned at this level.
    pub fn prunes_objects(&self) -> bool {
        matches!(self, Self::High | Self::Maximum)
    }
}

impl FromStr for CompressionLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "fast" => Ok(Self::Fast),
            "normal" | "default" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "maximum" | "max" => Ok(Self::Maximum),
            _ => Err(Error::other(format!(
                "invalid compression level: '{s}' (expected none, fast, normal, high, maximum)"
            ))),
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Fast => "fast",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Maximum => "maximum",
        };
        write!(f, "{name}")
    }
}

/// Maximum accepted length for a metadata field, after trimming.
const METADATA_FIELD_MAX: usize = 512;

/// Document properties written to the merged output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetadata {
    /// Document title.
    pub title: Option<String>,
    /// Document author.
    pub author: Option<String>,
    /// Document subject.
    pub subject: Option<String>,
    /// Comma-separated keywords.
    pub keywords: Option<String>,
}

impl DocMetadata {
    /// Build metadata, trimming whitespace and dropping empty fields.
    pub fn new(
        title: Option<String>,
        author: Option<String>,
        subject: Option<String>,
        keywords: Option<String>,
    ) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            title: clean(title),
            author: clean(author),
            subject: clean(subject),
            keywords: clean(keywords),
        }
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.subject.is_none()
            && self.keywords.is_none()
    }

    /// Check field lengths and reject control characters.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("title", &self.title),
            ("author", &self.author),
            ("subject", &self.subject),
            ("keywords", &self.keywords),
        ] {
            if let Some(v) = value {
                if v.len() > METADATA_FIELD_MAX {
                    return Err(Error::InvalidMetadata {
                        message: format!(
                            "{name} exceeds {METADATA_FIELD_MAX} bytes ({} given)",
                            v.len()
                        ),
                    });
                }
                if v.chars().any(|c| c.is_control()) {
                    return Err(Error::InvalidMetadata {
                        message: format!("{name} contains control characters"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A set of 1-based page intervals, e.g. parsed from "1-3,7,9-12".
///
/// Intervals are kept sorted, disjoint, and inclusive. Bounds are checked
/// against a concrete page count only by [`PageSelection::validate_against`];
/// parsing accepts any positive interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSelection {
    intervals: Vec<(u32, u32)>,
}

impl PageSelection {
    /// Parse a selection from a comma-separated interval list.
    ///
    /// Accepts single pages (`"7"`) and inclusive spans (`"2-5"`).
    /// Rejects empty input, page zero, reversed spans, and anything
    /// non-numeric. Overlapping or adjacent intervals are coalesced.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(Error::InvalidSelection {
                message: "empty page selection".to_string(),
            });
        }

        let mut intervals = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(Error::InvalidSelection {
                    message: format!("empty interval in '{spec}'"),
                });
            }

            let (start, end) = match part.split_once('-') {
                Some((a, b)) => (Self::parse_page(a)?, Self::parse_page(b)?),
                None => {
                    let page = Self::parse_page(part)?;
                    (page, page)
                }
            };

            if start > end {
                return Err(Error::InvalidSelection {
                    message: format!("reversed interval '{part}'"),
                });
            }
            intervals.push((start, end));
        }

        intervals.sort_unstable();

        // Coalesce overlapping and adjacent intervals.
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(intervals.len());
        for (start, end) in intervals {
            match merged.last_mut() {
                Some((_, last_end)) if start <= last_end.saturating_add(1) => {
                    *last_end = (*last_end).max(end);
                }
                _ => merged.push((start, end)),
            }
        }

        Ok(Self { intervals: merged })
    }

    fn parse_page(s: &str) -> Result<u32> {
        let s = s.trim();
        let page: u32 = s.parse().map_err(|_| Error::InvalidSelection {
            message: format!("invalid page number '{s}'"),
        })?;
        if page == 0 {
            return Err(Error::InvalidSelection {
                message: "page numbers start at 1".to_string(),
            });
        }
        Ok(page)
    }

    /// The sorted disjoint intervals.
    pub fn intervals(&self) -> &[(u32, u32)] {
        &self.intervals
    }

    /// Highest page referenced by the selection.
    pub fn max_page(&self) -> u32 {
        self.intervals.last().map(|&(_, end)| end).unwrap_or(0)
    }

    /// Whether a page is selected.
    pub fn contains(&self, page: u32) -> bool {
        self.intervals
            .iter()
            .any(|&(start, end)| page >= start && page <= end)
    }

    /// Enumerate selected pages in ascending order.
    pub fn pages(&self) -> Vec<u32> {
        self.intervals
            .iter()
            .flat_map(|&(start, end)| start..=end)
            .collect()
    }

    /// Number of selected pages.
    pub fn page_count(&self) -> usize {
        self.intervals
            .iter()
            .map(|&(start, end)| (end - start + 1) as usize)
            .sum()
    }

    /// Reject the selection if any interval exceeds the document.
    ///
    /// Out-of-range intervals are an error here, never clamped.
    pub fn validate_against(&self, total_pages: usize) -> Result<()> {
        let max = self.max_page();
        if max as usize > total_pages {
            return Err(Error::InvalidSelection {
                message: format!(
                    "selection references page {max} but the document has {total_pages} pages"
                ),
            });
        }
        Ok(())
    }
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .intervals
            .iter()
            .map(|&(start, end)| {
                if start == end {
                    start.to_string()
                } else {
                    format!("{start}-{end}")
                }
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for PageSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Everything that shapes the merged output file.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Destination path of the merged PDF.
    pub destination: PathBuf,
    /// Compression level applied after the merge.
    pub compression: CompressionLevel,
    /// Document properties for the output.
    pub metadata: DocMetadata,
    /// Optional user password; applied as the last transformation.
    pub password: Option<String>,
}

impl OutputOptions {
    /// Options with defaults for everything but the destination.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            compression: CompressionLevel::default(),
            metadata: DocMetadata::default(),
            password: None,
        }
    }

    /// Validate the option set before a merge is scheduled.
    pub fn validate(&self) -> Result<()> {
        if self.destination.as_os_str().is_empty() {
            return Err(Error::other("output destination is empty"));
        }
        self.metadata.validate()?;
        if let Some(pw) = &self.password {
            if pw.is_empty() {
                return Err(Error::other("password must not be empty when set"));
            }
        }
        Ok(())
    }
}
