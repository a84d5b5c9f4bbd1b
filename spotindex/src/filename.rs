//! Meter-reading image filename parsing.
//!
//! Image files are named with a fixed-width prefix followed by anything at
//! all (usually an extension):
//!
//! ```text
//! 01012024AB123456123456789.jpg
//! └──┬───┘└──┬───┘└───┬───┘
//!  date    device   consumer id
//! [0,8)    [8,16)   [16,25)
//! ```
//!
//! - **Date**: capture date as `DDMMYYYY`
//! - **Device**: meter-reader (MRU) code, kept verbatim
//! - **Consumer id**: the primary lookup key
//!
//! Offsets are counted in characters, not bytes. Names shorter than
//! [`MIN_NAME_LEN`] characters are not image names. The consumer id slice is
//! clipped at the end of the name, so a 23-character name yields a 7-character
//! id rather than being rejected.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Minimum number of characters for a name to be parsed.
pub const MIN_NAME_LEN: usize = 23;

const DATE_RANGE: (usize, usize) = (0, 8);
const DEVICE_RANGE: (usize, usize) = (8, 16);
const CONSUMER_RANGE: (usize, usize) = (16, 25);

/// Fields decoded from an image filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName {
    /// Capture date (raw `DDMMYYYY`, possibly unparsable).
    pub capture_date: CaptureDate,
    /// Device / meter-reader code.
    pub device_code: String,
    /// Consumer id.
    pub consumer_id: String,
}

/// Parse an image filename into its fixed-width fields.
///
/// Returns `None` when the name has fewer than [`MIN_NAME_LEN`] characters.
/// Nothing else is validated here: a date that isn't a real calendar date is
/// kept as an opaque [`CaptureDate`].
///
/// # Examples
///
/// ```
/// use spotindex::filename::parse_image_filename;
///
/// let name = parse_image_filename("01012024AB123456123456789.jpg").unwrap();
/// assert_eq!(name.capture_date.as_str(), "01012024");
/// assert_eq!(name.device_code, "AB123456");
/// assert_eq!(name.consumer_id, "123456789");
///
/// assert!(parse_image_filename("short.jpg").is_none());
/// ```
pub fn parse_image_filename(name: &str) -> Option<ImageName> {
    if name.chars().count() < MIN_NAME_LEN {
        return None;
    }

    Some(ImageName {
        capture_date: CaptureDate::new(char_slice(name, DATE_RANGE)),
        device_code: char_slice(name, DEVICE_RANGE).to_string(),
        consumer_id: char_slice(name, CONSUMER_RANGE).to_string(),
    })
}

/// Check whether a caller-supplied consumer id has the canonical 9-digit form.
pub fn is_valid_consumer_id(candidate: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[0-9]{9}$").unwrap())
        .is_match(candidate)
}

/// Slice `s` by character offsets, clipping both ends to the string length.
fn char_slice(s: &str, (start, end): (usize, usize)) -> &str {
    let mut boundaries = s
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()));
    let begin = boundaries.nth(start).unwrap_or(s.len());
    let finish = boundaries.nth(end - start - 1).unwrap_or(s.len());
    &s[begin..finish]
}

/// A capture date as found in a filename.
///
/// The raw string is always preserved. When it is a valid `DDMMYYYY` date it
/// also carries the parsed calendar date, which drives ordering: parsed dates
/// order chronologically and unparsable ones sort after every parsed date.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CaptureDate {
    raw: String,
    date: Option<NaiveDate>,
}

impl CaptureDate {
    /// Create a capture date from its raw `DDMMYYYY` form.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let date = parse_ddmmyyyy(&raw);
        Self { raw, date }
    }

    /// The raw string as it appeared in the filename.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The calendar date, if the raw string is a valid `DDMMYYYY` date.
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Human-readable form, e.g. `01-Jan-2024`, or the raw string if the
    /// date doesn't parse.
    pub fn display(&self) -> String {
        match self.date {
            Some(date) => date.format("%d-%b-%Y").to_string(),
            None => self.raw.clone(),
        }
    }
}

fn parse_ddmmyyyy(raw: &str) -> Option<NaiveDate> {
    // chrono accepts unpadded fields, the filename format does not
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%d%m%Y").ok()
}

impl From<String> for CaptureDate {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for CaptureDate {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<CaptureDate> for String {
    fn from(date: CaptureDate) -> Self {
        date.raw
    }
}

impl PartialEq for CaptureDate {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for CaptureDate {}

impl Hash for CaptureDate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl Ord for CaptureDate {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.date, other.date) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.raw.cmp(&other.raw)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.raw.cmp(&other.raw),
        }
    }
}

impl PartialOrd for CaptureDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CaptureDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
