use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Utc};

pub const NAME_PREFIX: &str = "doodle-";
pub const EXTENSION: &str = ".png";
pub const MIME_TYPE: &str = "image/png";
const DATA_URI_PREFIX: &str = "data:image/png;base64,";

// Accepts unpadded input and stray low bits so garbage never fails the upload.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doodle {
    /// Backend id: the filename on disk, or the Drive file id.
    pub id: String,
    pub name: String,
    pub url: String,
}

impl Doodle {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_created_at(&self.name)
    }
}

pub fn generate_name(now: DateTime<Utc>) -> String {
    format!("{NAME_PREFIX}{}{EXTENSION}", now.timestamp_millis())
}

pub fn parse_created_at(name: &str) -> Option<DateTime<Utc>> {
    let millis = name.strip_prefix(NAME_PREFIX)?.strip_suffix(EXTENSION)?;
    DateTime::from_timestamp_millis(millis.parse().ok()?)
}

/// The only guard against path traversal on the local backend.
pub fn is_valid_filename(name: &str) -> bool {
    name.ends_with(EXTENSION) && !name.contains("..")
}

/// Plain string sort, descending. Names embed the upload time so this is
/// newest first without ever comparing timestamps.
pub fn sort_newest_first(doodles: &mut [Doodle]) {
    doodles.sort_by(|a, b| b.name.cmp(&a.name).then_with(|| b.id.cmp(&a.id)));
}

/// Strips the data-URI prefix and decodes whatever base64 is left.
/// Characters outside the alphabet are skipped, so malformed input yields
/// corrupt bytes rather than an error.
pub fn decode_image_data(image_data: &str) -> Vec<u8> {
    let encoded = image_data.strip_prefix(DATA_URI_PREFIX).unwrap_or(image_data);
    let mut cleaned: String = encoded
        .chars()
        .filter_map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '+' | '/' => Some(c),
            '-' => Some('+'),
            '_' => Some('/'),
            _ => None,
        })
        .collect();
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }
    LENIENT.decode(cleaned.as_bytes()).unwrap_or_default()
}
