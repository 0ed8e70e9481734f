use chrono::{DateTime, Utc};
use std::borrow::Cow;

/// One complete line read from the watched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    /// Byte offset of the first byte of this line in the file.
    pub offset: u64,
    pub read_at: DateTime<Utc>,
}

/// Decode raw line bytes without ever failing.
///
/// Valid UTF-8 is taken as-is. Anything else is decoded as ISO-8859-2, the
/// encoding the game client writes, which maps every byte to a character.
pub fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => {
            let decoded: Cow<'_, str> = encoding_rs::ISO_8859_2
                .decode_without_bom_handling(bytes)
                .0;
            decoded.into_owned()
        }
    }
}
