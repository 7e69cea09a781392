use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::domain::comments::CommentId;
use crate::error::CoreError;

/// Opaque pagination token: base64 of the decimal comment id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor(CommentId);

impl Cursor {
    pub fn comment_id(self) -> CommentId {
        self.0
    }

    pub fn encode(self) -> String {
        STANDARD.encode(self.0.to_string())
    }
}

impl From<CommentId> for Cursor {
    fn from(id: CommentId) -> Self {
        Cursor(id)
    }
}

impl TryFrom<&str> for Cursor {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidCursor("empty cursor".to_string()));
        }
        let bytes = STANDARD
            .decode(trimmed)
            .map_err(|_| CoreError::InvalidCursor(trimmed.to_string()))?;
        let text =
            std::str::from_utf8(&bytes).map_err(|_| CoreError::InvalidCursor(trimmed.to_string()))?;
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidCursor(trimmed.to_string()));
        }
        let id: CommentId = text
            .parse()
            .map_err(|_| CoreError::InvalidCursor(trimmed.to_string()))?;
        if id <= 0 {
            return Err(CoreError::InvalidCursor(trimmed.to_string()));
        }
        Ok(Cursor(id))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::Cursor;
    use crate::error::CoreError;

    #[test]
    fn encodes_decimal_text() {
        assert_eq!(Cursor::from(11).encode(), "MTE=");
        assert_eq!(Cursor::from(11).to_string(), "MTE=");
    }

    #[test]
    fn decode_round_trips() {
        for id in [1, 9, 10, 12345, i64::MAX] {
            let encoded = Cursor::from(id).encode();
            let decoded = Cursor::try_from(encoded.as_str()).unwrap();
            assert_eq!(decoded.comment_id(), id);
        }
    }

    #[test]
    fn rejects_malformed_input() {
        let inputs = [
            "",
            "   ",
            "not base64!",
            "YWJj",     // "abc"
            "LTE=",     // "-1"
            "MA==",     // "0"
            "KzE=",     // "+1"
            "MSAy",     // "1 2"
            "OTk5OTk5OTk5OTk5OTk5OTk5OTk=", // overflows i64
            "/w==",     // invalid utf-8
        ];
        for input in inputs {
            let err = Cursor::try_from(input).unwrap_err();
            assert!(
                matches!(err, CoreError::InvalidCursor(_)),
                "expected invalid cursor for {input:?}"
            );
        }
    }
}
