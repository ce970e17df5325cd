//! Opaque keyset-pagination cursors.
//!
//! A cursor pins the `(created_at, id)` position of the last item the client
//! has seen; listings resume strictly after it. The encoding is opaque to
//! clients: base64 over `"<micros>:<uuid>"`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("cursor is not valid base64")]
    Encoding,
    #[error("cursor payload is malformed")]
    Malformed,
}

/// Decoded keyset position for a descending `(created_at, id)` listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl PageCursor {
    #[must_use]
    pub const fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        Self { created_at, id }
    }

    /// Encodes the cursor into its opaque wire form.
    #[must_use]
    pub fn encode(&self) -> String {
        let raw = format!("{}:{}", self.created_at.timestamp_micros(), self.id);
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Decodes a wire cursor.
    ///
    /// # Errors
    /// Returns [`CursorError`] when the input is not base64 or the payload
    /// does not carry a `micros:uuid` pair.
    pub fn decode(raw: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw.as_bytes())
            .map_err(|_| CursorError::Encoding)?;
        let text = String::from_utf8(bytes).map_err(|_| CursorError::Malformed)?;

        let (micros, id) = text.split_once(':').ok_or(CursorError::Malformed)?;
        let micros: i64 = micros.parse().map_err(|_| CursorError::Malformed)?;
        let created_at =
            DateTime::<Utc>::from_timestamp_micros(micros).ok_or(CursorError::Malformed)?;
        let id = Uuid::parse_str(id).map_err(|_| CursorError::Malformed)?;

        Ok(Self { created_at, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round_trips_through_wire_form() {
        let cursor = PageCursor::new(
            Utc.with_ymd_and_hms(2025, 4, 30, 16, 45, 12).unwrap(),
            Uuid::new_v4(),
        );

        let encoded = cursor.encode();
        let decoded = PageCursor::decode(&encoded).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn rejects_garbage_input() {
        assert_eq!(PageCursor::decode("%%%"), Err(CursorError::Encoding));

        let not_a_pair = URL_SAFE_NO_PAD.encode("just-some-text");
        assert_eq!(
            PageCursor::decode(&not_a_pair),
            Err(CursorError::Malformed)
        );

        let bad_uuid = URL_SAFE_NO_PAD.encode("1714495512000000:not-a-uuid");
        assert_eq!(PageCursor::decode(&bad_uuid), Err(CursorError::Malformed));
    }

    #[test]
    fn preserves_microsecond_ordering() {
        let id = Uuid::new_v4();
        let earlier = PageCursor::new(
            DateTime::<Utc>::from_timestamp_micros(1_714_495_512_000_001).unwrap(),
            id,
        );
        let later = PageCursor::new(
            DateTime::<Utc>::from_timestamp_micros(1_714_495_512_000_002).unwrap(),
            id,
        );

        let earlier = PageCursor::decode(&earlier.encode()).unwrap();
        let later = PageCursor::decode(&later.encode()).unwrap();
        assert!(earlier.created_at < later.created_at);
    }
}
