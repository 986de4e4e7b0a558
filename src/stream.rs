//! Stream documents
//!
//! A stream is a scheduled live event. Box-office streams are unlocked by
//! redeeming a code instead of paying at checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// Artwork reference
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageData {
    /// Image location
    #[serde(default)]
    pub url: Option<String>,
}

/// A live-streamed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    /// Stream identifier
    #[serde(rename = "streamId", default)]
    pub id: Option<String>,

    /// Display title
    #[serde(default)]
    pub title: Option<String>,

    /// Scheduled start
    #[serde(default, deserialize_with = "lenient_date")]
    pub start_date: Option<DateTime<Utc>>,

    /// Scheduled end
    #[serde(default, deserialize_with = "lenient_date")]
    pub end_date: Option<DateTime<Utc>>,

    /// When the stream becomes visible in listings
    #[serde(default, deserialize_with = "lenient_date")]
    pub visible_date: Option<DateTime<Utc>>,

    /// Venue hosting the event
    #[serde(default)]
    pub venue_id: Option<String>,

    /// Headlining artist
    #[serde(default)]
    pub artist_id: Option<String>,

    /// Long-form listing text
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub images: Vec<ImageData>,

    /// External ticket vendor page
    #[serde(default)]
    pub ticket_url: Option<String>,

    /// Genre tags, in listing order
    #[serde(default)]
    pub genres: Vec<String>,

    /// Access is granted by redemption code
    #[serde(default)]
    pub is_box_office: bool,

    /// Live event (as opposed to a replay)
    #[serde(rename = "isLive", default = "default_true")]
    pub is_live_event_type: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Stream {
    fn default() -> Self {
        Self {
            id: None,
            title: None,
            start_date: None,
            end_date: None,
            visible_date: None,
            venue_id: None,
            artist_id: None,
            description: None,
            images: Vec::new(),
            ticket_url: None,
            genres: Vec::new(),
            is_box_office: false,
            is_live_event_type: default_true(),
        }
    }
}

// Dates that fail to parse are treated as absent rather than failing the
// whole document.
fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .ok()
    }))
}

impl Stream {
    /// Create a stream with just an id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Decode a stream document
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Whether a ticket vendor page is set
    pub fn has_ticket_url(&self) -> bool {
        self.ticket_url.is_some()
    }

    /// First artwork url, if any
    pub fn artwork_url(&self) -> Option<&str> {
        self.images.first().and_then(|i| i.url.as_deref())
    }

    /// Whether the stream is on air at `now`
    ///
    /// Requires both a start and an end date; bounds are inclusive.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= now && now <= end,
            _ => false,
        }
    }

    /// Whether the stream is on air right now
    pub fn is_live(&self) -> bool {
        self.is_live_at(Utc::now())
    }

    /// Whether the stream's schedule overlaps `[start, end)`
    pub fn is_live_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        match (self.start_date, self.end_date) {
            (Some(event_start), Some(event_end)) => start <= event_end && event_start < end,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap()
    }

    fn scheduled(start: u32, end: u32) -> Stream {
        Stream {
            start_date: Some(at(start)),
            end_date: Some(at(end)),
            ..Stream::with_id("s1")
        }
    }

    #[test]
    fn test_decode_document() {
        let stream = Stream::from_json(
            br#"{
                "streamId": "s1",
                "title": "Late Show",
                "startDate": "2024-05-01T20:00:00Z",
                "endDate": "2024-05-01T22:00:00+00:00",
                "genres": ["jazz"],
                "images": [{"url": "https://img/1.jpg"}],
                "ticketUrl": "https://tickets/1",
                "isBoxOffice": true
            }"#,
        )
        .unwrap();

        assert_eq!(stream.id.as_deref(), Some("s1"));
        assert_eq!(stream.start_date, Some(at(20)));
        assert_eq!(stream.end_date, Some(at(22)));
        assert_eq!(stream.genres, vec!["jazz"]);
        assert_eq!(stream.artwork_url(), Some("https://img/1.jpg"));
        assert!(stream.has_ticket_url());
        assert!(stream.is_box_office);
        assert!(stream.is_live_event_type);
    }

    #[test]
    fn test_decode_defaults_and_bad_dates() {
        let stream =
            Stream::from_json(br#"{"startDate": "tomorrow", "isLive": false}"#).unwrap();

        assert!(stream.id.is_none());
        assert!(stream.start_date.is_none());
        assert!(stream.genres.is_empty());
        assert!(!stream.is_box_office);
        assert!(!stream.is_live_event_type);
        assert!(!stream.has_ticket_url());
    }

    #[test]
    fn test_default_matches_empty_document() {
        let decoded = Stream::from_json(b"{}").unwrap();

        assert_eq!(Stream::default(), decoded);
        assert!(Stream::default().is_live_event_type);
        assert!(Stream::with_id("s1").is_live_event_type);
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(Stream::from_json(b"[1, 2]").is_err());
    }

    #[test]
    fn test_is_live_at() {
        let stream = scheduled(20, 22);

        assert!(!stream.is_live_at(at(19)));
        assert!(stream.is_live_at(at(20)));
        assert!(stream.is_live_at(at(21)));
        assert!(stream.is_live_at(at(22)));
        assert!(!stream.is_live_at(at(23)));
    }

    #[test]
    fn test_is_live_needs_both_dates() {
        let stream = Stream {
            start_date: Some(at(20)),
            ..Stream::with_id("s1")
        };
        assert!(!stream.is_live_at(at(21)));
        assert!(!stream.is_live_between(at(0), at(23)));
    }

    #[test]
    fn test_is_live_between() {
        let stream = scheduled(20, 22);

        assert!(stream.is_live_between(at(21), at(23)));
        assert!(stream.is_live_between(at(18), at(21)));
        assert!(stream.is_live_between(at(22), at(23)));
        // Window ending exactly at the start does not overlap
        assert!(!stream.is_live_between(at(18), at(20)));
        assert!(!stream.is_live_between(at(23), at(23)));
    }
}
