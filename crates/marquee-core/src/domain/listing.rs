use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::UtcDateTime;

/// Hyperlink attached to a screening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// Presentation details for one screening, as listed by the venue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningInfo {
    pub title: String,
    /// Qualifier shown after the title, e.g. "in 35mm".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subhed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

/// One showtime as scraped from a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Showtime {
    pub id: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: UtcDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<UtcDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub screening: ScreeningInfo,
    /// Raw title as the venue printed it, before any enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_hint: Option<Duration>,
}

impl Showtime {
    pub fn new(id: impl Into<String>, summary: impl Into<String>, start_time: UtcDateTime) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            description: None,
            start_time,
            end_time: None,
            location: None,
            screening: ScreeningInfo::default(),
            title_hint: None,
            director_hint: None,
            runtime_hint: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_end_time(mut self, end_time: UtcDateTime) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_screening(mut self, screening: ScreeningInfo) -> Self {
        self.screening = screening;
        self
    }
}

/// A single event in a listing stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingItem {
    pub showtime: Showtime,
    /// Pagination token for resuming after this item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_anchor: Option<String>,
}

impl ListingItem {
    pub fn new(showtime: Showtime) -> Self {
        Self {
            showtime,
            next_anchor: None,
        }
    }

    pub fn with_next_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.next_anchor = Some(anchor.into());
        self
    }

    /// Key used to order items across sources.
    pub fn ordering_key(&self) -> UtcDateTime {
        self.showtime.start_time
    }
}

impl From<Showtime> for ListingItem {
    fn from(showtime: Showtime) -> Self {
        Self::new(showtime)
    }
}
