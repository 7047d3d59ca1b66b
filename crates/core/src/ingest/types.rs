use crate::domain::rating::RawRatingEvent;
use serde::{Deserialize, Serialize};

/// Page envelope returned by the upstream ratings API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingsPage {
    pub items: Vec<RawRatingEvent>,
    #[serde(default)]
    pub next_page: String,
}

impl RatingsPage {
    /// Pagination ends on an empty page or an empty cursor, whichever comes first.
    pub fn is_last(&self) -> bool {
        self.items.is_empty() || self.next_page.is_empty()
    }
}
