//! # Domain Models
//!
//! Value types shared by every source and cache.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`UtcDateTime`] | UTC timestamp, the merge ordering key |
//! | [`QueryWindow`] | Time bounds, limit and pagination anchor for a fetch |
//! | [`Showtime`] | One screening as listed by a venue |
//! | [`ListingItem`] | Stream element: a showtime plus its continuation anchor |

mod listing;
mod timestamp;
mod window;

pub use listing::{Link, ListingItem, ScreeningInfo, Showtime};
pub use timestamp::UtcDateTime;
pub use window::{QueryWindow, DEFAULT_LIMIT};
