//! Table derivations
//!
//! Pure functions from the two raw record sets to the five output tables.
//! Every step is an explicit filter, projection, join or dedup over slices
//! of typed records, so the logic runs without any storage attached.
//!
//! | Table     | Filter                         | Dedup key            |
//! |-----------|--------------------------------|----------------------|
//! | songs     | `song_id` present              | `song_id`, first seen |
//! | artists   | `artist_id` present            | `artist_id`, first seen |
//! | users     | NextSong, `userId` present     | `userId`, last seen  |
//! | time      | NextSong, `ts` valid           | `start_time`         |
//! | songplays | NextSong, catalog match, `ts` valid | none            |

mod songplays;
mod songs;
mod time;
mod users;

pub use songplays::{derive_songplays, SongCatalogIndex, SurrogateIds};
pub use songs::{derive_artists, derive_songs, derive_songs_and_artists};
pub use time::{derive_time, start_time_from_millis, time_row, weekday_number};
pub use users::derive_users;

/// Rows produced by a derivation plus the records it had to skip
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation<T> {
    /// Output rows in deterministic order
    pub rows: Vec<T>,
    /// Input records rejected as malformed
    pub skipped: usize,
}

impl<T> Derivation<T> {
    /// Wrap rows with nothing skipped
    pub fn new(rows: Vec<T>) -> Self {
        Self { rows, skipped: 0 }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Treat empty and whitespace-only keys the same as missing ones
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
