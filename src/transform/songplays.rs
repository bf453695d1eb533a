//! Songplays table
//!
//! Playback events inner-joined to the song catalog on exact, case-sensitive
//! `(artist_name, title) == (artist, song)`.

use super::time::start_time_from_millis;
use super::{non_blank, Derivation};
use crate::types::{LogRecord, SongRecord, SongplayRow};
use chrono::Datelike;
use std::collections::{HashMap, HashSet};

/// Sequential surrogate ids for one pipeline run
///
/// Ids are dense and start at zero, so identical input yields identical ids.
/// They carry no meaning across runs.
#[derive(Debug, Clone, Default)]
pub struct SurrogateIds {
    next: i64,
}

impl SurrogateIds {
    /// Start a new sequence at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id
    pub fn next_id(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Catalog entries keyed by `(artist_name, title)`
///
/// Entries are deduplicated on `song_id` first, so a song repeated across
/// catalog files joins once.
#[derive(Debug, Default)]
pub struct SongCatalogIndex<'a> {
    by_artist_title: HashMap<(&'a str, &'a str), Vec<&'a SongRecord>>,
}

impl<'a> SongCatalogIndex<'a> {
    /// Index a catalog
    pub fn build(songs: &'a [SongRecord]) -> Self {
        let mut seen_ids = HashSet::new();
        let mut by_artist_title: HashMap<_, Vec<&SongRecord>> = HashMap::new();

        for song in songs {
            if let Some(id) = non_blank(song.song_id.as_deref()) {
                if !seen_ids.insert(id) {
                    continue;
                }
            }
            let (Some(artist), Some(title)) = (song.artist_name.as_deref(), song.title.as_deref())
            else {
                continue;
            };
            by_artist_title.entry((artist, title)).or_default().push(song);
        }

        Self { by_artist_title }
    }

    /// Catalog entries for an artist and title
    pub fn lookup<'b>(&'b self, artist: &'b str, title: &'b str) -> &'b [&'a SongRecord] {
        self.by_artist_title
            .get(&(artist, title))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct `(artist, title)` keys
    pub fn len(&self) -> usize {
        self.by_artist_title.len()
    }

    /// Whether the index has no keys
    pub fn is_empty(&self) -> bool {
        self.by_artist_title.is_empty()
    }
}

/// One row per playback event and matching catalog entry
///
/// Events without a catalog match produce no row. Matched events whose `ts`
/// can't be resolved are skipped and counted.
pub fn derive_songplays(
    logs: &[LogRecord],
    songs: &[SongRecord],
    ids: &mut SurrogateIds,
) -> Derivation<SongplayRow> {
    let index = SongCatalogIndex::build(songs);
    let mut derivation = Derivation::new(Vec::new());

    for record in logs.iter().filter(|r| r.is_playback()) {
        let (Some(artist), Some(title)) = (record.artist.as_deref(), record.song.as_deref()) else {
            continue;
        };

        let matches = index.lookup(artist, title);
        if matches.is_empty() {
            continue;
        }

        let start_time = record
            .ts
            .as_ref()
            .and_then(|raw| raw.epoch_millis().ok())
            .and_then(start_time_from_millis);
        let Some(start_time) = start_time else {
            tracing::debug!(artist, title, "Skipping matched event with missing or malformed ts");
            derivation.skipped += 1;
            continue;
        };

        for song in matches {
            derivation.rows.push(SongplayRow {
                songplay_id: ids.next_id(),
                start_time,
                user_id: non_blank(record.user_id.as_deref()).map(String::from),
                level: record.level.clone(),
                song_id: song.song_id.clone(),
                artist_id: song.artist_id.clone(),
                session_id: record.session_id,
                location: song.artist_location.clone(),
                user_agent: record.user_agent.clone(),
                year: start_time.year(),
                month: start_time.month(),
            });
        }
    }

    derivation
}
