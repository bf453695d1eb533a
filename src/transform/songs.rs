//! Songs and artists tables

use super::non_blank;
use crate::types::{ArtistRow, SongRecord, SongRow};
use std::collections::HashSet;

/// Derive both catalog tables from the same records
pub fn derive_songs_and_artists(records: &[SongRecord]) -> (Vec<SongRow>, Vec<ArtistRow>) {
    (derive_songs(records), derive_artists(records))
}

/// One row per distinct `song_id`; the first catalog entry wins
pub fn derive_songs(records: &[SongRecord]) -> Vec<SongRow> {
    let mut seen = HashSet::new();

    records
        .iter()
        .filter_map(|r| non_blank(r.song_id.as_deref()).map(|id| (id, r)))
        .filter(|(id, _)| seen.insert(*id))
        .map(|(id, r)| SongRow {
            song_id: id.to_string(),
            title: r.title.clone(),
            artist_id: non_blank(r.artist_id.as_deref()).map(String::from),
            year: r.year,
            duration: r.duration,
        })
        .collect()
}

/// One row per distinct `artist_id`; the first catalog entry wins
pub fn derive_artists(records: &[SongRecord]) -> Vec<ArtistRow> {
    let mut seen = HashSet::new();

    records
        .iter()
        .filter_map(|r| non_blank(r.artist_id.as_deref()).map(|id| (id, r)))
        .filter(|(id, _)| seen.insert(*id))
        .map(|(id, r)| ArtistRow {
            artist_id: id.to_string(),
            artist_name: r.artist_name.clone(),
            artist_location: r.artist_location.clone(),
            artist_latitude: r.artist_latitude,
            artist_longitude: r.artist_longitude,
        })
        .collect()
}
