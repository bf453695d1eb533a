//! Common types used throughout the songplays ETL
//!
//! Input records as they appear in the source JSON, the rows of the five
//! derived tables, and the small enums shared by config and transforms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

// ============================================================================
// Input Records
// ============================================================================

/// One entry of the song catalog
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SongRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub song_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub artist_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub artist_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub artist_location: Option<String>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub artist_latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub artist_longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::int32")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub num_songs: Option<i64>,
}

/// One entry of the activity log
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub level: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub page: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub song: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub artist: Option<String>,
    #[serde(default)]
    pub ts: Option<RawTimestamp>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub session_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub user_agent: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub item_in_session: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub auth: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub method: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub registration: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub length: Option<f64>,
}

/// Page value marking an actual playback event
pub const NEXT_SONG_PAGE: &str = "NextSong";

impl LogRecord {
    /// Whether this record is a playback event
    pub fn is_playback(&self) -> bool {
        self.page.as_deref() == Some(NEXT_SONG_PAGE)
    }
}

/// Event timestamp as found in the log, before validation
///
/// Logs carry epoch milliseconds, but hand-edited or re-exported files
/// sometimes hold fractional or quoted values. Any other JSON value is kept
/// as `Invalid` so only the derivations that need `ts` drop the record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
    Invalid(serde_json::Value),
}

impl RawTimestamp {
    /// Resolve to epoch milliseconds
    pub fn epoch_millis(&self) -> std::result::Result<i64, String> {
        match self {
            Self::Millis(ms) => Ok(*ms),
            Self::Fractional(f) if f.is_finite() && f.abs() < 9.0e18 => Ok(f.trunc() as i64),
            Self::Fractional(f) => Err(format!("timestamp out of range: {f}")),
            Self::Text(s) => {
                let trimmed = s.trim();
                if let Ok(ms) = trimmed.parse::<i64>() {
                    return Ok(ms);
                }
                match trimmed.parse::<f64>() {
                    Ok(f) => Self::Fractional(f).epoch_millis(),
                    Err(_) => Err(format!("unparseable timestamp '{s}'")),
                }
            }
            Self::Invalid(value) => Err(format!("not a timestamp: {value}")),
        }
    }
}

impl From<i64> for RawTimestamp {
    fn from(ms: i64) -> Self {
        Self::Millis(ms)
    }
}

// ============================================================================
// Derived Rows
// ============================================================================

/// Row of the songs table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongRow {
    pub song_id: String,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub year: Option<i32>,
    pub duration: Option<f64>,
}

/// Row of the artists table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistRow {
    pub artist_id: String,
    pub artist_name: Option<String>,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
}

/// Row of the users table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRow {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

/// Row of the time table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRow {
    pub start_time: DateTime<Utc>,
    pub hour: u32,
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: u32,
}

/// Row of the songplays table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongplayRow {
    pub songplay_id: i64,
    pub start_time: DateTime<Utc>,
    pub user_id: Option<String>,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub year: i32,
    pub month: u32,
}

// ============================================================================
// Tables
// ============================================================================

/// The five output tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Songs,
    Artists,
    Users,
    Time,
    Songplays,
}

impl TableName {
    /// All tables in write order
    pub const ALL: [TableName; 5] = [
        Self::Songs,
        Self::Artists,
        Self::Users,
        Self::Time,
        Self::Songplays,
    ];

    /// Destination directory under the output root
    pub fn directory(self) -> &'static str {
        match self {
            Self::Songs => "songs_table",
            Self::Artists => "artists_table",
            Self::Users => "users_table",
            Self::Time => "time_table",
            Self::Songplays => "songplays_table",
        }
    }

    /// Columns whose values decide the partition directory
    pub fn partition_columns(self) -> &'static [&'static str] {
        match self {
            Self::Songs => &["year", "artist_id"],
            Self::Time | Self::Songplays => &["year", "month"],
            Self::Artists | Self::Users => &[],
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Songs => "songs",
            Self::Artists => "artists",
            Self::Users => "users",
            Self::Time => "time",
            Self::Songplays => "songplays",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Conventions
// ============================================================================

/// Numbering used for the `weekday` column of the time table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekdayConvention {
    /// 1 = Sunday ... 7 = Saturday
    #[default]
    SundayFirst,
    /// ISO-8601: 1 = Monday ... 7 = Sunday
    Iso,
}

/// How a table destination is replaced on write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteMode {
    /// Everything under the destination is replaced
    #[default]
    Static,
    /// Only partitions present in the new output are replaced
    Dynamic,
}

// ============================================================================
// Lenient field decoding
// ============================================================================

/// Field deserializers that tolerate the type drift found in raw exports.
///
/// Values of the wrong shape decode to `None` instead of rejecting the record.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn int32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
        Ok(int(d)?.and_then(|v| i32::try_from(v).ok()))
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }
}
