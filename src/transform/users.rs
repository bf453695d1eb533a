//! Users table

use super::non_blank;
use crate::types::{LogRecord, UserRow};
use std::collections::HashMap;

/// One row per distinct `userId` among playback events
///
/// The latest event in input order decides the row's values, so a user who
/// upgraded from `free` to `paid` mid-log ends up `paid`. Rows are ordered by
/// each user's first appearance.
pub fn derive_users(logs: &[LogRecord]) -> Vec<UserRow> {
    let mut rows: Vec<UserRow> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in logs.iter().filter(|r| r.is_playback()) {
        let Some(user_id) = non_blank(record.user_id.as_deref()) else {
            continue;
        };

        let row = UserRow {
            user_id: user_id.to_string(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            gender: record.gender.clone(),
            level: record.level.clone(),
        };

        match index.get(user_id) {
            Some(&pos) => rows[pos] = row,
            None => {
                index.insert(user_id.to_string(), rows.len());
                rows.push(row);
            }
        }
    }

    rows
}
