//! Track filters and their SQL translation.

use serde::{Deserialize, Serialize};

use crate::format::{AudioFormat, FormatCode};

/// Filter over catalog tracks.
///
/// Values within one field are alternatives. Fields are combined with OR,
/// or with AND when `match_all` is set. Non-empty `track_ids` replace every
/// other criterion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackFilter {
    pub track_ids: Vec<String>,
    pub titles: Vec<String>,
    pub exact_titles: Vec<String>,
    pub artists: Vec<String>,
    pub exact_artists: Vec<String>,
    /// An empty name matches tracks without an album.
    pub albums: Vec<String>,
    pub exact_albums: Vec<String>,
    pub playlists: Vec<String>,
    pub exact_playlists: Vec<String>,
    pub formats: Vec<AudioFormat>,
    pub match_all: bool,
}

impl TrackFilter {
    /// Filter matching the given track IDs only.
    pub fn by_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            track_ids: ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Whether no criterion is set, matching every track.
    pub fn is_empty(&self) -> bool {
        self.track_ids.is_empty()
            && self.titles.is_empty()
            && self.exact_titles.is_empty()
            && self.artists.is_empty()
            && self.exact_artists.is_empty()
            && self.albums.is_empty()
            && self.exact_albums.is_empty()
            && self.playlists.is_empty()
            && self.exact_playlists.is_empty()
            && self.formats.is_empty()
    }

    /// Builds the WHERE condition and its positional parameters.
    ///
    /// Column aliases: `c` content, `a` artist, `al` album.
    pub fn to_sql(&self) -> (Option<String>, Vec<String>) {
        let mut builder = ConditionBuilder::default();

        if !self.track_ids.is_empty() {
            builder.group(&self.track_ids, |v, b| b.param_condition("c.ID = ?", v));
            return builder.finish(false);
        }

        builder.group(&self.titles, |v, b| b.like("c.Title", v));
        builder.group(&self.exact_titles, |v, b| b.param_condition("c.Title = ?", v));
        builder.group(&self.artists, |v, b| b.like("a.Name", v));
        builder.group(&self.exact_artists, |v, b| b.param_condition("a.Name = ?", v));
        builder.group(&self.albums, |v, b| {
            if v.is_empty() {
                "c.AlbumID IS NULL".to_string()
            } else {
                b.like("al.Name", v)
            }
        });
        builder.group(&self.exact_albums, |v, b| {
            if v.is_empty() {
                "c.AlbumID IS NULL".to_string()
            } else {
                b.param_condition("al.Name = ?", v)
            }
        });
        builder.group(&self.playlists, |v, b| {
            let name = b.like("p.Name", v);
            playlist_exists(&name)
        });
        builder.group(&self.exact_playlists, |v, b| {
            let name = b.param_condition("p.Name = ?", v);
            playlist_exists(&name)
        });

        if !self.formats.is_empty() {
            let mut codes: Vec<FormatCode> = self
                .formats
                .iter()
                .flat_map(|f| f.matching_codes().iter().copied())
                .collect();
            codes.sort_unstable();
            codes.dedup();
            let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
            builder
                .groups
                .push(format!("c.FileType IN ({})", codes.join(", ")));
        }

        builder.finish(self.match_all)
    }
}

fn playlist_exists(name_condition: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM djmdSongPlaylist sp JOIN djmdPlaylist p ON p.ID = sp.PlaylistID \
         WHERE sp.ContentID = c.ID AND {})",
        name_condition
    )
}

/// Escapes LIKE wildcards so user input matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[derive(Default)]
struct ConditionBuilder {
    groups: Vec<String>,
    params: Vec<String>,
}

impl ConditionBuilder {
    /// Adds one OR-group built from `values`.
    fn group<F>(&mut self, values: &[String], mut condition: F)
    where
        F: FnMut(&str, &mut Self) -> String,
    {
        if values.is_empty() {
            return;
        }
        let mut parts = Vec::with_capacity(values.len());
        for value in values {
            parts.push(condition(value.as_str(), self));
        }
        if parts.len() == 1 {
            self.groups.extend(parts);
        } else {
            self.groups.push(format!("({})", parts.join(" OR ")));
        }
    }

    /// Case-insensitive substring match.
    fn like(&mut self, column: &str, value: &str) -> String {
        self.params.push(format!("%{}%", escape_like(value)));
        format!("{} LIKE ? ESCAPE '\\'", column)
    }

    /// Condition bound to a single parameter.
    fn param_condition(&mut self, sql: &str, value: &str) -> String {
        self.params.push(value.to_string());
        sql.to_string()
    }

    fn finish(self, match_all: bool) -> (Option<String>, Vec<String>) {
        if self.groups.is_empty() {
            return (None, self.params);
        }
        let joiner = if match_all { " AND " } else { " OR " };
        (Some(self.groups.join(joiner)), self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_has_no_condition() {
        let (sql, params) = TrackFilter::default().to_sql();
        assert!(sql.is_none());
        assert!(params.is_empty());
        assert!(TrackFilter::default().is_empty());
    }

    #[test]
    fn test_track_ids_override_other_criteria() {
        let filter = TrackFilter {
            titles: vec!["ignored".to_string()],
            ..TrackFilter::by_ids(["1", "2"])
        };
        let (sql, params) = filter.to_sql();
        assert_eq!(sql.unwrap(), "(c.ID = ? OR c.ID = ?)");
        assert_eq!(params, vec!["1", "2"]);
    }

    #[test]
    fn test_groups_or_by_default_and_with_match_all() {
        let mut filter = TrackFilter {
            titles: vec!["love".to_string()],
            exact_artists: vec!["Daft Punk".to_string()],
            ..Default::default()
        };
        let (sql, params) = filter.to_sql();
        assert_eq!(
            sql.unwrap(),
            "c.Title LIKE ? ESCAPE '\\' OR a.Name = ?"
        );
        assert_eq!(params, vec!["%love%", "Daft Punk"]);

        filter.match_all = true;
        let (sql, _) = filter.to_sql();
        assert!(sql.unwrap().contains(" AND "));
    }

    #[test]
    fn test_empty_album_matches_missing_album() {
        let filter = TrackFilter {
            albums: vec![String::new()],
            ..Default::default()
        };
        let (sql, params) = filter.to_sql();
        assert_eq!(sql.unwrap(), "c.AlbumID IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_like_wildcards_are_escaped() {
        let filter = TrackFilter {
            titles: vec!["100%_pure".to_string()],
            ..Default::default()
        };
        let (_, params) = filter.to_sql();
        assert_eq!(params, vec!["%100\\%\\_pure%"]);
    }

    #[test]
    fn test_format_filter_uses_all_codes() {
        let filter = TrackFilter {
            formats: vec![AudioFormat::Mp3, AudioFormat::Flac],
            ..Default::default()
        };
        let (sql, _) = filter.to_sql();
        assert_eq!(sql.unwrap(), "c.FileType IN (0, 1, 5)");
    }

    #[test]
    fn test_playlist_filter_uses_subquery() {
        let filter = TrackFilter {
            exact_playlists: vec!["Warmup".to_string()],
            ..Default::default()
        };
        let (sql, params) = filter.to_sql();
        let sql = sql.unwrap();
        assert!(sql.starts_with("EXISTS (SELECT 1 FROM djmdSongPlaylist"));
        assert!(sql.contains("p.Name = ?"));
        assert_eq!(params, vec!["Warmup"]);
    }
}
