//! Testing utilities and mock implementations.
//!
//! Mocks stand in for ffmpeg, the operator and the process table so a whole
//! conversion run can be driven against a temporary SQLite catalog.
//!
//! # Example
//!
//! ```rust,ignore
//! use tracksmith_core::testing::{fixtures, MockConverter, ScriptedPrompter};
//!
//! let converter = MockConverter::new();
//! let prompter = ScriptedPrompter::new(["y", "n", "q"]);
//! let catalog = fixtures::seed_catalog(&db_path, &[fixtures::track("1", "/m/a.flac", 5, Some(16))])?;
//! ```

mod mock_converter;
mod mock_process_probe;
mod mock_prompter;
mod recording_catalog;
mod recording_presenter;

pub use mock_converter::{MockConverter, RecordedEncode};
pub use mock_process_probe::MockProcessProbe;
pub use mock_prompter::ScriptedPrompter;
pub use recording_catalog::RecordingCatalog;
pub use recording_presenter::RecordingPresenter;

/// Test fixtures and helper functions.
pub mod fixtures {
    use rusqlite::{params, Connection};
    use std::path::Path;

    use crate::catalog::{CatalogError, CatalogRecord, SqliteCatalog};
    use crate::converter::AudioStream;
    use crate::format::FormatCode;

    /// Create a catalog record with reasonable defaults.
    pub fn track(id: &str, path: &str, format_code: FormatCode, bit_depth: Option<u32>) -> CatalogRecord {
        let file_name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        CatalogRecord {
            id: id.to_string(),
            title: Some(format!("Track {}", id)),
            artist: None,
            album: None,
            file_name,
            folder_path: path.to_string(),
            format_code,
            sample_rate: Some(44100),
            bit_depth,
            bit_rate: Some(1411),
        }
    }

    /// A FLAC source stream as ffprobe reports it.
    pub fn flac_stream(bit_depth: u32) -> AudioStream {
        AudioStream {
            codec_type: Some("audio".to_string()),
            codec_name: Some("flac".to_string()),
            sample_fmt: Some(if bit_depth > 16 { "s32" } else { "s16" }.to_string()),
            sample_rate: Some("44100".to_string()),
            channels: Some(2),
            bits_per_sample: Some(0),
            bits_per_raw_sample: Some(bit_depth.to_string()),
            bit_rate: None,
        }
    }

    /// A PCM stream with the given depth.
    pub fn pcm_stream(codec: &str, bit_depth: u32) -> AudioStream {
        AudioStream {
            codec_type: Some("audio".to_string()),
            codec_name: Some(codec.to_string()),
            sample_fmt: Some(format!("s{}", bit_depth)),
            sample_rate: Some("44100".to_string()),
            channels: Some(2),
            bits_per_sample: Some(bit_depth),
            bits_per_raw_sample: None,
            bit_rate: Some((44100 * 2 * u64::from(bit_depth)).to_string()),
        }
    }

    /// Creates a catalog at `path` holding `records`.
    ///
    /// Artists, albums and playlist memberships are created for records
    /// that name them; `playlists` pairs a playlist name with member IDs.
    pub fn seed_catalog_with_playlists(
        path: &Path,
        records: &[CatalogRecord],
        playlists: &[(&str, &[&str])],
    ) -> Result<SqliteCatalog, CatalogError> {
        let catalog = SqliteCatalog::create(path)?;
        let conn = Connection::open(path)?;

        for record in records {
            let artist_id = match &record.artist {
                Some(name) => {
                    let id = format!("artist-{}", record.id);
                    conn.execute(
                        "INSERT INTO djmdArtist (ID, Name) VALUES (?1, ?2)",
                        params![id, name],
                    )?;
                    Some(id)
                }
                None => None,
            };
            let album_id = match &record.album {
                Some(name) => {
                    let id = format!("album-{}", record.id);
                    conn.execute(
                        "INSERT INTO djmdAlbum (ID, Name) VALUES (?1, ?2)",
                        params![id, name],
                    )?;
                    Some(id)
                }
                None => None,
            };

            conn.execute(
                "INSERT INTO djmdContent (ID, FolderPath, FileNameL, Title, ArtistID, AlbumID, \
                 FileType, SampleRate, BitDepth, BitRate) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id,
                    record.folder_path,
                    record.file_name,
                    record.title,
                    artist_id,
                    album_id,
                    record.format_code,
                    record.sample_rate,
                    record.bit_depth,
                    record.bit_rate,
                ],
            )?;
        }

        for (index, (name, members)) in playlists.iter().enumerate() {
            let playlist_id = format!("playlist-{}", index);
            conn.execute(
                "INSERT INTO djmdPlaylist (ID, Name) VALUES (?1, ?2)",
                params![playlist_id, name],
            )?;
            for (position, content_id) in members.iter().enumerate() {
                conn.execute(
                    "INSERT INTO djmdSongPlaylist (ID, PlaylistID, ContentID, TrackNo) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        format!("{}-{}", playlist_id, position),
                        playlist_id,
                        content_id,
                        position as i64 + 1
                    ],
                )?;
            }
        }

        Ok(catalog)
    }

    /// Creates a catalog at `path` holding `records`.
    pub fn seed_catalog(path: &Path, records: &[CatalogRecord]) -> Result<SqliteCatalog, CatalogError> {
        seed_catalog_with_playlists(path, records, &[])
    }
}
