//! SQLite-backed catalog implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row};
use tracing::{debug, warn};

use super::{Catalog, CatalogError, CatalogRecord, CatalogSession, RecordUpdate, TrackFilter};

const SELECT_TRACKS: &str = "SELECT c.ID, c.Title, a.Name, al.Name, c.FileNameL, c.FolderPath, \
     c.FileType, c.SampleRate, c.BitDepth, c.BitRate \
     FROM djmdContent c \
     LEFT JOIN djmdArtist a ON a.ID = c.ArtistID \
     LEFT JOIN djmdAlbum al ON al.ID = c.AlbumID";

/// SQLite-backed library catalog.
///
/// Each session opens its own connection so a transaction never outlives the
/// session that started it.
pub struct SqliteCatalog {
    path: PathBuf,
    key: Option<String>,
}

impl SqliteCatalog {
    /// Opens an existing catalog database without touching its schema.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::Database(format!(
                "catalog database not found: {}",
                path.display()
            )));
        }
        let catalog = Self {
            path: path.to_path_buf(),
            key: None,
        };
        catalog.connect()?;
        Ok(catalog)
    }

    /// Creates a catalog database, initializing tables if needed.
    pub fn create(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            path: path.to_path_buf(),
            key: None,
        })
    }

    /// Sets the encryption key applied to every connection.
    pub fn with_key(mut self, key: Option<String>) -> Self {
        self.key = key;
        self
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, CatalogError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        if let Some(key) = &self.key {
            conn.pragma_update(None, "key", key)?;
        }
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    fn begin(&self, statement: &str) -> Result<Box<dyn CatalogSession>, CatalogError> {
        let conn = self.connect()?;
        conn.execute_batch(statement)?;
        debug!("Opened catalog session on {} ({})", self.path.display(), statement);
        Ok(Box::new(SqliteSession { conn, open: true }))
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS djmdArtist (
                ID VARCHAR(255) PRIMARY KEY,
                Name VARCHAR(255)
            );

            CREATE TABLE IF NOT EXISTS djmdAlbum (
                ID VARCHAR(255) PRIMARY KEY,
                Name VARCHAR(255),
                AlbumArtistID VARCHAR(255)
            );

            -- FolderPath holds the full path of the file, file name included
            CREATE TABLE IF NOT EXISTS djmdContent (
                ID VARCHAR(255) PRIMARY KEY,
                FolderPath VARCHAR(255),
                FileNameL VARCHAR(255),
                Title VARCHAR(255),
                ArtistID VARCHAR(255),
                AlbumID VARCHAR(255),
                FileType INTEGER,
                SampleRate INTEGER,
                BitDepth INTEGER,
                BitRate INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_content_artist ON djmdContent(ArtistID);
            CREATE INDEX IF NOT EXISTS idx_content_album ON djmdContent(AlbumID);

            CREATE TABLE IF NOT EXISTS djmdPlaylist (
                ID VARCHAR(255) PRIMARY KEY,
                Name VARCHAR(255),
                ParentID VARCHAR(255)
            );

            CREATE TABLE IF NOT EXISTS djmdSongPlaylist (
                ID VARCHAR(255) PRIMARY KEY,
                PlaylistID VARCHAR(255),
                ContentID VARCHAR(255),
                TrackNo INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_song_playlist_content ON djmdSongPlaylist(ContentID);
            "#,
        )?;

        Ok(())
    }
}

impl Catalog for SqliteCatalog {
    /// Takes the write lock up front so a busy catalog fails before any work.
    fn open_session(&self) -> Result<Box<dyn CatalogSession>, CatalogError> {
        self.begin("BEGIN IMMEDIATE")
    }

    /// Deferred transaction; reads proceed while another connection writes.
    fn open_read_session(&self) -> Result<Box<dyn CatalogSession>, CatalogError> {
        self.begin("BEGIN")
    }
}


/// A transaction on a dedicated connection.
///
/// Dropping an open session rolls it back.
pub struct SqliteSession {
    conn: Connection,
    open: bool,
}

impl SqliteSession {
    fn ensure_open(&self) -> Result<(), CatalogError> {
        if self.open {
            Ok(())
        } else {
            Err(CatalogError::SessionClosed)
        }
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CatalogRecord> {
        let id: Value = row.get(0)?;
        Ok(CatalogRecord {
            id: value_to_string(id),
            title: row.get(1)?,
            artist: row.get(2)?,
            album: row.get(3)?,
            file_name: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            folder_path: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            format_code: row.get::<_, Option<i64>>(6)?.unwrap_or(-1),
            sample_rate: to_u32(row.get(7)?),
            bit_depth: to_u32(row.get(8)?),
            bit_rate: to_u32(row.get(9)?),
        })
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::Integer(i) => i.to_string(),
        Value::Text(s) => s,
        Value::Real(f) => f.to_string(),
        Value::Null | Value::Blob(_) => String::new(),
    }
}

fn to_u32(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

impl CatalogSession for SqliteSession {
    fn query(&mut self, filter: &TrackFilter) -> Result<Vec<CatalogRecord>, CatalogError> {
        self.ensure_open()?;

        let (condition, params) = filter.to_sql();
        let sql = match condition {
            Some(condition) => format!("{} WHERE {} ORDER BY c.rowid", SELECT_TRACKS, condition),
            None => format!("{} ORDER BY c.rowid", SELECT_TRACKS),
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), Self::row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn get(&mut self, id: &str) -> Result<CatalogRecord, CatalogError> {
        self.ensure_open()?;

        let sql = format!("{} WHERE c.ID = ?", SELECT_TRACKS);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], Self::row_to_record)?;
        match rows.next() {
            Some(row) => Ok(row?),
            None => Err(CatalogError::NotFound(id.to_string())),
        }
    }

    fn stage_update(&mut self, id: &str, update: &RecordUpdate) -> Result<(), CatalogError> {
        self.ensure_open()?;

        let changed = self.conn.execute(
            "UPDATE djmdContent SET FileNameL = ?1, FolderPath = ?2, FileType = ?3, BitRate = ?4
             WHERE ID = ?5",
            params![
                update.file_name,
                update.folder_path,
                update.format_code,
                update.bit_rate,
                id
            ],
        )?;

        if changed == 0 {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), CatalogError> {
        self.ensure_open()?;
        self.conn.execute_batch("COMMIT")?;
        self.open = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), CatalogError> {
        self.ensure_open()?;
        self.open = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("Failed to roll back abandoned catalog session: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, SqliteCatalog) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        let catalog = SqliteCatalog::create(&path).unwrap();
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO djmdArtist (ID, Name) VALUES ('a1', 'Burial'), ('a2', 'Aphex Twin');
            INSERT INTO djmdAlbum (ID, Name) VALUES ('al1', 'Untrue');
            INSERT INTO djmdContent (ID, FolderPath, FileNameL, Title, ArtistID, AlbumID, FileType, SampleRate, BitDepth, BitRate)
            VALUES
                ('1', '/music/archangel.flac', 'archangel.flac', 'Archangel', 'a1', 'al1', 5, 44100, 16, 0),
                ('2', '/music/xtal.wav', 'xtal.wav', 'Xtal', 'a2', NULL, 11, 44100, 24, 2116),
                ('3', '/music/near.mp3', 'near.mp3', 'Near Dark', 'a1', 'al1', 1, 44100, 16, 320);
            INSERT INTO djmdPlaylist (ID, Name) VALUES ('p1', 'Night Bus');
            INSERT INTO djmdSongPlaylist (ID, PlaylistID, ContentID, TrackNo) VALUES ('s1', 'p1', '2', 1);
            "#,
        )
        .unwrap();
        (dir, catalog)
    }

    fn update(name: &str) -> RecordUpdate {
        RecordUpdate {
            file_name: name.to_string(),
            folder_path: format!("/music/{}", name),
            format_code: 12,
            bit_rate: 1411,
        }
    }

    #[test]
    fn test_query_all_in_catalog_order() {
        let (_dir, catalog) = seeded();
        let records = catalog.search(&TrackFilter::default()).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(records[0].artist.as_deref(), Some("Burial"));
        assert_eq!(records[0].album.as_deref(), Some("Untrue"));
        assert_eq!(records[1].bit_depth, Some(24));
    }

    #[test]
    fn test_query_filters() {
        let (_dir, catalog) = seeded();

        let by_artist = TrackFilter {
            artists: vec!["burial".to_string()],
            ..Default::default()
        };
        assert_eq!(catalog.search(&by_artist).unwrap().len(), 2);

        let no_album = TrackFilter {
            albums: vec![String::new()],
            ..Default::default()
        };
        let records = catalog.search(&no_album).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "2");

        let by_playlist = TrackFilter {
            playlists: vec!["night".to_string()],
            ..Default::default()
        };
        assert_eq!(catalog.search(&by_playlist).unwrap()[0].id, "2");

        let all_of = TrackFilter {
            artists: vec!["Burial".to_string()],
            formats: vec![crate::format::AudioFormat::Flac],
            match_all: true,
            ..Default::default()
        };
        let records = catalog.search(&all_of).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "1");
    }

    #[test]
    fn test_commit_persists_staged_update() {
        let (_dir, catalog) = seeded();

        let mut session = catalog.open_session().unwrap();
        session.stage_update("1", &update("archangel.aiff")).unwrap();
        session.commit().unwrap();
        assert!(!session.is_open());

        let record = catalog.open_session().unwrap().get("1").unwrap();
        assert_eq!(record.file_name, "archangel.aiff");
        assert_eq!(record.folder_path, "/music/archangel.aiff");
        assert_eq!(record.format_code, 12);
        assert_eq!(record.bit_rate, Some(1411));
    }

    #[test]
    fn test_rollback_discards_staged_update() {
        let (_dir, catalog) = seeded();

        let mut session = catalog.open_session().unwrap();
        session.stage_update("1", &update("archangel.aiff")).unwrap();
        assert_eq!(session.get("1").unwrap().format_code, 12);
        session.rollback().unwrap();

        let record = catalog.open_session().unwrap().get("1").unwrap();
        assert_eq!(record.format_code, 5);
    }

    #[test]
    fn test_dropped_session_rolls_back() {
        let (_dir, catalog) = seeded();
        {
            let mut session = catalog.open_session().unwrap();
            session.stage_update("2", &update("xtal.aiff")).unwrap();
        }
        let record = catalog.open_session().unwrap().get("2").unwrap();
        assert_eq!(record.file_name, "xtal.wav");
    }

    #[test]
    fn test_closed_session_rejects_calls() {
        let (_dir, catalog) = seeded();
        let mut session = catalog.open_session().unwrap();
        session.rollback().unwrap();
        assert!(matches!(
            session.stage_update("1", &update("x.aiff")),
            Err(CatalogError::SessionClosed)
        ));
        assert!(matches!(session.commit(), Err(CatalogError::SessionClosed)));
    }

    #[test]
    fn test_update_missing_record() {
        let (_dir, catalog) = seeded();
        let mut session = catalog.open_session().unwrap();
        let err = session.stage_update("999", &update("x.aiff")).unwrap_err();
        assert_eq!(err.to_string(), "Content record with ID 999 not found");
    }

    #[test]
    fn test_search_reads_while_another_connection_writes() {
        let (dir, catalog) = seeded();
        let writer = Connection::open(dir.path().join("catalog.db")).unwrap();
        writer.execute_batch("BEGIN IMMEDIATE").unwrap();
        writer
            .execute("UPDATE djmdContent SET Title = 'Changed' WHERE ID = '1'", [])
            .unwrap();

        let started = std::time::Instant::now();
        let records = catalog.search(&TrackFilter::default()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].title.as_deref(), Some("Archangel"));
        assert!(started.elapsed() < Duration::from_secs(2));

        writer.execute_batch("ROLLBACK").unwrap();
    }

    #[test]
    fn test_open_missing_database() {
        let dir = TempDir::new().unwrap();
        let result = SqliteCatalog::open(&dir.path().join("missing.db"));
        assert!(matches!(result, Err(CatalogError::Database(_))));
    }
}
