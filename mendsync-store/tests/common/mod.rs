//! Minimal Mendeley Desktop catalog fixture.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tempfile::TempDir;

pub const SCHEMA: &str = "
    CREATE TABLE Documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        uuid VARCHAR NOT NULL UNIQUE,
        citationKey VARCHAR
    );
    CREATE TABLE Files (
        hash CHAR[40] PRIMARY KEY,
        localUrl VARCHAR NOT NULL
    );
    CREATE TABLE DocumentFiles (
        documentId INTEGER NOT NULL,
        hash CHAR[40] NOT NULL,
        remoteUrl VARCHAR NOT NULL,
        unlinked BOOL NOT NULL,
        downloadRestricted BOOL NOT NULL DEFAULT 0,
        UNIQUE (documentId, hash)
    );
";

pub struct Fixture {
    pub dir: TempDir,
    pub db_path: PathBuf,
    pub root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("Papers");
        std::fs::create_dir_all(&root).expect("mkdir root");
        let root = root.canonicalize().expect("canonical root");
        let db_path = dir.path().join("catalog.sqlite");
        let conn = Connection::open(&db_path).expect("create db");
        conn.execute_batch(SCHEMA).expect("schema");
        Self { dir, db_path, root }
    }

    pub fn conn(&self) -> Connection {
        Connection::open(&self.db_path).expect("open db")
    }

    pub fn add_document(&self, uuid: &str, citation_key: Option<&str>) -> i64 {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO Documents (uuid, citationKey) VALUES (?1, ?2)",
            params![uuid, citation_key],
        )
        .expect("insert document");
        conn.last_insert_rowid()
    }

    pub fn url_for(&self, relative: &str) -> String {
        url_for(&self.root.join(relative))
    }

    pub fn link(&self, document_id: i64, hash: &str, local_url: &str) {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO Files (hash, localUrl) VALUES (?1, ?2)",
            params![hash, local_url],
        )
        .expect("insert file");
        conn.execute(
            "INSERT INTO DocumentFiles (documentId, hash, remoteUrl, unlinked, downloadRestricted) \
             VALUES (?1, ?2, '', 'false', 'false')",
            params![document_id, hash],
        )
        .expect("insert link");
    }

    pub fn count(&self, table: &str) -> i64 {
        self.conn()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .expect("count")
    }
}

pub fn url_for(path: &Path) -> String {
    let mut out = String::from("file://");
    for segment in path.to_string_lossy().split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        for ch in segment.chars() {
            match ch {
                ' ' => out.push_str("%20"),
                other => out.push(other),
            }
        }
    }
    out
}
