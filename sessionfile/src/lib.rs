//! Decoding of uploaded MTProto session credentials.
//!
//! Uploads are classified by their content, never by their file name. Each
//! supported layout is a [`SessionDecoder`]; [`Decoders`] tries them in order
//! and returns the first decoded [`SessionRecord`] or a [`DecodeError`].

pub mod errors;
pub mod json;
pub mod record;
pub mod sqlite;
pub mod string;

pub use errors::DecodeError;
pub use record::SessionRecord;

use json::JsonDecoder;
use sqlite::SqliteDecoder;
use string::StringDecoder;

pub trait SessionDecoder: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Cheap content check; must not allocate or touch the filesystem.
    fn sniff(&self, data: &[u8]) -> bool;

    fn decode(&self, data: &[u8]) -> Result<SessionRecord, DecodeError>;
}

pub struct Decoders {
    decoders: Vec<Box<dyn SessionDecoder>>,
}

impl Default for Decoders {
    fn default() -> Self {
        Decoders::new(vec![
            Box::new(SqliteDecoder),
            Box::new(StringDecoder),
            Box::new(JsonDecoder),
        ])
    }
}

impl Decoders {
    pub fn new(decoders: Vec<Box<dyn SessionDecoder>>) -> Self {
        Decoders { decoders }
    }

    pub fn decode(&self, data: &[u8]) -> Result<SessionRecord, DecodeError> {
        self.decode_with_format(data).map(|(_, record)| record)
    }

    /// Like [`Decoders::decode`], also returning the name of the decoder that
    /// recognized `data`.
    pub fn decode_with_format(
        &self,
        data: &[u8],
    ) -> Result<(&'static str, SessionRecord), DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }

        let decoder = self
            .decoders
            .iter()
            .find(|d| d.sniff(data))
            .ok_or(DecodeError::UnknownFormat)?;
        let record = decoder.decode(data)?;
        tracing::debug!(
            format = decoder.name(),
            dc_id = record.dc_id,
            "decoded session"
        );
        Ok((decoder.name(), record))
    }
}

#[cfg(test)]
pub(crate) mod testutils {
    use crate::record::{AUTH_KEY_LEN, SessionRecord};
    use rusqlite::{Connection, params};

    pub fn record() -> SessionRecord {
        SessionRecord {
            dc_id: 2,
            server_address: "149.154.167.51".into(),
            port: Some(443),
            auth_key: (0..AUTH_KEY_LEN).map(|i| i as u8).collect(),
            takeout_id: None,
        }
    }

    /// Builds a session database with the layout Telethon writes.
    pub fn telethon_database(records: &[SessionRecord]) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("account.session");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE version (version integer primary key);
             INSERT INTO version VALUES (7);
             CREATE TABLE sessions (
                 dc_id integer primary key,
                 server_address text,
                 port integer,
                 auth_key blob,
                 takeout_id integer
             );
             CREATE TABLE entities (
                 id integer primary key,
                 hash integer not null,
                 username text,
                 phone integer,
                 name text,
                 date integer
             );",
        )
        .unwrap();

        for r in records {
            conn.execute(
                "INSERT INTO sessions VALUES (?1, ?2, ?3, ?4, ?5)",
                params![r.dc_id, r.server_address, r.port, r.auth_key, r.takeout_id],
            )
            .unwrap();
        }
        drop(conn);

        std::fs::read(&path).unwrap()
    }
}
