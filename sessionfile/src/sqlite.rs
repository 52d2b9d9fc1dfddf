//! Decoder for the SQLite session database written by Telethon.
//!
//! The upload is copied into a temporary file and opened read-only. Both the
//! connection and the file are gone by the time `decode` returns, whatever the
//! outcome.

use crate::SessionDecoder;
use crate::errors::DecodeError;
use crate::record::SessionRecord;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::io::Write;

const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

const REQUIRED_COLUMNS: [&str; 4] = ["dc_id", "server_address", "port", "auth_key"];

pub struct SqliteDecoder;

struct SessionRow {
    dc_id: Option<i64>,
    server_address: Option<String>,
    port: Option<i64>,
    auth_key: Option<Vec<u8>>,
    takeout_id: Option<i64>,
}

impl SessionDecoder for SqliteDecoder {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.starts_with(SQLITE_MAGIC)
    }

    fn decode(&self, data: &[u8]) -> Result<SessionRecord, DecodeError> {
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".session")
            .tempfile()?;
        file.write_all(data)?;
        file.flush()?;

        let conn = Connection::open_with_flags(
            file.path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let record = read_session(&conn);

        // Close before the temporary file is unlinked.
        drop(conn);
        record
    }
}

fn session_columns(conn: &Connection) -> Result<Vec<String>, DecodeError> {
    let mut stmt = conn.prepare("PRAGMA table_info(sessions)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn read_session(conn: &Connection) -> Result<SessionRecord, DecodeError> {
    let columns = session_columns(conn)?;
    if columns.is_empty() {
        return Err(DecodeError::MissingTable);
    }

    for required in REQUIRED_COLUMNS {
        if !columns.iter().any(|c| c == required) {
            return Err(DecodeError::MissingField(required));
        }
    }

    // Session files from before takeout support have no takeout_id column.
    let takeout_column = if columns.iter().any(|c| c == "takeout_id") {
        "takeout_id"
    } else {
        "NULL"
    };

    let sql = format!(
        "SELECT dc_id, server_address, port, auth_key, {takeout_column} FROM sessions LIMIT 1"
    );

    let row = conn
        .query_row(&sql, [], |row| {
            Ok(SessionRow {
                dc_id: row.get(0)?,
                server_address: row.get(1)?,
                port: row.get(2)?,
                auth_key: row.get(3)?,
                takeout_id: row.get(4)?,
            })
        })
        .optional()?
        .ok_or(DecodeError::NoRows)?;

    row.into_record()
}

impl SessionRow {
    fn into_record(self) -> Result<SessionRecord, DecodeError> {
        let dc_id = self.dc_id.ok_or(DecodeError::MissingField("dc_id"))?;
        let dc_id = i32::try_from(dc_id)
            .map_err(|_| DecodeError::invalid("dc_id", format!("{dc_id} is out of range")))?;

        let server_address = self
            .server_address
            .filter(|address| !address.is_empty())
            .ok_or(DecodeError::MissingField("server_address"))?;

        let port = self
            .port
            .map(|port| {
                u16::try_from(port)
                    .map_err(|_| DecodeError::invalid("port", format!("{port} is out of range")))
            })
            .transpose()?;

        let auth_key = self.auth_key.ok_or(DecodeError::MissingField("auth_key"))?;

        let record = SessionRecord {
            dc_id,
            server_address,
            port,
            auth_key,
            takeout_id: self.takeout_id,
        };
        record.validate()?;
        Ok(record)
    }
}
