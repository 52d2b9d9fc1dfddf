use sessionfile::{DecodeError, Decoders, SessionRecord};
use std::fmt::Write;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum InspectError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("could not decode session: {0}")]
    Decode(#[from] DecodeError),
    #[error("could not encode session as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes the session file at `path` and renders its fields, or the full
/// record as JSON.
pub fn inspect(path: &Path, json: bool) -> Result<String, InspectError> {
    let data = std::fs::read(path).map_err(|source| InspectError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let (format, record) = Decoders::default().decode_with_format(&data)?;

    if json {
        return Ok(serde_json::to_string_pretty(&record)?);
    }

    Ok(render(format, &record))
}

fn render(format: &str, record: &SessionRecord) -> String {
    let key = record.auth_key_hex();
    let abbreviated = if key.len() > 16 {
        format!("{}..{}", &key[..8], &key[key.len() - 8..])
    } else {
        key.clone()
    };

    let mut out = String::new();
    let _ = writeln!(out, "format:         {format}");
    let _ = writeln!(out, "dc_id:          {}", record.dc_id);
    let _ = writeln!(out, "server_address: {}", record.server_address);
    let _ = writeln!(out, "port:           {}", record.port_or_default());
    let _ = writeln!(
        out,
        "auth_key:       {abbreviated} ({} bytes)",
        record.auth_key.len()
    );
    match record.takeout_id {
        Some(id) => {
            let _ = writeln!(out, "takeout_id:     {id}");
        }
        None => {
            let _ = writeln!(out, "takeout_id:     -");
        }
    }
    out
}
