//! Telethon `StringSession` text: a version character followed by URL-safe
//! base64 of `dc_id:u8 | ip:4 or 16 bytes | port:u16 (big endian) | auth_key`.

use crate::SessionDecoder;
use crate::errors::DecodeError;
use crate::record::{AUTH_KEY_LEN, SessionRecord};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const VERSION: char = '1';

const V4_LEN: usize = 1 + 4 + 2 + AUTH_KEY_LEN;
const V6_LEN: usize = 1 + 16 + 2 + AUTH_KEY_LEN;

pub struct StringDecoder;

impl SessionDecoder for StringDecoder {
    fn name(&self) -> &'static str {
        "string"
    }

    fn sniff(&self, data: &[u8]) -> bool {
        match data.trim_ascii() {
            [b'1', rest @ ..] if !rest.is_empty() => rest
                .iter()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'=')),
            _ => false,
        }
    }

    fn decode(&self, data: &[u8]) -> Result<SessionRecord, DecodeError> {
        let text = std::str::from_utf8(data)
            .map_err(|e| DecodeError::invalid("session string", e.to_string()))?
            .trim();

        let body = text
            .strip_prefix(VERSION)
            .ok_or(DecodeError::UnknownFormat)?;

        let raw = URL_SAFE_NO_PAD
            .decode(body.trim_end_matches('='))
            .map_err(|e| DecodeError::invalid("session string", e.to_string()))?;

        let ip_len = match raw.len() {
            V4_LEN => 4,
            V6_LEN => 16,
            n => {
                return Err(DecodeError::invalid(
                    "session string",
                    format!("unexpected decoded length {n}"),
                ));
            }
        };

        let ip = if ip_len == 4 {
            IpAddr::V4(Ipv4Addr::new(raw[1], raw[2], raw[3], raw[4]))
        } else {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&raw[1..17]);
            IpAddr::V6(Ipv6Addr::from(octets))
        };

        let port_at = 1 + ip_len;
        let port = u16::from_be_bytes([raw[port_at], raw[port_at + 1]]);

        let record = SessionRecord {
            dc_id: i32::from(raw[0]),
            server_address: ip.to_string(),
            port: Some(port),
            auth_key: raw[port_at + 2..].to_vec(),
            takeout_id: None,
        };
        record.validate()?;
        Ok(record)
    }
}

/// Encodes `record` as a Telethon `StringSession`.
pub fn encode(record: &SessionRecord) -> Result<String, DecodeError> {
    record.validate()?;

    let dc_id = u8::try_from(record.dc_id)
        .map_err(|_| DecodeError::invalid("dc_id", format!("{} does not fit", record.dc_id)))?;
    let ip: IpAddr = record
        .server_address
        .parse()
        .map_err(|e: std::net::AddrParseError| DecodeError::invalid("server_address", e.to_string()))?;

    let mut raw = Vec::with_capacity(V6_LEN);
    raw.push(dc_id);
    match ip {
        IpAddr::V4(v4) => raw.extend_from_slice(&v4.octets()),
        IpAddr::V6(v6) => raw.extend_from_slice(&v6.octets()),
    }
    raw.extend_from_slice(&record.port_or_default().to_be_bytes());
    raw.extend_from_slice(&record.auth_key);

    Ok(format!("{VERSION}{}", URL_SAFE_NO_PAD.encode(raw)))
}
