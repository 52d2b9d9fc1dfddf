use crate::errors::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{AddrParseError, IpAddr, SocketAddr};

/// Size of an MTProto authorization key in bytes.
pub const AUTH_KEY_LEN: usize = 256;

/// Port assumed when a session does not record one.
pub const DEFAULT_DC_PORT: u16 = 443;

/// Connection credentials needed to resume an authorized MTProto identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub dc_id: i32,
    pub server_address: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(with = "hex_serde")]
    pub auth_key: Vec<u8>,
    #[serde(default)]
    pub takeout_id: Option<i64>,
}

impl SessionRecord {
    /// Checks the fields every decoder must guarantee.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.dc_id <= 0 {
            return Err(DecodeError::invalid(
                "dc_id",
                format!("{} is not a data center", self.dc_id),
            ));
        }

        if self.server_address.is_empty() {
            return Err(DecodeError::MissingField("server_address"));
        }

        if self.auth_key.len() != AUTH_KEY_LEN {
            return Err(DecodeError::invalid(
                "auth_key",
                format!(
                    "expected {AUTH_KEY_LEN} bytes, got {}",
                    self.auth_key.len()
                ),
            ));
        }

        Ok(())
    }

    pub fn auth_key_hex(&self) -> String {
        hex::encode(&self.auth_key)
    }

    /// The authorization key as a fixed-size array, if it has the right length.
    pub fn auth_key_array(&self) -> Option<[u8; AUTH_KEY_LEN]> {
        self.auth_key.as_slice().try_into().ok()
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_DC_PORT)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        let ip: IpAddr = self.server_address.parse()?;
        Ok(SocketAddr::new(ip, self.port_or_default()))
    }
}

// The key is a bearer credential; keep it out of logs.
impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("dc_id", &self.dc_id)
            .field("server_address", &self.server_address)
            .field("port", &self.port)
            .field("auth_key", &format_args!("<{} bytes>", self.auth_key.len()))
            .field("takeout_id", &self.takeout_id)
            .finish()
    }
}

/// Hex serialization for byte arrays
mod hex_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::record;

    #[test]
    fn test_json_uses_hex_auth_key() {
        let json = serde_json::to_value(record()).unwrap();
        let auth_key = json["auth_key"].as_str().unwrap();
        assert_eq!(auth_key.len(), AUTH_KEY_LEN * 2);
        assert!(auth_key.starts_with("000102"));
        assert!(json["takeout_id"].is_null());

        let back: SessionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record());
    }

    #[test]
    fn test_validate() {
        assert!(record().validate().is_ok());

        let mut short_key = record();
        short_key.auth_key.truncate(10);
        assert!(matches!(
            short_key.validate(),
            Err(DecodeError::InvalidField {
                field: "auth_key",
                ..
            })
        ));

        let mut no_address = record();
        no_address.server_address.clear();
        assert!(matches!(
            no_address.validate(),
            Err(DecodeError::MissingField("server_address"))
        ));

        let mut bad_dc = record();
        bad_dc.dc_id = 0;
        assert!(bad_dc.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let mut r = record();
        assert_eq!(
            r.socket_addr().unwrap(),
            "149.154.167.51:443".parse::<SocketAddr>().unwrap()
        );

        r.port = None;
        r.server_address = "2001:67c:4e8:f002::a".into();
        assert_eq!(r.socket_addr().unwrap().port(), DEFAULT_DC_PORT);

        r.server_address = "not-an-ip".into();
        assert!(r.socket_addr().is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", record());
        assert!(debug.contains("<256 bytes>"));
        assert!(!debug.contains("000102"));
    }
}
