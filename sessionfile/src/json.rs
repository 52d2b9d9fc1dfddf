use crate::SessionDecoder;
use crate::errors::DecodeError;
use crate::record::SessionRecord;

/// A record exported by `courier inspect --json`.
pub struct JsonDecoder;

impl SessionDecoder for JsonDecoder {
    fn name(&self) -> &'static str {
        "json"
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.trim_ascii_start().starts_with(b"{")
    }

    fn decode(&self, data: &[u8]) -> Result<SessionRecord, DecodeError> {
        let record: SessionRecord = serde_json::from_slice(data)
            .map_err(|e| DecodeError::invalid("session json", e.to_string()))?;
        record.validate()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::record;

    #[test]
    fn test_decode_exported_record() {
        let data = serde_json::to_vec_pretty(&record()).unwrap();
        let mut padded = b"\n  ".to_vec();
        padded.extend_from_slice(&data);

        assert!(JsonDecoder.sniff(&padded));
        assert_eq!(JsonDecoder.decode(&padded).unwrap(), record());
    }

    #[test]
    fn test_decode_rejects_bad_hex() {
        let data = br#"{"dc_id": 2, "server_address": "1.2.3.4", "auth_key": "zz"}"#;
        assert!(matches!(
            JsonDecoder.decode(data),
            Err(DecodeError::InvalidField {
                field: "session json",
                ..
            })
        ));
    }
}
