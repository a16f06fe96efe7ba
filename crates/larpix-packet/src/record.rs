//! Export records: flat string-keyed maps describing one packet.

use serde_json::Value;

use crate::error::{PacketError, Result};

/// Flat, JSON-compatible view of a packet.
pub type Record = serde_json::Map<String, Value>;

/// Read an unsigned integer field. Booleans read as 0/1, `null` or a missing
/// key read as `None`.
pub fn get_u64(record: &Record, field: &str) -> Result<Option<u64>> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(u64::from(*flag))),
        Some(Value::Number(number)) => number
            .as_u64()
            .map(Some)
            .ok_or_else(|| PacketError::invalid_record(field, format!("not an unsigned integer: {number}"))),
        Some(other) => Err(PacketError::invalid_record(
            field,
            format!("expected integer, found {other}"),
        )),
    }
}

/// Like [`get_u64`] but narrowed to a byte.
pub fn get_u8(record: &Record, field: &str) -> Result<Option<u8>> {
    get_u64(record, field)?
        .map(|value| {
            u8::try_from(value)
                .map_err(|_| PacketError::invalid_record(field, format!("{value} does not fit in u8")))
        })
        .transpose()
}

/// Read a string field; `null` or a missing key read as `None`.
pub fn get_str<'a>(record: &'a Record, field: &str) -> Result<Option<&'a str>> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(other) => Err(PacketError::invalid_record(
            field,
            format!("expected string, found {other}"),
        )),
    }
}

/// Read an integer field that must be present.
pub fn require_u64(record: &Record, field: &str) -> Result<u64> {
    get_u64(record, field)?.ok_or_else(|| PacketError::invalid_record(field, "missing"))
}

pub(crate) fn put(record: &mut Record, field: &str, value: impl Into<Value>) {
    record.insert(field.to_string(), value.into());
}

pub(crate) fn put_opt<T: Into<Value>>(record: &mut Record, field: &str, value: Option<T>) {
    record.insert(field.to_string(), value.map_or(Value::Null, Into::into));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Record {
        match json!({
            "a": 5,
            "b": true,
            "c": null,
            "d": "text",
            "e": -1,
            "f": 300,
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn integers_and_bools() {
        let record = sample();
        assert_eq!(get_u64(&record, "a").unwrap(), Some(5));
        assert_eq!(get_u64(&record, "b").unwrap(), Some(1));
        assert_eq!(get_u64(&record, "c").unwrap(), None);
        assert_eq!(get_u64(&record, "missing").unwrap(), None);
        assert!(get_u64(&record, "d").is_err());
        assert!(get_u64(&record, "e").is_err());
    }

    #[test]
    fn byte_narrowing() {
        let record = sample();
        assert_eq!(get_u8(&record, "a").unwrap(), Some(5));
        assert!(get_u8(&record, "f").is_err());
    }

    #[test]
    fn strings() {
        let record = sample();
        assert_eq!(get_str(&record, "d").unwrap(), Some("text"));
        assert_eq!(get_str(&record, "c").unwrap(), None);
        assert!(get_str(&record, "a").is_err());
    }

    #[test]
    fn required_field_missing() {
        let err = require_u64(&sample(), "zzz").unwrap_err();
        assert!(err.to_string().contains("zzz"));
    }
}
