//! Binary codec for [`Value`] trees.
//!
//! Wire format:
//! ```text
//! document = "SBV1" value
//! value    = [tag:1][body]
//!
//! 0x00 Null        (no body)
//! 0x01 Boolean     [0|1:1]
//! 0x02 Integer     [i64:8]
//! 0x03 Real        [f64 bits:8]
//! 0x04 String      [len:4][utf8:len]
//! 0x05 Data        [len:4][bytes:len]
//! 0x06 Array       [count:4] value*
//! 0x07 Dictionary  [count:4] ([key_len:4][utf8 key] value)*
//! 0x08 Date        [unix micros i64:8]
//! ```
//! All multi-byte integers are big-endian.  Encoding is deterministic: the
//! same tree always produces the same bytes.

use thiserror::Error;

use super::{Date, Dictionary, Value};

/// Four-byte magic that starts every encoded document.
pub const MAGIC: [u8; 4] = *b"SBV1";

/// Maximum number of nested arrays and dictionaries accepted by [`encode`]
/// and [`decode`].
pub const MAX_DEPTH: usize = 256;

const TAG_NULL: u8 = 0x00;
const TAG_BOOLEAN: u8 = 0x01;
const TAG_INTEGER: u8 = 0x02;
const TAG_REAL: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_DATA: u8 = 0x05;
const TAG_ARRAY: u8 = 0x06;
const TAG_DICTIONARY: u8 = 0x07;
const TAG_DATE: u8 = 0x08;

/// Errors that can occur while encoding or decoding a value document.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    /// The input ended before the value was complete.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The document does not start with [`MAGIC`].
    #[error("bad magic: expected \"SBV1\"")]
    BadMagic,

    /// A tag byte is not one of the known variants.
    #[error("unknown value tag: 0x{0:02X}")]
    UnknownTag(u8),

    /// The value could not be parsed (invalid UTF-8, bad boolean, duplicate key, etc.).
    #[error("malformed value: {0}")]
    Malformed(String),

    /// Arrays and dictionaries are nested deeper than [`MAX_DEPTH`].
    #[error("nesting deeper than 256 levels")]
    TooDeep,

    /// Bytes remain after the top-level value.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `value` into a self-describing byte document.
///
/// Lengths and counts are written as `u32`; callers never build strings or
/// arrays anywhere near 4 GiB, and the transport rejects frames long before
/// that.
///
/// # Errors
///
/// Returns [`CodecError::TooDeep`] if arrays and dictionaries are nested
/// deeper than [`MAX_DEPTH`], so every encoded document can be decoded.
///
/// # Examples
///
/// ```rust
/// use sbs_core::value::{decode, encode, Value};
///
/// let v = Value::Array(vec![Value::Integer(1), Value::Real(1.0)]);
/// assert_eq!(decode(&encode(&v).unwrap()).unwrap(), v);
/// ```
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&MAGIC);
    encode_value(&mut buf, value, 0)?;
    Ok(buf)
}

/// Decodes one complete document produced by [`encode`].
///
/// # Errors
///
/// Returns [`CodecError`] if the bytes are malformed.  Decoding never panics
/// and never returns a partially-built value.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    if bytes.len() < MAGIC.len() {
        return Err(CodecError::InsufficientData {
            needed: MAGIC.len(),
            available: bytes.len(),
        });
    }
    if bytes[..MAGIC.len()] != MAGIC {
        return Err(CodecError::BadMagic);
    }

    let mut reader = Reader {
        buf: bytes,
        pos: MAGIC.len(),
    };
    let value = decode_value(&mut reader, 0)?;

    let remaining = reader.remaining();
    if remaining != 0 {
        return Err(CodecError::TrailingBytes(remaining));
    }
    Ok(value)
}

// ── Encoding ──────────────────────────────────────────────────────────────────

fn encode_value(buf: &mut Vec<u8>, value: &Value, depth: usize) -> Result<(), CodecError> {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Boolean(b) => {
            buf.push(TAG_BOOLEAN);
            buf.push(u8::from(*b));
        }
        Value::Integer(i) => {
            buf.push(TAG_INTEGER);
            buf.extend_from_slice(&i.to_be_bytes());
        }
        Value::Real(r) => {
            buf.push(TAG_REAL);
            buf.extend_from_slice(&r.to_bits().to_be_bytes());
        }
        Value::String(s) => {
            buf.push(TAG_STRING);
            write_length_prefixed(buf, s.as_bytes());
        }
        Value::Data(d) => {
            buf.push(TAG_DATA);
            write_length_prefixed(buf, d);
        }
        Value::Array(items) => {
            if depth >= MAX_DEPTH {
                return Err(CodecError::TooDeep);
            }
            buf.push(TAG_ARRAY);
            write_len(buf, items.len());
            for item in items {
                encode_value(buf, item, depth + 1)?;
            }
        }
        Value::Dictionary(dict) => {
            if depth >= MAX_DEPTH {
                return Err(CodecError::TooDeep);
            }
            buf.push(TAG_DICTIONARY);
            write_len(buf, dict.len());
            for (key, item) in dict.iter() {
                write_length_prefixed(buf, key.as_bytes());
                encode_value(buf, item, depth + 1)?;
            }
        }
        Value::Date(d) => {
            buf.push(TAG_DATE);
            buf.extend_from_slice(&d.unix_micros().to_be_bytes());
        }
    }
    Ok(())
}

fn write_len(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&(len as u32).to_be_bytes());
}

/// Writes a 4-byte length prefix followed by the bytes.
fn write_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_len(buf, bytes.len());
    buf.extend_from_slice(bytes);
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Cursor over the input; every read is bounds-checked.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::InsufficientData {
                needed: self.pos + n,
                available: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, CodecError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Reads a count and checks that at least `count * min_item_size` bytes
    /// remain, so a forged count cannot trigger a huge allocation.
    fn read_count(&mut self, min_item_size: usize, context: &str) -> Result<usize, CodecError> {
        let count = self.read_u32()? as usize;
        let needed = count.saturating_mul(min_item_size);
        if needed > self.remaining() {
            return Err(CodecError::Malformed(format!(
                "{context}: count {count} exceeds remaining {} bytes",
                self.remaining()
            )));
        }
        Ok(count)
    }

    fn read_length_prefixed(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    fn read_string(&mut self, context: &str) -> Result<String, CodecError> {
        let bytes = self.read_length_prefixed()?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| CodecError::Malformed(format!("{context}: invalid UTF-8: {e}")))
    }
}

fn decode_value(r: &mut Reader<'_>, depth: usize) -> Result<Value, CodecError> {
    let tag = r.read_u8()?;
    match tag {
        TAG_NULL => Ok(Value::Null),
        TAG_BOOLEAN => match r.read_u8()? {
            0 => Ok(Value::Boolean(false)),
            1 => Ok(Value::Boolean(true)),
            other => Err(CodecError::Malformed(format!("invalid boolean byte: {other}"))),
        },
        TAG_INTEGER => Ok(Value::Integer(r.read_u64()? as i64)),
        TAG_REAL => Ok(Value::Real(f64::from_bits(r.read_u64()?))),
        TAG_STRING => r.read_string("string").map(Value::String),
        TAG_DATA => Ok(Value::Data(r.read_length_prefixed()?.to_vec())),
        TAG_ARRAY => {
            if depth >= MAX_DEPTH {
                return Err(CodecError::TooDeep);
            }
            // Smallest element is a bare tag byte.
            let count = r.read_count(1, "array")?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_value(r, depth + 1)?);
            }
            Ok(Value::Array(items))
        }
        TAG_DICTIONARY => {
            if depth >= MAX_DEPTH {
                return Err(CodecError::TooDeep);
            }
            // Smallest entry is an empty key (4 bytes) plus a bare tag byte.
            let count = r.read_count(5, "dictionary")?;
            let mut dict = Dictionary::with_capacity(count);
            for _ in 0..count {
                let key = r.read_string("dictionary key")?;
                let item = decode_value(r, depth + 1)?;
                dict.try_insert(key, item).map_err(|(key, _)| {
                    CodecError::Malformed(format!("duplicate dictionary key: {key:?}"))
                })?;
            }
            Ok(Value::Dictionary(dict))
        }
        TAG_DATE => Ok(Value::Date(Date::from_unix_micros(r.read_u64()? as i64))),
        other => Err(CodecError::UnknownTag(other)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &Value) -> Value {
        let encoded = encode(value).expect("encode failed");
        decode(&encoded).expect("decode failed")
    }

    // ── Scalars ──────────────────────────────────────────────────────────────

    #[test]
    fn test_scalars_round_trip() {
        for v in [
            Value::Null,
            Value::Boolean(true),
            Value::Boolean(false),
            Value::Integer(i64::MIN),
            Value::Integer(-1),
            Value::Integer(i64::MAX),
            Value::Real(-0.5),
            Value::Real(f64::INFINITY),
            Value::String(String::new()),
            Value::String("Ünïcødé ☃".to_string()),
            Value::Data(vec![]),
            Value::Data(vec![0x89, b'P', b'N', b'G']),
            Value::Date(Date::from_unix_micros(-42)),
        ] {
            assert_eq!(round_trip(&v), v);
        }
    }

    #[test]
    fn test_integer_and_real_keep_their_tags() {
        let encoded_int = encode(&Value::Integer(1)).unwrap();
        let encoded_real = encode(&Value::Real(1.0)).unwrap();

        assert_ne!(encoded_int, encoded_real);
        assert_eq!(decode(&encoded_int).unwrap(), Value::Integer(1));
        assert_eq!(decode(&encoded_real).unwrap(), Value::Real(1.0));
    }

    // ── Containers ───────────────────────────────────────────────────────────

    #[test]
    fn test_nested_icon_layout_round_trip() {
        // Arrange – shape of a springboard page list
        let icon = |id: &str| -> Value {
            let mut d = Dictionary::new();
            d.insert("displayIdentifier", id);
            d.insert("displayName", id.to_uppercase());
            d.insert("iconModDate", Date::from_unix_micros(1_600_000_000_000_000));
            Value::Dictionary(d)
        };
        let layout = Value::Array(vec![
            Value::Array(vec![icon("com.apple.mobilesafari"), icon("com.apple.mobilemail")]),
            Value::Array(vec![icon("com.apple.Preferences")]),
        ]);

        // Act / Assert
        assert_eq!(round_trip(&layout), layout);
    }

    #[test]
    fn test_dictionary_key_order_is_preserved() {
        let dict: Dictionary = [("z", 1), ("a", 2), ("m", 3)].into_iter().collect();
        let decoded = round_trip(&Value::Dictionary(dict));
        let keys: Vec<&str> = decoded.as_dictionary().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let dict: Dictionary = [("b", Value::Real(2.5)), ("a", Value::Null)]
            .into_iter()
            .collect();
        let v = Value::Dictionary(dict);
        assert_eq!(encode(&v), encode(&v.clone()));
    }

    #[test]
    fn test_encode_null_has_exact_layout() {
        assert_eq!(encode(&Value::Null), Ok(b"SBV1\x00".to_vec()));
    }

    // ── Malformed input ──────────────────────────────────────────────────────

    #[test]
    fn test_decode_empty_input_is_insufficient_data() {
        assert_eq!(
            decode(&[]),
            Err(CodecError::InsufficientData {
                needed: 4,
                available: 0
            })
        );
    }

    #[test]
    fn test_decode_bad_magic_fails() {
        assert_eq!(decode(b"bpli\x00"), Err(CodecError::BadMagic));
    }

    #[test]
    fn test_decode_unknown_tag_fails() {
        assert_eq!(decode(b"SBV1\x7F"), Err(CodecError::UnknownTag(0x7F)));
    }

    #[test]
    fn test_decode_invalid_boolean_fails() {
        assert!(matches!(
            decode(b"SBV1\x01\x02"),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_truncated_string_fails() {
        let mut bytes = encode(&Value::from("hello")).unwrap();
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            decode(&bytes),
            Err(CodecError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_decode_invalid_utf8_fails() {
        let bytes = b"SBV1\x04\x00\x00\x00\x02\xC3\x28";
        assert!(matches!(decode(bytes), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_decode_trailing_bytes_fails() {
        let mut bytes = encode(&Value::Integer(7)).unwrap();
        bytes.push(0x00);
        assert_eq!(decode(&bytes), Err(CodecError::TrailingBytes(1)));
    }

    #[test]
    fn test_decode_forged_array_count_does_not_allocate() {
        // count = u32::MAX with no elements following
        let bytes = b"SBV1\x06\xFF\xFF\xFF\xFF";
        assert!(matches!(decode(bytes), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_decode_duplicate_dictionary_key_fails() {
        let mut bytes = b"SBV1\x07\x00\x00\x00\x02".to_vec();
        for _ in 0..2 {
            bytes.extend_from_slice(b"\x00\x00\x00\x01k\x00");
        }
        assert!(matches!(decode(&bytes), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_decode_excessive_nesting_fails_without_overflow() {
        let mut bytes = MAGIC.to_vec();
        for _ in 0..(MAX_DEPTH + 1) {
            bytes.extend_from_slice(&[TAG_ARRAY, 0, 0, 0, 1]);
        }
        bytes.push(TAG_NULL);
        assert_eq!(decode(&bytes), Err(CodecError::TooDeep));
    }

    #[test]
    fn test_decode_max_depth_nesting_succeeds() {
        let mut value = Value::Null;
        for _ in 0..MAX_DEPTH {
            value = Value::Array(vec![value]);
        }
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn test_encode_past_max_depth_fails() {
        // Arrange – one dictionary level past the limit
        let mut value = Value::Null;
        for _ in 0..MAX_DEPTH {
            value = Value::Array(vec![value]);
        }
        let value = Value::Dictionary([("deep", value)].into_iter().collect());

        // Act
        let result = encode(&value);

        // Assert
        assert_eq!(result, Err(CodecError::TooDeep));
    }

    #[test]
    fn test_large_dictionary_decodes_in_linear_time() {
        // Arrange
        let dict: Dictionary = (0..100_000).map(|i| (format!("key-{i:06}"), i as i64)).collect();
        let bytes = encode(&Value::Dictionary(dict)).unwrap();
        let started = std::time::Instant::now();

        // Act
        let decoded = decode(&bytes).expect("decode");

        // Assert
        let decoded = decoded.into_dictionary().expect("dictionary");
        assert_eq!(decoded.len(), 100_000);
        assert_eq!(decoded.get("key-099999"), Some(&Value::Integer(99_999)));
        assert_eq!(decoded.keys().next(), Some("key-000000"));
        assert!(started.elapsed() < std::time::Duration::from_secs(10), "took {:?}", started.elapsed());
    }
}
