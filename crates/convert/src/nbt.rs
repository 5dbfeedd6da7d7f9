//! Just enough of the NBT format to rewrite one string tag in `level.dat`.
//!
//! Everything is kept in its on-disk shape (strings as raw modified UTF-8,
//! compounds in their original order) so that a parse/serialise round trip
//! reproduces the input byte for byte.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;

const TAG_END: u8 = 0;
const TAG_BYTE: u8 = 1;
const TAG_SHORT: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_LONG: u8 = 4;
const TAG_FLOAT: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_BYTE_ARRAY: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_LIST: u8 = 9;
const TAG_COMPOUND: u8 = 10;
const TAG_INT_ARRAY: u8 = 11;
const TAG_LONG_ARRAY: u8 = 12;

/// Nesting beyond this is treated as malicious.
const MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(Vec<u8>),
    List(u8, Vec<Tag>),
    Compound(Vec<(Vec<u8>, Tag)>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    fn id(&self) -> u8 {
        match self {
            Tag::Byte(_) => TAG_BYTE,
            Tag::Short(_) => TAG_SHORT,
            Tag::Int(_) => TAG_INT,
            Tag::Long(_) => TAG_LONG,
            Tag::Float(_) => TAG_FLOAT,
            Tag::Double(_) => TAG_DOUBLE,
            Tag::ByteArray(_) => TAG_BYTE_ARRAY,
            Tag::String(_) => TAG_STRING,
            Tag::List(..) => TAG_LIST,
            Tag::Compound(_) => TAG_COMPOUND,
            Tag::IntArray(_) => TAG_INT_ARRAY,
            Tag::LongArray(_) => TAG_LONG_ARRAY,
        }
    }

    /// Mutable access to a direct child of a compound.
    pub(crate) fn child_mut(&mut self, name: &str) -> Option<&mut Tag> {
        let Tag::Compound(children) = self else {
            return None;
        };
        children.iter_mut().find(|(key, _)| key == name.as_bytes()).map(|(_, tag)| tag)
    }

    /// Insert or replace a direct child of a compound. Returns `false` if
    /// this tag is not a compound.
    pub(crate) fn set_child(&mut self, name: &str, value: Tag) -> bool {
        let Tag::Compound(children) = self else {
            return false;
        };
        match children.iter().position(|(key, _)| key == name.as_bytes()) {
            Some(index) => children[index].1 = value,
            None => children.push((name.as_bytes().to_vec(), value)),
        }
        true
    }
}

/// A named root tag, as stored in a file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Root {
    pub name: Vec<u8>,
    pub tag: Tag,
}

impl Root {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader { bytes, offset: 0 };
        let id = reader.u8()?;
        if id != TAG_COMPOUND {
            exn::bail!(ErrorKind::MalformedNbt(format!("root tag has type {id}, expected compound")));
        }
        let name = reader.string()?;
        let tag = reader.payload(TAG_COMPOUND, 0)?;
        Ok(Self { name, tag })
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.tag.id());
        write_string(&mut out, &self.name);
        write_payload(&mut out, &self.tag);
        out
    }
}

/// Encode text as Java's modified UTF-8: NUL becomes `C0 80` and characters
/// outside the BMP are written as a pair of three-byte surrogates.
pub(crate) fn modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            },
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            },
        }
    }
    out
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let Some(end) = self.offset.checked_add(len).filter(|end| *end <= self.bytes.len()) else {
            exn::bail!(ErrorKind::MalformedNbt(format!("unexpected end of data at offset {}", self.offset)));
        };
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn length(&mut self) -> Result<usize> {
        let len = i32::from_be_bytes(self.array()?);
        usize::try_from(len).or_raise(|| ErrorKind::MalformedNbt(format!("negative length {len}")))
    }

    fn string(&mut self) -> Result<Vec<u8>> {
        let len = u16::from_be_bytes(self.array()?);
        Ok(self.take(usize::from(len))?.to_vec())
    }

    fn payload(&mut self, id: u8, depth: usize) -> Result<Tag> {
        if depth > MAX_DEPTH {
            exn::bail!(ErrorKind::MalformedNbt("nesting too deep".to_string()));
        }
        Ok(match id {
            TAG_BYTE => Tag::Byte(i8::from_be_bytes(self.array()?)),
            TAG_SHORT => Tag::Short(i16::from_be_bytes(self.array()?)),
            TAG_INT => Tag::Int(i32::from_be_bytes(self.array()?)),
            TAG_LONG => Tag::Long(i64::from_be_bytes(self.array()?)),
            TAG_FLOAT => Tag::Float(f32::from_be_bytes(self.array()?)),
            TAG_DOUBLE => Tag::Double(f64::from_be_bytes(self.array()?)),
            TAG_BYTE_ARRAY => {
                let len = self.length()?;
                Tag::ByteArray(self.take(len)?.to_vec())
            },
            TAG_STRING => Tag::String(self.string()?),
            TAG_LIST => {
                let element = self.u8()?;
                let len = self.length()?;
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(self.payload(element, depth + 1)?);
                }
                Tag::List(element, items)
            },
            TAG_COMPOUND => {
                let mut children = Vec::new();
                loop {
                    let child = self.u8()?;
                    if child == TAG_END {
                        break;
                    }
                    let name = self.string()?;
                    children.push((name, self.payload(child, depth + 1)?));
                }
                Tag::Compound(children)
            },
            TAG_INT_ARRAY => {
                let len = self.length()?;
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(i32::from_be_bytes(self.array()?));
                }
                Tag::IntArray(items)
            },
            TAG_LONG_ARRAY => {
                let len = self.length()?;
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(i64::from_be_bytes(self.array()?));
                }
                Tag::LongArray(items)
            },
            other => exn::bail!(ErrorKind::MalformedNbt(format!("unknown tag type {other}"))),
        })
    }
}

fn write_string(out: &mut Vec<u8>, bytes: &[u8]) {
    // Longer strings cannot be represented; truncate rather than corrupt the length.
    let len = bytes.len().min(usize::from(u16::MAX));
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.extend_from_slice(&bytes[..len]);
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as i32).to_be_bytes());
}

fn write_payload(out: &mut Vec<u8>, tag: &Tag) {
    match tag {
        Tag::Byte(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Short(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::ByteArray(v) => {
            write_length(out, v.len());
            out.extend_from_slice(v);
        },
        Tag::String(v) => write_string(out, v),
        Tag::List(element, items) => {
            out.push(*element);
            write_length(out, items.len());
            items.iter().for_each(|item| write_payload(out, item));
        },
        Tag::Compound(children) => {
            for (name, child) in children {
                out.push(child.id());
                write_string(out, name);
                write_payload(out, child);
            }
            out.push(TAG_END);
        },
        Tag::IntArray(v) => {
            write_length(out, v.len());
            v.iter().for_each(|i| out.extend_from_slice(&i.to_be_bytes()));
        },
        Tag::LongArray(v) => {
            write_length(out, v.len());
            v.iter().for_each(|i| out.extend_from_slice(&i.to_be_bytes()));
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> Root {
        Root {
            name: Vec::new(),
            tag: Tag::Compound(vec![(
                b"Data".to_vec(),
                Tag::Compound(vec![
                    (b"LevelName".to_vec(), Tag::String(b"world".to_vec())),
                    (b"RandomSeed".to_vec(), Tag::Long(-42)),
                    (b"SpawnX".to_vec(), Tag::Int(128)),
                    (b"raining".to_vec(), Tag::Byte(0)),
                    (b"Player".to_vec(), Tag::List(TAG_DOUBLE, vec![Tag::Double(0.5), Tag::Double(64.0)])),
                    (b"Heights".to_vec(), Tag::IntArray(vec![1, 2, 3])),
                    (b"Empty".to_vec(), Tag::List(TAG_END, vec![])),
                ]),
            )]),
        }
    }

    #[test]
    fn test_serialise_is_stable() {
        let bytes = sample().to_bytes();
        let parsed = Root::parse(&bytes).unwrap();
        assert_eq!(parsed, sample());
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn test_set_child() {
        let mut root = sample();
        let data = root.tag.child_mut("Data").unwrap();
        assert!(data.set_child("LevelName", Tag::String(b"Steve".to_vec())));
        assert!(data.set_child("Version", Tag::Int(19133)));
        assert_eq!(data.child_mut("LevelName"), Some(&mut Tag::String(b"Steve".to_vec())));
        assert!(!Tag::Int(1).set_child("x", Tag::Int(2)));
    }

    #[rstest]
    #[case::not_compound(&[TAG_INT, 0, 0, 0, 0, 0, 1])]
    #[case::truncated(&[TAG_COMPOUND, 0, 0, TAG_STRING, 0, 1, b'a', 0, 9])]
    #[case::unknown_type(&[TAG_COMPOUND, 0, 0, 42, 0, 0])]
    #[case::negative_length(&[TAG_COMPOUND, 0, 0, TAG_BYTE_ARRAY, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0])]
    #[case::unterminated(&[TAG_COMPOUND, 0, 0])]
    fn test_malformed(#[case] bytes: &[u8]) {
        let err = Root::parse(bytes).unwrap_err();
        assert!(matches!(*err, ErrorKind::MalformedNbt(_)), "{err:?}");
    }

    #[rstest]
    #[case("Steve", b"Steve".to_vec())]
    #[case("a\0b", vec![b'a', 0xC0, 0x80, b'b'])]
    #[case("é", "é".as_bytes().to_vec())]
    #[case("⛏", "⛏".as_bytes().to_vec())]
    #[case("😀", vec![0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80])]
    fn test_modified_utf8(#[case] text: &str, #[case] expected: Vec<u8>) {
        assert_eq!(modified_utf8(text), expected);
    }
}
