//! Writes minimal class files from class trees, for tests that need real
//! class bytes inside archives.

use crate::CLASS_MAGIC;
use protocol::{AnnotationNode, AnnotationValue, MemberTree};
use rustc_hash::FxHashMap;

const MAJOR_VERSION: u16 = 61;
const ACC_PUBLIC: u16 = 0x0001;
const ACC_ABSTRACT: u16 = 0x0400;

const SIGNATURE: &str = "Signature";
const VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
const INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(String),
    Integer(i32),
    Long(i64),
    Double(u64),
    Class(String),
}

#[derive(Default)]
struct PoolWriter {
    bytes: Vec<u8>,
    indices: FxHashMap<PoolKey, u16>,
    next: u16,
}

impl PoolWriter {
    fn new() -> Self {
        Self {
            next: 1,
            ..Default::default()
        }
    }

    fn add(&mut self, key: PoolKey) -> u16 {
        if let Some(&index) = self.indices.get(&key) {
            return index;
        }

        let index = match &key {
            PoolKey::Class(name) => {
                let name_index = self.utf8(name);
                self.bytes.push(7);
                self.bytes.extend_from_slice(&name_index.to_be_bytes());
                self.claim(1)
            }
            PoolKey::Utf8(value) => {
                let encoded = encode_modified_utf8(value);
                self.bytes.push(1);
                self.bytes.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
                self.bytes.extend_from_slice(&encoded);
                self.claim(1)
            }
            PoolKey::Integer(value) => {
                self.bytes.push(3);
                self.bytes.extend_from_slice(&value.to_be_bytes());
                self.claim(1)
            }
            PoolKey::Long(value) => {
                self.bytes.push(5);
                self.bytes.extend_from_slice(&value.to_be_bytes());
                self.claim(2)
            }
            PoolKey::Double(bits) => {
                self.bytes.push(6);
                self.bytes.extend_from_slice(&bits.to_be_bytes());
                self.claim(2)
            }
        };

        self.indices.insert(key, index);
        index
    }

    fn claim(&mut self, slots: u16) -> u16 {
        let index = self.next;
        self.next += slots;
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        self.add(PoolKey::Utf8(value.to_string()))
    }

    fn class(&mut self, name: &str) -> u16 {
        self.add(PoolKey::Class(name.to_string()))
    }
}

/// Builder for a class file carrying a header, members and runtime annotations
#[derive(Debug, Clone, Default)]
pub struct ClassFileBuilder {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<MemberTree>,
    methods: Vec<MemberTree>,
    annotations: Vec<AnnotationNode>,
}

impl ClassFileBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn super_name(mut self, name: impl Into<String>) -> Self {
        self.super_name = Some(name.into());
        self
    }

    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn field(mut self, field: MemberTree) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MemberTree) -> Self {
        self.methods.push(method);
        self
    }

    pub fn annotation(mut self, annotation: AnnotationNode) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = PoolWriter::new();
        let mut body = Vec::new();

        put_u2(&mut body, ACC_PUBLIC | ACC_ABSTRACT);
        put_u2(&mut body, pool.class(&self.name));
        let super_index = self.super_name.as_deref().map_or(0, |name| pool.class(name));
        put_u2(&mut body, super_index);

        put_u2(&mut body, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            put_u2(&mut body, pool.class(interface));
        }

        // Methods carry no code, so they are written abstract
        for (members, access) in [
            (&self.fields, ACC_PUBLIC),
            (&self.methods, ACC_PUBLIC | ACC_ABSTRACT),
        ] {
            put_u2(&mut body, members.len() as u16);
            for member in members {
                put_u2(&mut body, access);
                put_u2(&mut body, pool.utf8(&member.name));
                put_u2(&mut body, pool.utf8(&member.descriptor));
                write_attributes(
                    &mut body,
                    &mut pool,
                    member.signature.as_deref(),
                    &member.annotations,
                );
            }
        }

        write_attributes(&mut body, &mut pool, None, &self.annotations);

        let mut bytes = Vec::with_capacity(body.len() + pool.bytes.len() + 10);
        bytes.extend_from_slice(&CLASS_MAGIC.to_be_bytes());
        put_u2(&mut bytes, 0);
        put_u2(&mut bytes, MAJOR_VERSION);
        put_u2(&mut bytes, pool.next);
        bytes.extend_from_slice(&pool.bytes);
        bytes.extend_from_slice(&body);
        bytes
    }
}

/// Java's modified UTF-8: NUL as two bytes, supplementary characters as surrogate pairs
fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.len());

    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => bytes.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                bytes.push(0xC0 | (unit >> 6) as u8);
                bytes.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                bytes.push(0xE0 | (unit >> 12) as u8);
                bytes.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                bytes.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }

    bytes
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_attributes(
    out: &mut Vec<u8>,
    pool: &mut PoolWriter,
    signature: Option<&str>,
    annotations: &[AnnotationNode],
) {
    let visible: Vec<&AnnotationNode> = annotations.iter().filter(|a| a.visible).collect();
    let invisible: Vec<&AnnotationNode> = annotations.iter().filter(|a| !a.visible).collect();

    let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
    if let Some(signature) = signature {
        let name = pool.utf8(SIGNATURE);
        attributes.push((name, pool.utf8(signature).to_be_bytes().to_vec()));
    }

    for (name, group) in [
        (VISIBLE_ANNOTATIONS, visible),
        (INVISIBLE_ANNOTATIONS, invisible),
    ] {
        if group.is_empty() {
            continue;
        }

        let name = pool.utf8(name);
        let mut data = Vec::new();
        put_u2(&mut data, group.len() as u16);
        for annotation in group {
            write_annotation(&mut data, pool, annotation);
        }
        attributes.push((name, data));
    }

    put_u2(out, attributes.len() as u16);
    for (name, data) in attributes {
        put_u2(out, name);
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(&data);
    }
}

fn write_annotation(out: &mut Vec<u8>, pool: &mut PoolWriter, annotation: &AnnotationNode) {
    put_u2(out, pool.utf8(&annotation.desc));
    put_u2(out, annotation.values.len() as u16);
    for (name, value) in &annotation.values {
        put_u2(out, pool.utf8(name));
        write_element_value(out, pool, value);
    }
}

fn write_element_value(out: &mut Vec<u8>, pool: &mut PoolWriter, value: &AnnotationValue) {
    match value {
        AnnotationValue::Boolean(b) => {
            out.push(b'Z');
            put_u2(out, pool.add(PoolKey::Integer(*b as i32)));
        }
        AnnotationValue::Char(c) => {
            out.push(b'C');
            put_u2(out, pool.add(PoolKey::Integer(*c as i32)));
        }
        AnnotationValue::Int(n) => match i32::try_from(*n) {
            Ok(small) => {
                out.push(b'I');
                put_u2(out, pool.add(PoolKey::Integer(small)));
            }
            Err(_) => {
                out.push(b'J');
                put_u2(out, pool.add(PoolKey::Long(*n)));
            }
        },
        AnnotationValue::Float(f) => {
            out.push(b'D');
            put_u2(out, pool.add(PoolKey::Double(f.to_bits())));
        }
        AnnotationValue::String(s) => {
            out.push(b's');
            put_u2(out, pool.utf8(s));
        }
        AnnotationValue::Enum { desc, value } => {
            out.push(b'e');
            put_u2(out, pool.utf8(desc));
            put_u2(out, pool.utf8(value));
        }
        AnnotationValue::Class(desc) => {
            out.push(b'c');
            put_u2(out, pool.utf8(desc));
        }
        AnnotationValue::Annotation(nested) => {
            out.push(b'@');
            write_annotation(out, pool, nested);
        }
        AnnotationValue::Array(values) => {
            out.push(b'[');
            put_u2(out, values.len() as u16);
            for value in values {
                write_element_value(out, pool, value);
            }
        }
    }
}
