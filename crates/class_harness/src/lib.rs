use jclassfile::attributes::{Annotation, Attribute, ElementValue};
use jclassfile::class_file;
use jclassfile::constant_pool::ConstantPool;
use protocol::{AnnotationNode, AnnotationValue, ClassTree, MemberTree};
use thiserror::Error;
use tracing::trace;

#[cfg(any(test, feature = "test-support"))]
pub mod builder;

pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Error)]
pub enum ClassFileError {
    #[error("malformed class file: {0}")]
    Malformed(String),

    #[error("constant pool index {0} is out of range")]
    BadConstantIndex(u16),

    #[error("constant pool entry {index} is not a {expected} constant")]
    ConstantMismatch { index: u16, expected: &'static str },

    #[error("unknown annotation element tag {0:?}")]
    UnknownElementTag(char),
}

/// Whether an archive entry name denotes a compiled class
pub fn is_class_entry(name: &str) -> bool {
    name.ends_with(".class")
}

/// Parse a compiled class into the tree the remapper works on.
///
/// Only the class header, member names, descriptors, generic signatures and
/// runtime annotations are kept.
pub fn read_class(bytes: &[u8]) -> Result<ClassTree, ClassFileError> {
    let class_file =
        class_file::parse(bytes).map_err(|e| ClassFileError::Malformed(e.to_string()))?;
    let pool = Pool(class_file.constant_pool());

    let name = pool.class_name(class_file.this_class())?.to_string();
    let super_name = match class_file.super_class() {
        0 => None,
        index => Some(pool.class_name(index)?.to_string()),
    };

    let mut interfaces = Vec::new();
    for interface in class_file.interfaces() {
        interfaces.push(pool.class_name(*interface)?.to_string());
    }

    let mut fields = Vec::new();
    for field in class_file.fields() {
        fields.push(member(
            &pool,
            field.name_index(),
            field.descriptor_index(),
            field.attributes(),
        )?);
    }

    let mut methods = Vec::new();
    for method in class_file.methods() {
        methods.push(member(
            &pool,
            method.name_index(),
            method.descriptor_index(),
            method.attributes(),
        )?);
    }

    let (_, annotations) = read_attributes(&pool, class_file.attributes())?;

    trace!(
        "Read class {} ({} fields, {} methods)",
        name,
        fields.len(),
        methods.len()
    );

    Ok(ClassTree {
        name,
        super_name,
        interfaces,
        fields,
        methods,
        annotations,
    })
}

/// Typed lookups over the parsed constant pool, indexed the way the class file indexes it
struct Pool<'a>(&'a [ConstantPool]);

impl<'a> Pool<'a> {
    fn get(&self, index: u16) -> Result<&'a ConstantPool, ClassFileError> {
        match index {
            0 => Err(ClassFileError::BadConstantIndex(index)),
            _ => self
                .0
                .get(index as usize)
                .ok_or(ClassFileError::BadConstantIndex(index)),
        }
    }

    fn utf8(&self, index: u16) -> Result<&'a str, ClassFileError> {
        match self.get(index)? {
            ConstantPool::Utf8 { value } => Ok(value.as_str()),
            _ => Err(mismatch(index, "Utf8")),
        }
    }

    fn class_name(&self, index: u16) -> Result<&'a str, ClassFileError> {
        match self.get(index)? {
            ConstantPool::Class { name_index } => self.utf8(*name_index),
            _ => Err(mismatch(index, "Class")),
        }
    }

    fn integer(&self, index: u16) -> Result<i32, ClassFileError> {
        match self.get(index)? {
            ConstantPool::Integer { value } => Ok(*value),
            _ => Err(mismatch(index, "Integer")),
        }
    }

    fn long(&self, index: u16) -> Result<i64, ClassFileError> {
        match self.get(index)? {
            ConstantPool::Long { value } => Ok(*value),
            _ => Err(mismatch(index, "Long")),
        }
    }

    fn float(&self, index: u16) -> Result<f32, ClassFileError> {
        match self.get(index)? {
            ConstantPool::Float { value } => Ok(*value),
            _ => Err(mismatch(index, "Float")),
        }
    }

    fn double(&self, index: u16) -> Result<f64, ClassFileError> {
        match self.get(index)? {
            ConstantPool::Double { value } => Ok(*value),
            _ => Err(mismatch(index, "Double")),
        }
    }
}

fn mismatch(index: u16, expected: &'static str) -> ClassFileError {
    ClassFileError::ConstantMismatch { index, expected }
}

fn member(
    pool: &Pool<'_>,
    name_index: u16,
    descriptor_index: u16,
    attributes: &[Attribute],
) -> Result<MemberTree, ClassFileError> {
    let (signature, annotations) = read_attributes(pool, attributes)?;

    Ok(MemberTree {
        name: pool.utf8(name_index)?.to_string(),
        descriptor: pool.utf8(descriptor_index)?.to_string(),
        signature,
        annotations,
    })
}

/// Generic signature and runtime annotations; every other attribute is ignored
fn read_attributes(
    pool: &Pool<'_>,
    attributes: &[Attribute],
) -> Result<(Option<String>, Vec<AnnotationNode>), ClassFileError> {
    let mut signature = None;
    let mut annotations = Vec::new();

    for attribute in attributes {
        let (group, visible) = match attribute {
            Attribute::Signature { signature_index, .. } => {
                signature = Some(pool.utf8(*signature_index)?.to_string());
                continue;
            }
            Attribute::RuntimeVisibleAnnotations { annotations, .. } => (annotations, true),
            Attribute::RuntimeInvisibleAnnotations { annotations, .. } => (annotations, false),
            _ => continue,
        };

        for annotation in group {
            let mut node = annotation_node(pool, annotation)?;
            node.visible = visible;
            annotations.push(node);
        }
    }

    Ok((signature, annotations))
}

fn annotation_node(
    pool: &Pool<'_>,
    annotation: &Annotation,
) -> Result<AnnotationNode, ClassFileError> {
    let mut node = AnnotationNode::new(pool.utf8(annotation.type_index())?);

    for pair in annotation.element_value_pairs() {
        let name = pool.utf8(pair.element_name_index())?.to_string();
        node.values.push((name, element_value(pool, pair.value())?));
    }

    Ok(node)
}

fn element_value(pool: &Pool<'_>, value: &ElementValue) -> Result<AnnotationValue, ClassFileError> {
    let value = match value {
        ElementValue::ConstValueIndex {
            tag,
            const_value_index,
        } => {
            let index = *const_value_index;
            match char::from(*tag) {
                'B' | 'I' | 'S' => AnnotationValue::Int(pool.integer(index)? as i64),
                'J' => AnnotationValue::Int(pool.long(index)?),
                'Z' => AnnotationValue::Boolean(pool.integer(index)? != 0),
                'C' => {
                    let code = pool.integer(index)? as u32;
                    let value = char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
                    AnnotationValue::Char(value)
                }
                'F' => AnnotationValue::Float(pool.float(index)? as f64),
                'D' => AnnotationValue::Float(pool.double(index)?),
                's' => AnnotationValue::String(pool.utf8(index)?.to_string()),
                other => return Err(ClassFileError::UnknownElementTag(other)),
            }
        }
        ElementValue::EnumConstValue {
            type_name_index,
            const_name_index,
            ..
        } => AnnotationValue::Enum {
            desc: pool.utf8(*type_name_index)?.to_string(),
            value: pool.utf8(*const_name_index)?.to_string(),
        },
        ElementValue::ClassInfoIndex {
            class_info_index, ..
        } => {
            AnnotationValue::Class(pool.utf8(*class_info_index)?.to_string())
        }
        ElementValue::AnnotationValue {
            annotation_value: nested,
            ..
        } => {
            AnnotationValue::Annotation(annotation_node(pool, nested)?)
        }
        ElementValue::ArrayValue { values, .. } => AnnotationValue::Array(
            values
                .iter()
                .map(|value| element_value(pool, value))
                .collect::<Result<_, _>>()?,
        ),
    };

    Ok(value)
}

#[cfg(test)]
mod edge_cases;
