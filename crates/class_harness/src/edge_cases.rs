use crate::builder::ClassFileBuilder;
use crate::*;

// magic, minor 0, major 61
const HEADER: [u8; 8] = [0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 61];

fn class_bytes(pool_count: u16, pool: &[u8], this_class: u16) -> Vec<u8> {
    let mut bytes = HEADER.to_vec();
    bytes.extend_from_slice(&pool_count.to_be_bytes());
    bytes.extend_from_slice(pool);
    // access, this, super 0, no interfaces, fields, methods or attributes
    bytes.extend_from_slice(&[0, 1]);
    bytes.extend_from_slice(&this_class.to_be_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    bytes
}

#[test]
fn test_empty_input() {
    assert!(matches!(read_class(&[]), Err(ClassFileError::Malformed(_))));
}

#[test]
fn test_header_only() {
    assert!(matches!(read_class(&HEADER), Err(ClassFileError::Malformed(_))));
}

#[test]
fn test_wide_constant_in_last_slot_is_an_error() {
    // One declared slot holding a Long, then nothing
    let mut bytes = HEADER.to_vec();
    bytes.extend_from_slice(&[0, 2, 5, 0, 0, 0, 0, 0, 0, 0, 42]);

    assert!(read_class(&bytes).is_err());
}

#[test]
fn test_truncated_members_are_an_error() {
    let bytes = ClassFileBuilder::new("foo/Sample")
        .super_name("java/lang/Object")
        .method(MemberTree::new("run", "()V"))
        .build();
    assert!(read_class(&bytes).is_ok());

    let result = read_class(&bytes[..bytes.len() - 4]);
    assert!(matches!(result, Err(ClassFileError::Malformed(_))));
}

#[test]
fn test_this_class_pointing_at_utf8() {
    let bytes = class_bytes(2, &[1, 0, 1, b'A'], 1);

    assert!(matches!(
        read_class(&bytes),
        Err(ClassFileError::ConstantMismatch {
            index: 1,
            expected: "Class"
        })
    ));
}

#[test]
fn test_out_of_range_constant() {
    let bytes = class_bytes(2, &[1, 0, 1, b'A'], 9);

    assert!(matches!(
        read_class(&bytes),
        Err(ClassFileError::BadConstantIndex(9))
    ));
}

#[test]
fn test_element_tag_must_match_its_constant() {
    let annotation = AnnotationNode::new("Lfoo/Marker;").with("value", AnnotationValue::Int(7));
    let mut bytes = ClassFileBuilder::new("foo/Marked")
        .annotation(annotation)
        .build();

    // The element tag is the last 'I' byte; only its constant index follows.
    // Retagged as a string, it points at an Integer constant.
    let position = bytes.iter().rposition(|&b| b == b'I').unwrap();
    bytes[position] = b's';

    assert!(matches!(
        read_class(&bytes),
        Err(ClassFileError::ConstantMismatch {
            expected: "Utf8",
            ..
        })
    ));
}
