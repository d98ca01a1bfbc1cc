//! JVM type descriptors and generic signatures.
//!
//! Decoding erases generic information: type arguments are skipped, type
//! variables become `Ljava/lang/Object;` and inner class types are joined with
//! `$`. Formal type parameters and throws clauses sit outside any parameter or
//! return-type context and are ignored.

use thiserror::Error;

pub const OBJECT: &str = "Ljava/lang/Object;";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("unexpected end of descriptor {input:?}")]
    UnexpectedEnd { input: String },

    #[error("unexpected {found:?} at offset {position} in descriptor {input:?}")]
    UnexpectedChar {
        input: String,
        position: usize,
        found: char,
    },

    #[error("descriptor {input:?} has no parameter list")]
    MissingParameters { input: String },
}

/// Lookup of target-namespace class tokens, implemented by the mapping table
pub trait ClassMapper {
    /// Target token for a source-namespace class token such as `Lfoo/Bar;`
    fn map_class(&self, token: &str) -> Option<&str>;
}

/// Erased parameter and return types of a method, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodSignature {
    pub params: Vec<String>,
    pub return_type: String,
}

impl MethodSignature {
    pub fn to_descriptor(&self) -> String {
        format!("({}){}", self.params.concat(), self.return_type)
    }
}

struct SignatureReader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> SignatureReader<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn next(&mut self) -> Result<char, DescriptorError> {
        let c = self.peek().ok_or_else(|| self.end())?;
        self.pos += c.len_utf8();
        Ok(c)
    }

    fn end(&self) -> DescriptorError {
        DescriptorError::UnexpectedEnd {
            input: self.input.to_string(),
        }
    }

    fn unexpected(&self, position: usize, found: char) -> DescriptorError {
        DescriptorError::UnexpectedChar {
            input: self.input.to_string(),
            position,
            found,
        }
    }

    fn read_until(&mut self, terminator: char) -> Result<(), DescriptorError> {
        while self.next()? != terminator {}
        Ok(())
    }

    fn skip_type_parameters(&mut self) -> Result<(), DescriptorError> {
        if self.peek() != Some('<') {
            return Ok(());
        }

        let mut depth = 0usize;
        loop {
            match self.next()? {
                '<' => depth += 1,
                '>' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    fn read_method(&mut self) -> Result<MethodSignature, DescriptorError> {
        self.skip_type_parameters()?;

        if self.peek() != Some('(') {
            return Err(DescriptorError::MissingParameters {
                input: self.input.to_string(),
            });
        }
        self.next()?;

        let mut params = Vec::new();
        while self.peek() != Some(')') {
            params.push(self.read_type()?);
        }
        self.next()?;

        let return_type = if self.peek() == Some('V') {
            self.next()?;
            "V".to_string()
        } else {
            self.read_type()?
        };

        Ok(MethodSignature { params, return_type })
    }

    fn read_type(&mut self) -> Result<String, DescriptorError> {
        let mut dimensions = 0;
        while self.peek() == Some('[') {
            self.next()?;
            dimensions += 1;
        }

        let position = self.pos;
        let base = match self.next()? {
            c @ ('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => c.to_string(),
            'L' => self.read_class_type(position)?,
            'T' => {
                self.read_until(';')?;
                OBJECT.to_string()
            }
            c => return Err(self.unexpected(position, c)),
        };

        Ok(format!("{}{}", "[".repeat(dimensions), base))
    }

    fn read_class_type(&mut self, start: usize) -> Result<String, DescriptorError> {
        let mut name = String::new();
        loop {
            match self.next()? {
                ';' => break,
                '<' => self.skip_type_arguments()?,
                '.' => name.push('$'),
                c => name.push(c),
            }
        }

        if name.is_empty() {
            return Err(self.unexpected(start + 1, ';'));
        }
        Ok(format!("L{};", name))
    }

    // The opening `<` has already been consumed
    fn skip_type_arguments(&mut self) -> Result<(), DescriptorError> {
        loop {
            match self.peek() {
                Some('>') => {
                    self.next()?;
                    return Ok(());
                }
                Some(_) => {
                    self.read_type_argument()?;
                }
                None => return Err(self.end()),
            }
        }
    }

    fn read_type_argument(&mut self) -> Result<String, DescriptorError> {
        match self.peek() {
            Some('*') => {
                self.next()?;
                Ok(OBJECT.to_string())
            }
            Some('+') | Some('-') => {
                self.next()?;
                self.read_type()
            }
            _ => self.read_type(),
        }
    }
}

/// Decode a method descriptor or generic method signature into erased parameter and return types
pub fn decode_signature(signature: &str) -> Result<MethodSignature, DescriptorError> {
    SignatureReader::new(signature).read_method()
}

/// Decode a run of type tokens such as `I[JLfoo/Bar;`
pub fn decode_types(descriptor: &str) -> Result<Vec<String>, DescriptorError> {
    let mut reader = SignatureReader::new(descriptor);
    let mut types = Vec::new();
    while !reader.at_end() {
        types.push(reader.read_type()?);
    }
    Ok(types)
}

/// Erased type argument of the first occurrence of class `class` (bare name) in a signature
pub fn type_argument_of(signature: &str, class: &str) -> Option<String> {
    let marker = format!("L{}<", class);
    let start = signature.find(&marker)? + marker.len();
    SignatureReader::new(&signature[start..])
        .read_type_argument()
        .ok()
}

/// Map one type token to the target namespace, keeping its array dimensions.
/// Primitive and unmapped tokens pass through unchanged.
pub fn map_descriptor_token<M: ClassMapper + ?Sized>(token: &str, mapper: &M) -> String {
    let base = token.trim_start_matches('[');
    let dimensions = &token[..token.len() - base.len()];

    if base.starts_with('L') && base.ends_with(';') {
        if let Some(target) = mapper.map_class(base) {
            return format!("{}{}", dimensions, target);
        }
    }

    token.to_string()
}

/// Map every class token of a field or method descriptor, preserving its shape
pub fn map_full_descriptor<M: ClassMapper + ?Sized>(
    descriptor: &str,
    mapper: &M,
) -> Result<String, DescriptorError> {
    if descriptor.starts_with('(') || descriptor.starts_with('<') {
        let signature = decode_signature(descriptor)?;
        let mapped = MethodSignature {
            params: signature
                .params
                .iter()
                .map(|param| map_descriptor_token(param, mapper))
                .collect(),
            return_type: map_descriptor_token(&signature.return_type, mapper),
        };
        return Ok(mapped.to_descriptor());
    }

    Ok(decode_types(descriptor)?
        .iter()
        .map(|token| map_descriptor_token(token, mapper))
        .collect())
}

/// Map a method descriptor or signature to a canonical target-namespace descriptor.
/// A boxed primitive return type is normalized to its primitive code.
pub fn map_method_descriptor<M: ClassMapper + ?Sized>(
    descriptor: &str,
    mapper: &M,
) -> Result<String, DescriptorError> {
    let signature = decode_signature(descriptor)?;
    let params: String = signature
        .params
        .iter()
        .map(|param| map_descriptor_token(param, mapper))
        .collect();
    let return_type = map_descriptor_token(&signature.return_type, mapper);

    Ok(format!("({}){}", params, unbox_primitive(&return_type)))
}

/// Primitive code for a boxed wrapper class token; anything else is returned as is
pub fn unbox_primitive(token: &str) -> &str {
    match token {
        "Ljava/lang/Boolean;" => "Z",
        "Ljava/lang/Character;" => "C",
        "Ljava/lang/Byte;" => "B",
        "Ljava/lang/Short;" => "S",
        "Ljava/lang/Integer;" => "I",
        "Ljava/lang/Float;" => "F",
        "Ljava/lang/Long;" => "J",
        "Ljava/lang/Double;" => "D",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TestMapper(HashMap<String, String>);

    impl TestMapper {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self(
                pairs
                    .iter()
                    .map(|(from, to)| (from.to_string(), to.to_string()))
                    .collect(),
            )
        }
    }

    impl ClassMapper for TestMapper {
        fn map_class(&self, token: &str) -> Option<&str> {
            self.0.get(token).map(String::as_str)
        }
    }

    #[test]
    fn test_decode_plain_descriptor() {
        let signature = decode_signature("(I[[JLjava/lang/String;)Z").unwrap();
        assert_eq!(signature.params, vec!["I", "[[J", "Ljava/lang/String;"]);
        assert_eq!(signature.return_type, "Z");

        let void = decode_signature("()V").unwrap();
        assert!(void.params.is_empty());
        assert_eq!(void.return_type, "V");
    }

    #[test]
    fn test_decode_generic_signature_erases_arguments() {
        let signature = decode_signature(
            "<T:Ljava/lang/Object;>(Ljava/util/List<Ljava/lang/String;>;TT;[TT;)Ljava/util/Map<TT;+Ljava/lang/Number;>;^Ljava/io/IOException;",
        )
        .unwrap();

        assert_eq!(
            signature.params,
            vec!["Ljava/util/List;", "Ljava/lang/Object;", "[Ljava/lang/Object;"]
        );
        assert_eq!(signature.return_type, "Ljava/util/Map;");
    }

    #[test]
    fn test_decode_inner_class_signature() {
        let signature = decode_signature("(Lfoo/Outer<TK;>.Inner<TV;>;)V").unwrap();
        assert_eq!(signature.params, vec!["Lfoo/Outer$Inner;"]);
    }

    #[test]
    fn test_decode_malformed_descriptors() {
        assert!(matches!(
            decode_signature("I"),
            Err(DescriptorError::MissingParameters { .. })
        ));
        assert!(matches!(
            decode_signature("(I"),
            Err(DescriptorError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            decode_signature("(Ljava/lang/String)V"),
            Err(DescriptorError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            decode_signature("(Q)V"),
            Err(DescriptorError::UnexpectedChar { found: 'Q', position: 1, .. })
        ));
        assert!(matches!(
            decode_signature("(V)V"),
            Err(DescriptorError::UnexpectedChar { found: 'V', .. })
        ));
        assert!(matches!(
            decode_signature("()"),
            Err(DescriptorError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn test_map_descriptor_token() {
        let mapper = TestMapper::new(&[("Lfoo/Bar;", "Lfoo/Baz;")]);

        assert_eq!(map_descriptor_token("Lfoo/Bar;", &mapper), "Lfoo/Baz;");
        assert_eq!(map_descriptor_token("[[Lfoo/Bar;", &mapper), "[[Lfoo/Baz;");
        assert_eq!(map_descriptor_token("Lfoo/Other;", &mapper), "Lfoo/Other;");
        assert_eq!(map_descriptor_token("[I", &mapper), "[I");
        assert_eq!(map_descriptor_token("J", &mapper), "J");
    }

    #[test]
    fn test_map_full_descriptor_keeps_primitives() {
        let mapper = TestMapper::new(&[("Lfoo/Bar;", "Lfoo/Baz;")]);

        for descriptor in ["I", "[[I", "(IJ)V", "([Z[[D)[B", "", "()J"] {
            assert_eq!(map_full_descriptor(descriptor, &mapper).unwrap(), descriptor);
        }

        assert_eq!(
            map_full_descriptor("(Lfoo/Bar;I)[Lfoo/Bar;", &mapper).unwrap(),
            "(Lfoo/Baz;I)[Lfoo/Baz;"
        );
        assert_eq!(map_full_descriptor("[Lfoo/Bar;", &mapper).unwrap(), "[Lfoo/Baz;");
    }

    #[test]
    fn test_map_method_descriptor_unboxes_return() {
        let mapper = TestMapper::new(&[("Lfoo/Bar;", "Lfoo/Baz;")]);

        assert_eq!(
            map_method_descriptor("(Lfoo/Bar;)Ljava/lang/Integer;", &mapper).unwrap(),
            "(Lfoo/Baz;)I"
        );
        assert_eq!(
            map_method_descriptor("()Ljava/lang/Character;", &mapper).unwrap(),
            "()C"
        );
        assert_eq!(
            map_method_descriptor("(Ljava/lang/Integer;)V", &mapper).unwrap(),
            "(Ljava/lang/Integer;)V"
        );
        assert!(map_method_descriptor("tick", &mapper).is_err());
    }

    #[test]
    fn test_type_argument_of() {
        let cir = "org/spongepowered/asm/mixin/injection/callback/CallbackInfoReturnable";
        let signature = format!("(IL{}<Ljava/lang/Boolean;>;)V", cir);
        assert_eq!(
            type_argument_of(&signature, cir).as_deref(),
            Some("Ljava/lang/Boolean;")
        );

        let wildcard = format!("(L{}<*>;)V", cir);
        assert_eq!(type_argument_of(&wildcard, cir).as_deref(), Some(OBJECT));

        assert_eq!(type_argument_of("()V", cir), None);
    }
}
