//! Method signatures and JVM descriptor rendering/parsing

use thiserror::Error;

use super::Type;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("invalid type descriptor: {0}")]
    InvalidTypeDescriptor(String),
    #[error("invalid method descriptor: {0}")]
    InvalidMethodDescriptor(String),
}

/// The identity of a method shape: return type plus the ordered parameter
/// type list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub return_type: Type,
    pub parameter_types: Vec<Type>,
}

impl MethodSignature {
    pub fn new(return_type: Type, parameter_types: Vec<Type>) -> Self {
        Self { return_type, parameter_types }
    }

    /// Total parameter storage slots, double-width primitives counting two.
    pub fn parameter_slots(&self) -> u16 {
        self.parameter_types.iter().map(|t| t.size()).sum()
    }

    pub fn descriptor(&self) -> String {
        let mut descriptor = String::from("(");
        for parameter in &self.parameter_types {
            descriptor.push_str(&type_descriptor(parameter));
        }
        descriptor.push(')');
        descriptor.push_str(&type_descriptor(&self.return_type));
        descriptor
    }
}

pub fn type_descriptor(ty: &Type) -> String {
    match ty {
        Type::Void => "V".to_string(),
        Type::Boolean => "Z".to_string(),
        Type::Byte => "B".to_string(),
        Type::Char => "C".to_string(),
        Type::Short => "S".to_string(),
        Type::Int => "I".to_string(),
        Type::Long => "J".to_string(),
        Type::Float => "F".to_string(),
        Type::Double => "D".to_string(),
        // The null type never reaches a descriptor position in a checked
        // tree; render its upper bound.
        Type::Null => format!("L{};", "java/lang/Object"),
        Type::Array(element) => format!("[{}", type_descriptor(element)),
        Type::Class(name) => format!("L{};", name.replace('.', "/")),
    }
}

/// Parse a single field descriptor such as `I`, `[J` or `Ljava/lang/String;`.
pub fn parse_field_descriptor(descriptor: &str) -> Result<Type, DescriptorError> {
    let mut chars = descriptor.chars();
    let (ty, rest) = parse_one(&mut chars, descriptor)?;
    if rest != 0 {
        return Err(DescriptorError::InvalidTypeDescriptor(descriptor.to_string()));
    }
    Ok(ty)
}

/// Parse a method descriptor such as `(IJ)Ljava/lang/String;`.
pub fn parse_method_descriptor(descriptor: &str) -> Result<MethodSignature, DescriptorError> {
    let invalid = || DescriptorError::InvalidMethodDescriptor(descriptor.to_string());
    let rest = descriptor.strip_prefix('(').ok_or_else(invalid)?;
    let close = rest.find(')').ok_or_else(invalid)?;
    let (params, ret) = (&rest[..close], &rest[close + 1..]);

    let mut parameter_types = Vec::new();
    let mut chars = params.chars();
    loop {
        let remaining: String = chars.clone().collect();
        if remaining.is_empty() {
            break;
        }
        let (ty, _) = parse_one(&mut chars, descriptor)?;
        parameter_types.push(ty);
    }
    let return_type = parse_field_descriptor(ret)
        .map_err(|_| DescriptorError::InvalidMethodDescriptor(descriptor.to_string()))?;
    Ok(MethodSignature::new(return_type, parameter_types))
}

/// Parse one type from the iterator; returns the type and how many chars
/// remain unconsumed.
fn parse_one(
    chars: &mut std::str::Chars<'_>,
    whole: &str,
) -> Result<(Type, usize), DescriptorError> {
    let invalid = || DescriptorError::InvalidTypeDescriptor(whole.to_string());
    let ty = match chars.next().ok_or_else(invalid)? {
        'V' => Type::Void,
        'Z' => Type::Boolean,
        'B' => Type::Byte,
        'C' => Type::Char,
        'S' => Type::Short,
        'I' => Type::Int,
        'J' => Type::Long,
        'F' => Type::Float,
        'D' => Type::Double,
        '[' => {
            let (element, _) = parse_one(chars, whole)?;
            Type::array_of(element)
        }
        'L' => {
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some(';') => break,
                    Some(c) => name.push(c),
                    None => return Err(invalid()),
                }
            }
            Type::Class(name.replace('/', "."))
        }
        _ => return Err(invalid()),
    };
    Ok((ty, chars.clone().count()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_round_trip() {
        let signature = MethodSignature::new(
            Type::string(),
            vec![Type::Int, Type::Long, Type::array_of(Type::Double)],
        );
        let descriptor = signature.descriptor();
        assert_eq!(descriptor, "(IJ[D)Ljava/lang/String;");
        let parsed = parse_method_descriptor(&descriptor).expect("parse");
        assert_eq!(parsed, signature);
    }

    #[test]
    fn parameter_slots_count_wide_primitives() {
        let signature = MethodSignature::new(Type::Void, vec![Type::Long, Type::Int, Type::Double]);
        assert_eq!(signature.parameter_slots(), 5);
    }

    #[test]
    fn rejects_malformed_descriptors() {
        assert!(parse_field_descriptor("Q").is_err());
        assert!(parse_field_descriptor("II").is_err());
        assert!(parse_method_descriptor("(I").is_err());
        assert!(parse_method_descriptor("(Ljava/lang/String)V").is_err());
    }
}
