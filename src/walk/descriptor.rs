/// JVM type descriptor and method descriptor parser.
use crate::error::{Error, Result};

/// Represents a JVM type from a descriptor string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum JvmType {
    Int,
    Long,
    Float,
    Double,
    Byte,
    Char,
    Short,
    Boolean,
    Void,
    Reference(String),
    Array(Box<JvmType>),
}

impl JvmType {
    /// Returns true if this type occupies two slots on the JVM stack.
    pub fn is_wide(&self) -> bool {
        matches!(self, JvmType::Long | JvmType::Double)
    }

    /// The element type with every array dimension stripped.
    pub fn base(&self) -> &JvmType {
        match self {
            JvmType::Array(inner) => inner.base(),
            other => other,
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            JvmType::Array(inner) => 1 + inner.dimensions(),
            _ => 0,
        }
    }

    /// Name of the base type: `int`, `void`, or an internal class name such
    /// as `java/lang/String`. Arrays report their element's name.
    pub fn base_name(&self) -> &str {
        match self.base() {
            JvmType::Int => "int",
            JvmType::Long => "long",
            JvmType::Float => "float",
            JvmType::Double => "double",
            JvmType::Byte => "byte",
            JvmType::Char => "char",
            JvmType::Short => "short",
            JvmType::Boolean => "boolean",
            JvmType::Void => "void",
            JvmType::Reference(name) => name,
            JvmType::Array(_) => unreachable!("base() strips arrays"),
        }
    }

    /// Whether this is exactly the reference type `class_name`.
    pub fn is_class(&self, class_name: &str) -> bool {
        matches!(self, JvmType::Reference(name) if name == class_name)
    }

    /// Returns the JVM descriptor string for this type.
    pub fn to_descriptor(&self) -> String {
        match self {
            JvmType::Int => "I".into(),
            JvmType::Long => "J".into(),
            JvmType::Float => "F".into(),
            JvmType::Double => "D".into(),
            JvmType::Byte => "B".into(),
            JvmType::Char => "C".into(),
            JvmType::Short => "S".into(),
            JvmType::Boolean => "Z".into(),
            JvmType::Void => "V".into(),
            JvmType::Reference(name) => format!("L{};", name),
            JvmType::Array(inner) => format!("[{}", inner.to_descriptor()),
        }
    }
}

/// Parse a single type descriptor starting at position `pos` in `desc`.
/// Returns (JvmType, next_position).
pub fn parse_type_at(desc: &str, pos: usize) -> Option<(JvmType, usize)> {
    let bytes = desc.as_bytes();
    if pos >= bytes.len() {
        return None;
    }
    match bytes[pos] {
        b'B' => Some((JvmType::Byte, pos + 1)),
        b'C' => Some((JvmType::Char, pos + 1)),
        b'D' => Some((JvmType::Double, pos + 1)),
        b'F' => Some((JvmType::Float, pos + 1)),
        b'I' => Some((JvmType::Int, pos + 1)),
        b'J' => Some((JvmType::Long, pos + 1)),
        b'S' => Some((JvmType::Short, pos + 1)),
        b'Z' => Some((JvmType::Boolean, pos + 1)),
        b'V' => Some((JvmType::Void, pos + 1)),
        b'L' => {
            let semi = desc[pos + 1..].find(';')?;
            let class_name = &desc[pos + 1..pos + 1 + semi];
            Some((JvmType::Reference(class_name.to_string()), pos + 1 + semi + 1))
        }
        b'[' => {
            let (inner, next) = parse_type_at(desc, pos + 1)?;
            Some((JvmType::Array(Box::new(inner)), next))
        }
        _ => None,
    }
}

/// Parse a full field descriptor string.
pub fn parse_type_descriptor(desc: &str) -> Result<JvmType> {
    match parse_type_at(desc, 0) {
        Some((ty, end)) if end == desc.len() => Ok(ty),
        _ => Err(Error::Descriptor(desc.to_string())),
    }
}

/// A parsed method descriptor that remembers its source text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub args: Vec<JvmType>,
    pub returns: JvmType,
    pub raw: String,
}

impl MethodDescriptor {
    /// Parse a method descriptor, e.g. "(II)V" -> ([Int, Int], Void)
    pub fn parse(desc: &str) -> Result<Self> {
        let malformed = || Error::Descriptor(desc.to_string());
        if !desc.starts_with('(') {
            return Err(malformed());
        }
        let close = desc.find(')').ok_or_else(malformed)?;
        let mut args = Vec::new();
        let mut pos = 1;
        while pos < close {
            let (ty, next) = parse_type_at(desc, pos).ok_or_else(malformed)?;
            args.push(ty);
            pos = next;
        }
        let (returns, end) = parse_type_at(desc, close + 1).ok_or_else(malformed)?;
        if end != desc.len() {
            return Err(malformed());
        }
        Ok(MethodDescriptor {
            args,
            returns,
            raw: desc.to_string(),
        })
    }

    /// The argument part of the descriptor, parentheses included: `(ILjava/lang/String;)`.
    pub fn args_descriptor(&self) -> &str {
        match self.raw.find(')') {
            Some(close) => &self.raw[..=close],
            None => &self.raw,
        }
    }

    pub fn returns_void(&self) -> bool {
        self.returns == JvmType::Void
    }

    /// Number of local variable slots the arguments occupy.
    pub fn arg_slots(&self) -> usize {
        self.args.iter().map(|a| if a.is_wide() { 2 } else { 1 }).sum()
    }
}

impl std::fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Convert internal class name to source name.
pub fn internal_to_source_name(name: &str) -> String {
    name.replace('/', ".")
}

/// Class name as shown in synthesized expressions: dotted, arrays as `X[]`,
/// and the `java.lang.`/`java.util.` prefixes dropped.
pub fn display_class_name(internal: &str) -> String {
    let mut name = internal_to_source_name(internal);
    if internal.starts_with('[') {
        if let Some((ty, _)) = parse_type_at(internal, 0) {
            name = format!(
                "{}{}",
                internal_to_source_name(ty.base_name()),
                "[]".repeat(ty.dimensions())
            );
        }
    }
    match name.strip_prefix("java.lang.").or_else(|| name.strip_prefix("java.util.")) {
        Some(short) => short.to_string(),
        None => name,
    }
}

/// Convert a newarray type code to the primitive element name.
pub fn newarray_type(atype: u8) -> Option<&'static str> {
    Some(match atype {
        4 => "boolean",
        5 => "char",
        6 => "float",
        7 => "double",
        8 => "byte",
        9 => "short",
        10 => "int",
        11 => "long",
        _ => return None,
    })
}
