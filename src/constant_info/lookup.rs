use super::ConstantInfo;

/// Fetch a pool entry by its 1-based index.
pub fn get_constant(const_pool: &[ConstantInfo], index: u16) -> Option<&ConstantInfo> {
    const_pool.get((index as usize).checked_sub(1)?)
}

/// Look up a UTF-8 constant pool entry by 1-based index.
pub fn get_utf8(const_pool: &[ConstantInfo], index: u16) -> Option<&str> {
    match get_constant(const_pool, index)? {
        ConstantInfo::Utf8(u) => Some(&u.utf8_string),
        _ => None,
    }
}

/// Resolve a Class constant to its internal name.
pub fn get_class_name(const_pool: &[ConstantInfo], class_index: u16) -> Option<&str> {
    match get_constant(const_pool, class_index)? {
        ConstantInfo::Class(c) => get_utf8(const_pool, c.name_index),
        _ => None,
    }
}

/// Resolve a NameAndType constant to (name, descriptor).
pub fn get_name_and_type(const_pool: &[ConstantInfo], nat_index: u16) -> Option<(&str, &str)> {
    match get_constant(const_pool, nat_index)? {
        ConstantInfo::NameAndType(nat) => {
            let name = get_utf8(const_pool, nat.name_index)?;
            let desc = get_utf8(const_pool, nat.descriptor_index)?;
            Some((name, desc))
        }
        _ => None,
    }
}

/// Resolve a FieldRef, MethodRef, or InterfaceMethodRef to (class_name, member_name, descriptor).
pub fn resolve_ref(const_pool: &[ConstantInfo], index: u16) -> Option<(&str, &str, &str)> {
    let (class_index, nat_index) = match get_constant(const_pool, index)? {
        ConstantInfo::FieldRef(r) => (r.class_index, r.name_and_type_index),
        ConstantInfo::MethodRef(r) => (r.class_index, r.name_and_type_index),
        ConstantInfo::InterfaceMethodRef(r) => (r.class_index, r.name_and_type_index),
        _ => return None,
    };
    let class_name = get_class_name(const_pool, class_index)?;
    let (name, desc) = get_name_and_type(const_pool, nat_index)?;
    Some((class_name, name, desc))
}

/// Resolve a MethodHandle to (reference_kind, class_name, member_name, descriptor).
pub fn resolve_method_handle(
    const_pool: &[ConstantInfo],
    index: u16,
) -> Option<(u8, &str, &str, &str)> {
    match get_constant(const_pool, index)? {
        ConstantInfo::MethodHandle(h) => {
            let (class, name, desc) = resolve_ref(const_pool, h.reference_index)?;
            Some((h.reference_kind, class, name, desc))
        }
        _ => None,
    }
}

/// Resolve a MethodType constant to its descriptor.
pub fn get_method_type(const_pool: &[ConstantInfo], index: u16) -> Option<&str> {
    match get_constant(const_pool, index)? {
        ConstantInfo::MethodType(t) => get_utf8(const_pool, t.descriptor_index),
        _ => None,
    }
}

/// Render a loadable constant the way `ldc` shows it: strings quoted, classes
/// by internal name, numbers in their plain decimal form.
pub fn format_constant(const_pool: &[ConstantInfo], index: u16) -> Option<String> {
    Some(match get_constant(const_pool, index)? {
        ConstantInfo::Integer(c) => c.value.to_string(),
        ConstantInfo::Float(c) => format!("{:?}", c.value),
        ConstantInfo::Long(c) => c.value.to_string(),
        ConstantInfo::Double(c) => format!("{:?}", c.value),
        ConstantInfo::String(c) => format!("\"{}\"", get_utf8(const_pool, c.string_index)?),
        ConstantInfo::Class(c) => get_utf8(const_pool, c.name_index)?.to_string(),
        ConstantInfo::Utf8(c) => c.utf8_string.clone(),
        ConstantInfo::MethodType(_) => get_method_type(const_pool, index)?.to_string(),
        _ => return None,
    })
}
