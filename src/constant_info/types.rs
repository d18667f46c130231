use binrw::{BinRead, BinResult, Endian};

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big, return_unexpected_error)]
pub enum ConstantInfo {
    #[br(magic = 1u8)]
    Utf8(Utf8Constant),
    #[br(magic = 3u8)]
    Integer(IntegerConstant),
    #[br(magic = 4u8)]
    Float(FloatConstant),
    #[br(magic = 5u8)]
    Long(LongConstant),
    #[br(magic = 6u8)]
    Double(DoubleConstant),
    #[br(magic = 7u8)]
    Class(ClassConstant),
    #[br(magic = 8u8)]
    String(StringConstant),
    #[br(magic = 9u8)]
    FieldRef(FieldRefConstant),
    #[br(magic = 10u8)]
    MethodRef(MethodRefConstant),
    #[br(magic = 11u8)]
    InterfaceMethodRef(InterfaceMethodRefConstant),
    #[br(magic = 12u8)]
    NameAndType(NameAndTypeConstant),
    #[br(magic = 15u8)]
    MethodHandle(MethodHandleConstant),
    #[br(magic = 16u8)]
    MethodType(MethodTypeConstant),
    #[br(magic = 17u8)]
    Dynamic(DynamicConstant),
    #[br(magic = 18u8)]
    InvokeDynamic(InvokeDynamicConstant),
    #[br(magic = 19u8)]
    Module(ModuleConstant),
    #[br(magic = 20u8)]
    Package(PackageConstant),
    // Occupies the slot after a Long or Double. Tag 0 never appears in a
    // well-formed pool, the pool parser inserts this variant itself.
    #[br(magic = 0u8)]
    Unusable,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct Utf8Constant {
    pub length: u16,
    #[br(count = length as usize, map = |bytes: Vec<u8>| decode_modified_utf8(&bytes))]
    pub utf8_string: String,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct IntegerConstant {
    pub value: i32,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct FloatConstant {
    pub value: f32,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct LongConstant {
    pub value: i64,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct DoubleConstant {
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct ClassConstant {
    pub name_index: u16,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct StringConstant {
    pub string_index: u16,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct FieldRefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct MethodRefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct InterfaceMethodRefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct NameAndTypeConstant {
    pub name_index: u16,
    pub descriptor_index: u16,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct MethodHandleConstant {
    pub reference_kind: u8,
    pub reference_index: u16,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct MethodTypeConstant {
    pub descriptor_index: u16,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct DynamicConstant {
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct InvokeDynamicConstant {
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct ModuleConstant {
    pub name_index: u16,
}

#[derive(Clone, Debug, PartialEq, BinRead)]
#[br(big)]
pub struct PackageConstant {
    pub name_index: u16,
}

/// Reads `count - 1` pool entries, inserting an `Unusable` slot after every
/// long and double so that 1-based indexes line up with the class file.
#[binrw::parser(reader, endian)]
pub fn constant_pool_parser(count: u16) -> BinResult<Vec<ConstantInfo>> {
    let mut pool = Vec::with_capacity(count as usize);
    let mut index = 1u16;
    while index < count {
        let entry = ConstantInfo::read_options(reader, endian, ())?;
        let wide = matches!(entry, ConstantInfo::Long(_) | ConstantInfo::Double(_));
        pool.push(entry);
        index += 1;
        if wide {
            pool.push(ConstantInfo::Unusable);
            index += 1;
        }
    }
    Ok(pool)
}

/// Parses a standalone pool (without the leading count), as found in tests
/// and hand-assembled classes.
pub fn read_constant_pool(bytes: &[u8], count: u16) -> BinResult<Vec<ConstantInfo>> {
    let mut cursor = std::io::Cursor::new(bytes);
    constant_pool_parser(&mut cursor, Endian::Big, (count,))
}

/// Decodes the JVM's modified UTF-8: NUL is `C0 80` and supplementary
/// characters are stored as two encoded surrogates.
pub fn decode_modified_utf8(bytes: &[u8]) -> String {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i] as u16;
        if b & 0x80 == 0 {
            units.push(b);
            i += 1;
        } else if b & 0xe0 == 0xc0 && i + 1 < bytes.len() {
            units.push(((b & 0x1f) << 6) | (bytes[i + 1] as u16 & 0x3f));
            i += 2;
        } else if b & 0xf0 == 0xe0 && i + 2 < bytes.len() {
            units.push(
                ((b & 0x0f) << 12)
                    | ((bytes[i + 1] as u16 & 0x3f) << 6)
                    | (bytes[i + 2] as u16 & 0x3f),
            );
            i += 3;
        } else {
            units.push(0xfffd);
            i += 1;
        }
    }
    String::from_utf16_lossy(&units)
}
