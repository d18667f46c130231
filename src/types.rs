use crate::attribute_info::AttributeInfo;
use crate::constant_info::{constant_pool_parser, get_class_name, get_utf8, ConstantInfo};
use crate::field_info::FieldInfo;
use crate::method_info::MethodInfo;

use binrw::BinRead;

#[derive(Clone, Debug, BinRead)]
#[br(big, magic = b"\xca\xfe\xba\xbe")]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub const_pool_size: u16,
    #[br(parse_with = constant_pool_parser, args(const_pool_size))]
    pub const_pool: Vec<ConstantInfo>,
    pub access_flags: ClassAccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces_count: u16,
    #[br(count = interfaces_count as usize)]
    pub interfaces: Vec<u16>,
    pub fields_count: u16,
    #[br(count = fields_count as usize)]
    pub fields: Vec<FieldInfo>,
    pub methods_count: u16,
    #[br(count = methods_count as usize)]
    pub methods: Vec<MethodInfo>,
    pub attributes_count: u16,
    #[br(count = attributes_count as usize)]
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    pub fn this_class_name(&self) -> Option<&str> {
        get_class_name(&self.const_pool, self.this_class)
    }

    /// `None` for `java/lang/Object` and module-info, whose super index is 0.
    pub fn super_class_name(&self) -> Option<&str> {
        get_class_name(&self.const_pool, self.super_class)
    }

    pub fn method_name(&self, method: &MethodInfo) -> Option<&str> {
        get_utf8(&self.const_pool, method.name_index)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, BinRead)]
#[br(big)]
pub struct ClassAccessFlags(u16);

bitflags! {
    impl ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}
