use std::io::Cursor;

use binrw::{BinRead, BinResult};

use crate::constant_info::{get_utf8, ConstantInfo};

#[derive(Clone, Debug, BinRead)]
#[br(big)]
pub struct AttributeInfo {
    pub attribute_name_index: u16,
    pub attribute_length: u32,
    #[br(count = attribute_length as usize)]
    pub info: Vec<u8>,
}

impl AttributeInfo {
    pub fn name<'a>(&self, const_pool: &'a [ConstantInfo]) -> Option<&'a str> {
        get_utf8(const_pool, self.attribute_name_index)
    }

    /// Decode the body as a `Code` attribute.
    pub fn as_code(&self) -> BinResult<CodeAttribute> {
        CodeAttribute::read(&mut Cursor::new(&self.info))
    }

    /// Decode the body as a `BootstrapMethods` attribute.
    pub fn as_bootstrap_methods(&self) -> BinResult<BootstrapMethodsAttribute> {
        BootstrapMethodsAttribute::read(&mut Cursor::new(&self.info))
    }
}

/// Finds the first attribute called `name` in `attributes`.
pub fn find_attribute<'a>(
    attributes: &'a [AttributeInfo],
    const_pool: &[ConstantInfo],
    name: &str,
) -> Option<&'a AttributeInfo> {
    attributes
        .iter()
        .find(|attr| attr.name(const_pool) == Some(name))
}

#[derive(Clone, Debug, BinRead)]
#[br(big)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

#[derive(Clone, Debug, BinRead)]
#[br(big)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_length: u32,
    #[br(count = code_length as usize)]
    pub code: Vec<u8>,
    pub exception_table_length: u16,
    #[br(count = exception_table_length as usize)]
    pub exception_table: Vec<ExceptionEntry>,
    pub attributes_count: u16,
    #[br(count = attributes_count as usize)]
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, BinRead)]
#[br(big)]
pub struct BootstrapMethod {
    pub bootstrap_method_ref: u16,
    pub num_bootstrap_arguments: u16,
    #[br(count = num_bootstrap_arguments as usize)]
    pub bootstrap_arguments: Vec<u16>,
}

#[derive(Clone, Debug, BinRead)]
#[br(big)]
pub struct BootstrapMethodsAttribute {
    pub num_bootstrap_methods: u16,
    #[br(count = num_bootstrap_methods as usize)]
    pub bootstrap_methods: Vec<BootstrapMethod>,
}
