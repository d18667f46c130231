use crate::attribute_info::BootstrapMethod;
use crate::code_attribute::{compute_addresses, Instruction};
use crate::constant_info::*;
use crate::error::Result;
use crate::field_info::FieldAccessFlags;
use crate::method_info::MethodAccessFlags;
use crate::walk::descriptor::MethodDescriptor;
use crate::ClassAccessFlags;

use super::{LoadedClass, LoadedField, LoadedMethod};

/// A constant pool under construction. Equal entries are shared and every
/// method returns the 1-based index of the entry.
#[derive(Clone, Debug, Default)]
pub struct PoolBuilder {
    entries: Vec<ConstantInfo>,
}

impl PoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, entry: ConstantInfo) -> u16 {
        if let Some(found) = self.entries.iter().position(|e| *e == entry) {
            return found as u16 + 1;
        }
        let wide = matches!(entry, ConstantInfo::Long(_) | ConstantInfo::Double(_));
        self.entries.push(entry);
        let index = self.entries.len() as u16;
        if wide {
            self.entries.push(ConstantInfo::Unusable);
        }
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        self.push(ConstantInfo::Utf8(Utf8Constant {
            length: value.len() as u16,
            utf8_string: value.to_string(),
        }))
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        self.push(ConstantInfo::Integer(IntegerConstant { value }))
    }

    pub fn float(&mut self, value: f32) -> u16 {
        self.push(ConstantInfo::Float(FloatConstant { value }))
    }

    pub fn long(&mut self, value: i64) -> u16 {
        self.push(ConstantInfo::Long(LongConstant { value }))
    }

    pub fn double(&mut self, value: f64) -> u16 {
        self.push(ConstantInfo::Double(DoubleConstant { value }))
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.push(ConstantInfo::Class(ClassConstant { name_index }))
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let string_index = self.utf8(value);
        self.push(ConstantInfo::String(StringConstant { string_index }))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.push(ConstantInfo::NameAndType(NameAndTypeConstant {
            name_index,
            descriptor_index,
        }))
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.push(ConstantInfo::FieldRef(FieldRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.push(ConstantInfo::MethodRef(MethodRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    pub fn interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.push(ConstantInfo::InterfaceMethodRef(InterfaceMethodRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    /// `reference_index` must point at a field or method reference.
    pub fn method_handle(&mut self, reference_kind: u8, reference_index: u16) -> u16 {
        self.push(ConstantInfo::MethodHandle(MethodHandleConstant {
            reference_kind,
            reference_index,
        }))
    }

    pub fn method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor_index = self.utf8(descriptor);
        self.push(ConstantInfo::MethodType(MethodTypeConstant { descriptor_index }))
    }

    pub fn invoke_dynamic(&mut self, bootstrap_method_attr_index: u16, name: &str, descriptor: &str) -> u16 {
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.push(ConstantInfo::InvokeDynamic(InvokeDynamicConstant {
            bootstrap_method_attr_index,
            name_and_type_index,
        }))
    }

    pub fn into_entries(self) -> Vec<ConstantInfo> {
        self.entries
    }
}

/// Assembles a [`LoadedClass`] without going through class-file bytes.
///
/// Method bodies are given as instruction lists; their byte offsets are
/// computed the same way a compiler would lay them out.
#[derive(Clone, Debug)]
pub struct ClassBuilder {
    name: String,
    super_name: Option<String>,
    access: ClassAccessFlags,
    interfaces: Vec<String>,
    pool: PoolBuilder,
    fields: Vec<LoadedField>,
    methods: Vec<LoadedMethod>,
    bootstrap_methods: Vec<BootstrapMethod>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        let mut pool = PoolBuilder::new();
        pool.class(name);
        ClassBuilder {
            name: name.to_string(),
            super_name: Some("java/lang/Object".to_string()),
            access: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            interfaces: Vec::new(),
            pool,
            fields: Vec::new(),
            methods: Vec::new(),
            bootstrap_methods: Vec::new(),
        }
    }

    pub fn extends(mut self, super_name: &str) -> Self {
        self.super_name = Some(super_name.to_string());
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn access(mut self, access: ClassAccessFlags) -> Self {
        self.access = access;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&mut self) -> &mut PoolBuilder {
        &mut self.pool
    }

    pub fn field(&mut self, name: &str, descriptor: &str, access: FieldAccessFlags) -> &mut Self {
        self.fields.push(LoadedField {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access,
        });
        self
    }

    pub fn method(
        &mut self,
        name: &str,
        descriptor: &str,
        access: MethodAccessFlags,
        code: Vec<Instruction>,
    ) -> Result<&mut Self> {
        self.methods.push(LoadedMethod {
            name: name.to_string(),
            descriptor: MethodDescriptor::parse(descriptor)?,
            access,
            code: Some(compute_addresses(code)),
        });
        Ok(self)
    }

    pub fn abstract_method(&mut self, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.methods.push(LoadedMethod {
            name: name.to_string(),
            descriptor: MethodDescriptor::parse(descriptor)?,
            access: MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            code: None,
        });
        Ok(self)
    }

    /// Adds a `BootstrapMethods` entry and returns its index.
    pub fn bootstrap_method(&mut self, method_handle: u16, arguments: Vec<u16>) -> u16 {
        self.bootstrap_methods.push(BootstrapMethod {
            bootstrap_method_ref: method_handle,
            num_bootstrap_arguments: arguments.len() as u16,
            bootstrap_arguments: arguments,
        });
        self.bootstrap_methods.len() as u16 - 1
    }

    pub fn build(self) -> LoadedClass {
        LoadedClass {
            name: self.name,
            super_name: self.super_name,
            access: self.access,
            interfaces: self.interfaces,
            constants: self.pool.into_entries(),
            fields: self.fields,
            methods: self.methods,
            bootstrap_methods: self.bootstrap_methods,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_shares_entries() {
        let mut pool = PoolBuilder::new();
        let a = pool.method_ref("a/B", "c", "()V");
        let b = pool.method_ref("a/B", "c", "()V");
        assert_eq!(a, b);
        let class = pool.class("a/B");
        assert_eq!(get_class_name(&pool.entries, class), Some("a/B"));
        assert_eq!(resolve_ref(&pool.entries, a), Some(("a/B", "c", "()V")));
    }

    #[test]
    fn test_pool_long_reserves_slot() {
        let mut pool = PoolBuilder::new();
        let long = pool.long(1);
        let next = pool.utf8("x");
        assert_eq!(long, 1);
        assert_eq!(next, 3);
        assert_eq!(format_constant(&pool.entries, long).as_deref(), Some("1"));
    }

    #[test]
    fn test_builder_lays_out_code() {
        let mut builder = ClassBuilder::new("a/B");
        builder
            .method(
                "f",
                "(I)I",
                MethodAccessFlags::STATIC,
                vec![Instruction::Iload0, Instruction::Bipush(8), Instruction::Iadd, Instruction::Ireturn],
            )
            .unwrap();
        let class = builder.build();
        let method = class.find_method("f", "(I)I").unwrap();
        let addresses: Vec<u32> = method.instructions().iter().map(|i| i.address).collect();
        assert_eq!(addresses, vec![0, 1, 3, 4]);
        assert!(method.is_static());
        assert_eq!(class.super_name.as_deref(), Some("java/lang/Object"));
    }
}
