use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::attribute_info::{find_attribute, BootstrapMethod};
use crate::code_attribute::{disassemble, AddressedInstruction};
use crate::constant_info::{get_class_name, get_utf8, ConstantInfo};
use crate::error::{Error, Result};
use crate::field_info::FieldAccessFlags;
use crate::jar_utils::JarFile;
use crate::method_info::MethodAccessFlags;
use crate::walk::descriptor::MethodDescriptor;
use crate::{ClassAccessFlags, ClassFile};

/// Anything the walker can load classes from, by internal name.
pub trait ClassSource {
    fn load(&self, name: &str) -> Result<Rc<LoadedClass>>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedField {
    pub name: String,
    pub descriptor: String,
    pub access: FieldAccessFlags,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedMethod {
    pub name: String,
    pub descriptor: MethodDescriptor,
    pub access: MethodAccessFlags,
    /// `None` for abstract and native methods.
    pub code: Option<Vec<AddressedInstruction>>,
}

impl LoadedMethod {
    pub fn is_static(&self) -> bool {
        self.access.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.access.contains(MethodAccessFlags::ABSTRACT)
    }

    pub fn instructions(&self) -> &[AddressedInstruction] {
        self.code.as_deref().unwrap_or(&[])
    }
}

/// A parsed class with names resolved and method bodies disassembled.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedClass {
    pub name: String,
    pub super_name: Option<String>,
    pub access: ClassAccessFlags,
    pub interfaces: Vec<String>,
    pub constants: Vec<ConstantInfo>,
    pub fields: Vec<LoadedField>,
    pub methods: Vec<LoadedMethod>,
    pub bootstrap_methods: Vec<BootstrapMethod>,
}

impl LoadedClass {
    pub fn from_class_file(class: ClassFile) -> Result<Self> {
        let pool = &class.const_pool;
        let utf8 = |index: u16| {
            get_utf8(pool, index)
                .map(str::to_string)
                .ok_or_else(|| Error::Resolution(format!("constant #{index} is not a Utf8 entry")))
        };

        let name = class
            .this_class_name()
            .ok_or_else(|| Error::Resolution("this_class is not a class constant".into()))?
            .to_string();
        let super_name = class.super_class_name().map(str::to_string);
        let interfaces = class
            .interfaces
            .iter()
            .map(|&index| {
                get_class_name(pool, index)
                    .map(str::to_string)
                    .ok_or_else(|| Error::Resolution(format!("{name}: bad interface #{index}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let fields = class
            .fields
            .iter()
            .map(|field| {
                Ok(LoadedField {
                    name: utf8(field.name_index)?,
                    descriptor: utf8(field.descriptor_index)?,
                    access: field.access_flags,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut methods = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            let code = match find_attribute(&method.attributes, pool, "Code") {
                Some(attr) => Some(disassemble(&attr.as_code()?.code)?),
                None => None,
            };
            methods.push(LoadedMethod {
                name: utf8(method.name_index)?,
                descriptor: MethodDescriptor::parse(&utf8(method.descriptor_index)?)?,
                access: method.access_flags,
                code,
            });
        }

        let bootstrap_methods = match find_attribute(&class.attributes, pool, "BootstrapMethods") {
            Some(attr) => attr.as_bootstrap_methods()?.bootstrap_methods,
            None => Vec::new(),
        };

        Ok(LoadedClass {
            name,
            super_name,
            access: class.access_flags,
            interfaces,
            constants: class.const_pool,
            fields,
            methods,
            bootstrap_methods,
        })
    }

    pub fn is_interface(&self) -> bool {
        self.access.contains(ClassAccessFlags::INTERFACE)
    }

    /// Exact lookup by name and full descriptor.
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&LoadedMethod> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor.raw == descriptor)
    }

    /// Lookup ignoring the return type; `args` includes the parentheses.
    pub fn find_method_by_args(&self, name: &str, args: &str) -> Option<&LoadedMethod> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor.args_descriptor() == args)
    }

    /// Methods with the given argument list and return descriptor, in class-file order.
    pub fn methods_with_signature<'a>(
        &'a self,
        args: &'a str,
        returns: &'a str,
    ) -> impl Iterator<Item = &'a LoadedMethod> + 'a {
        self.methods.iter().filter(move |m| {
            m.descriptor.args_descriptor() == args && m.descriptor.returns.to_descriptor() == returns
        })
    }

    /// Names of the constants of an enum class, in declaration order.
    pub fn enum_constants(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.access.contains(FieldAccessFlags::ENUM))
            .map(|f| f.name.as_str())
            .collect()
    }
}

/// Classes read lazily from a jar and kept once parsed.
#[derive(Debug)]
pub struct ClassPath {
    jar: JarFile,
    loaded: RefCell<HashMap<String, Rc<LoadedClass>>>,
}

impl ClassPath {
    pub fn new(jar: JarFile) -> Self {
        ClassPath {
            jar,
            loaded: RefCell::new(HashMap::new()),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(JarFile::open(path)?))
    }

    pub fn jar(&self) -> &JarFile {
        &self.jar
    }
}

impl ClassSource for ClassPath {
    fn load(&self, name: &str) -> Result<Rc<LoadedClass>> {
        if let Some(class) = self.loaded.borrow().get(name) {
            return Ok(Rc::clone(class));
        }
        let class = Rc::new(LoadedClass::from_class_file(self.jar.parse_class(name)?)?);
        self.loaded
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&class));
        Ok(class)
    }
}

/// Classes assembled in memory, usually with [`ClassBuilder`](super::ClassBuilder).
#[derive(Clone, Debug, Default)]
pub struct MemoryClasses {
    classes: HashMap<String, Rc<LoadedClass>>,
}

impl MemoryClasses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: LoadedClass) -> Rc<LoadedClass> {
        let class = Rc::new(class);
        self.classes.insert(class.name.clone(), Rc::clone(&class));
        class
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassSource for MemoryClasses {
    fn load(&self, name: &str) -> Result<Rc<LoadedClass>> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Resolution(format!("class {name} is not loaded")))
    }
}
