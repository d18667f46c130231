//! Symbolic walking of JVM bytecode, for recovering what compiled classes
//! write and register without running them.
//!
//! Class files are read with [`ClassFile`], loaded through a [`ClassSource`]
//! and walked by [`walk::interpret`]. A [`DispatchHook`] decides what calls,
//! allocations and field accesses mean; the [`toppings`] are hooks for
//! specific kinds of data.

use std::io::{Read, Seek};

use binrw::BinRead;

#[macro_use]
extern crate bitflags;

pub mod attribute_info;
pub mod constant_info;
pub mod field_info;
pub mod method_info;

pub mod code_attribute;

pub mod classpath;
pub mod error;
pub mod jar_utils;
pub mod options;
pub mod toppings;
pub mod types;
pub mod walk;

pub use classpath::{ClassBuilder, ClassPath, ClassSource, LoadedClass, LoadedMethod, MemoryClasses};
pub use error::{Error, Halt, Result, Walk};
pub use options::ExtractOptions;
pub use toppings::{ClassRoles, Extraction};
pub use types::*;
pub use walk::{interpret, DispatchHook, MethodWalk, Operation, WalkContext};

/// Parse a class file from any seekable reader.
///
/// ```rust
/// let mut reader = std::io::Cursor::new(b"this_will_be_parsed_as_classfile");
/// assert!(classfile_walker::parse_class_from_reader(&mut reader).is_err());
/// ```
pub fn parse_class_from_reader<T: Read + Seek>(reader: &mut T) -> Result<ClassFile> {
    Ok(ClassFile::read(reader)?)
}

/// Parse a class file held in memory.
pub fn parse_class_bytes(bytes: &[u8]) -> Result<ClassFile> {
    parse_class_from_reader(&mut std::io::Cursor::new(bytes))
}
