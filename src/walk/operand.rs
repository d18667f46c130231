//! Lazy views of instruction operands.

use crate::code_attribute::{AddressedInstruction, Instruction, WideInstruction};
use crate::constant_info::{format_constant, get_class_name, get_constant, resolve_ref, ConstantInfo};
use crate::error::{Error, Result};

use super::descriptor::{display_class_name, newarray_type, parse_type_descriptor, JvmType};

/// One operand of an instruction. Constant pool lookups happen only when a
/// property is asked for, and fail when the operand cannot supply it.
#[derive(Copy, Clone, Debug)]
pub struct InstructionField<'a> {
    value: i64,
    address: u32,
    mnemonic: &'static str,
    constants: &'a [ConstantInfo],
}

impl<'a> InstructionField<'a> {
    /// The operands of `instruction`, in encoding order. `_<n>` forms report
    /// their implicit slot or constant as an operand.
    pub fn operands(instruction: &AddressedInstruction, constants: &'a [ConstantInfo]) -> Result<Vec<Self>> {
        use Instruction::*;
        let mnemonic = instruction.instruction.mnemonic();
        let values: Vec<i64> = match &instruction.instruction {
            Lookupswitch { .. } => {
                return Err(Error::Unsupported {
                    mnemonic,
                    position: instruction.address,
                })
            }
            Iconstm1 => vec![-1],
            Iconst0 => vec![0],
            Iconst1 => vec![1],
            Iconst2 => vec![2],
            Iconst3 => vec![3],
            Iconst4 => vec![4],
            Iconst5 => vec![5],
            Bipush(v) => vec![*v as i64],
            Sipush(v) => vec![*v as i64],
            Ldc(i) => vec![*i as i64],
            LdcW(i) | Ldc2W(i) => vec![*i as i64],
            Iinc { index, value } => vec![*index as i64, *value as i64],
            Wide(WideInstruction::Iinc { index, value }) => vec![*index as i64, *value as i64],
            Tableswitch {
                default,
                low,
                high,
                offsets,
            } => {
                let mut values = vec![*default as i64, *low as i64, *high as i64];
                values.extend(offsets.iter().map(|&o| o as i64));
                values
            }
            Getstatic(i) | Putstatic(i) | Getfield(i) | Putfield(i) | Invokevirtual(i)
            | Invokespecial(i) | Invokestatic(i) | New(i) | Anewarray(i) | Checkcast(i)
            | Instanceof(i) => vec![*i as i64],
            Invokeinterface { index, count, .. } => vec![*index as i64, *count as i64],
            Invokedynamic { index, .. } => vec![*index as i64],
            Multianewarray { index, dimensions } => vec![*index as i64, *dimensions as i64],
            Newarray(atype) => vec![*atype as i64],
            other => {
                if let Some((_, slot)) = other.local_slot() {
                    vec![slot as i64]
                } else if let Some(offset) = other.branch_offset() {
                    vec![offset as i64]
                } else if let Wide(WideInstruction::Ret(slot)) = other {
                    vec![*slot as i64]
                } else if let Ret(slot) = other {
                    vec![*slot as i64]
                } else {
                    Vec::new()
                }
            }
        };
        Ok(values
            .into_iter()
            .map(|value| InstructionField {
                value,
                address: instruction.address,
                mnemonic,
                constants,
            })
            .collect())
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    fn index(&self) -> Result<u16> {
        u16::try_from(self.value).map_err(|_| self.missing("a constant pool index"))
    }

    fn missing(&self, what: &str) -> Error {
        Error::Resolution(format!(
            "operand {} of {} at {} is not {what}",
            self.value, self.mnemonic, self.address
        ))
    }

    /// Internal name of a class constant, or the owner of a member reference.
    pub fn class(&self) -> Result<&'a str> {
        let index = self.index()?;
        if let Some(name) = get_class_name(self.constants, index) {
            return Ok(name);
        }
        resolve_ref(self.constants, index)
            .map(|(class, _, _)| class)
            .ok_or_else(|| self.missing("a class or member reference"))
    }

    /// For loadable constants, the text `ldc` pushes; for member references,
    /// the member name.
    pub fn name(&self) -> Result<String> {
        let index = self.index()?;
        match get_constant(self.constants, index) {
            Some(
                ConstantInfo::FieldRef(_)
                | ConstantInfo::MethodRef(_)
                | ConstantInfo::InterfaceMethodRef(_),
            ) => resolve_ref(self.constants, index)
                .map(|(_, name, _)| name.to_string())
                .ok_or_else(|| self.missing("a resolvable reference")),
            _ => format_constant(self.constants, index).ok_or_else(|| self.missing("a named constant")),
        }
    }

    /// Class name as shown in expressions.
    pub fn classname(&self) -> Result<String> {
        Ok(display_class_name(self.class()?))
    }

    pub fn descriptor(&self) -> Result<&'a str> {
        resolve_ref(self.constants, self.index()?)
            .map(|(_, _, desc)| desc)
            .ok_or_else(|| self.missing("a member reference"))
    }

    /// Type of the field a field instruction touches.
    pub fn field_type(&self) -> Result<JvmType> {
        parse_type_descriptor(self.descriptor()?)
    }

    /// Absolute branch target.
    pub fn target(&self) -> Result<u32> {
        u32::try_from(self.address as i64 + self.value).map_err(|_| self.missing("a valid branch offset"))
    }

    /// Element type of `newarray`.
    pub fn atype(&self) -> Result<&'static str> {
        u8::try_from(self.value)
            .ok()
            .and_then(newarray_type)
            .ok_or_else(|| self.missing("an array type code"))
    }
}

impl std::fmt::Display for InstructionField<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}
