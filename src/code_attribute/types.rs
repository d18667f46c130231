use std::io::Cursor;

use binrw::BinRead;

use crate::error::Result;

/// One decoded JVM instruction. Variants are listed in opcode order.
///
/// `address` is the byte offset of the opcode; the switch instructions need
/// it to skip their alignment padding.
#[derive(Clone, Debug, Eq, PartialEq, BinRead)]
#[br(big, import { address: u32 }, return_unexpected_error)]
pub enum Instruction {
    #[br(magic = 0x00u8)]
    Nop,
    #[br(magic = 0x01u8)]
    Aconstnull,
    #[br(magic = 0x02u8)]
    Iconstm1,
    #[br(magic = 0x03u8)]
    Iconst0,
    #[br(magic = 0x04u8)]
    Iconst1,
    #[br(magic = 0x05u8)]
    Iconst2,
    #[br(magic = 0x06u8)]
    Iconst3,
    #[br(magic = 0x07u8)]
    Iconst4,
    #[br(magic = 0x08u8)]
    Iconst5,
    #[br(magic = 0x09u8)]
    Lconst0,
    #[br(magic = 0x0au8)]
    Lconst1,
    #[br(magic = 0x0bu8)]
    Fconst0,
    #[br(magic = 0x0cu8)]
    Fconst1,
    #[br(magic = 0x0du8)]
    Fconst2,
    #[br(magic = 0x0eu8)]
    Dconst0,
    #[br(magic = 0x0fu8)]
    Dconst1,
    #[br(magic = 0x10u8)]
    Bipush(i8),
    #[br(magic = 0x11u8)]
    Sipush(i16),
    #[br(magic = 0x12u8)]
    Ldc(u8),
    #[br(magic = 0x13u8)]
    LdcW(u16),
    #[br(magic = 0x14u8)]
    Ldc2W(u16),
    #[br(magic = 0x15u8)]
    Iload(u8),
    #[br(magic = 0x16u8)]
    Lload(u8),
    #[br(magic = 0x17u8)]
    Fload(u8),
    #[br(magic = 0x18u8)]
    Dload(u8),
    #[br(magic = 0x19u8)]
    Aload(u8),
    #[br(magic = 0x1au8)]
    Iload0,
    #[br(magic = 0x1bu8)]
    Iload1,
    #[br(magic = 0x1cu8)]
    Iload2,
    #[br(magic = 0x1du8)]
    Iload3,
    #[br(magic = 0x1eu8)]
    Lload0,
    #[br(magic = 0x1fu8)]
    Lload1,
    #[br(magic = 0x20u8)]
    Lload2,
    #[br(magic = 0x21u8)]
    Lload3,
    #[br(magic = 0x22u8)]
    Fload0,
    #[br(magic = 0x23u8)]
    Fload1,
    #[br(magic = 0x24u8)]
    Fload2,
    #[br(magic = 0x25u8)]
    Fload3,
    #[br(magic = 0x26u8)]
    Dload0,
    #[br(magic = 0x27u8)]
    Dload1,
    #[br(magic = 0x28u8)]
    Dload2,
    #[br(magic = 0x29u8)]
    Dload3,
    #[br(magic = 0x2au8)]
    Aload0,
    #[br(magic = 0x2bu8)]
    Aload1,
    #[br(magic = 0x2cu8)]
    Aload2,
    #[br(magic = 0x2du8)]
    Aload3,
    #[br(magic = 0x2eu8)]
    Iaload,
    #[br(magic = 0x2fu8)]
    Laload,
    #[br(magic = 0x30u8)]
    Faload,
    #[br(magic = 0x31u8)]
    Daload,
    #[br(magic = 0x32u8)]
    Aaload,
    #[br(magic = 0x33u8)]
    Baload,
    #[br(magic = 0x34u8)]
    Caload,
    #[br(magic = 0x35u8)]
    Saload,
    #[br(magic = 0x36u8)]
    Istore(u8),
    #[br(magic = 0x37u8)]
    Lstore(u8),
    #[br(magic = 0x38u8)]
    Fstore(u8),
    #[br(magic = 0x39u8)]
    Dstore(u8),
    #[br(magic = 0x3au8)]
    Astore(u8),
    #[br(magic = 0x3bu8)]
    Istore0,
    #[br(magic = 0x3cu8)]
    Istore1,
    #[br(magic = 0x3du8)]
    Istore2,
    #[br(magic = 0x3eu8)]
    Istore3,
    #[br(magic = 0x3fu8)]
    Lstore0,
    #[br(magic = 0x40u8)]
    Lstore1,
    #[br(magic = 0x41u8)]
    Lstore2,
    #[br(magic = 0x42u8)]
    Lstore3,
    #[br(magic = 0x43u8)]
    Fstore0,
    #[br(magic = 0x44u8)]
    Fstore1,
    #[br(magic = 0x45u8)]
    Fstore2,
    #[br(magic = 0x46u8)]
    Fstore3,
    #[br(magic = 0x47u8)]
    Dstore0,
    #[br(magic = 0x48u8)]
    Dstore1,
    #[br(magic = 0x49u8)]
    Dstore2,
    #[br(magic = 0x4au8)]
    Dstore3,
    #[br(magic = 0x4bu8)]
    Astore0,
    #[br(magic = 0x4cu8)]
    Astore1,
    #[br(magic = 0x4du8)]
    Astore2,
    #[br(magic = 0x4eu8)]
    Astore3,
    #[br(magic = 0x4fu8)]
    Iastore,
    #[br(magic = 0x50u8)]
    Lastore,
    #[br(magic = 0x51u8)]
    Fastore,
    #[br(magic = 0x52u8)]
    Dastore,
    #[br(magic = 0x53u8)]
    Aastore,
    #[br(magic = 0x54u8)]
    Bastore,
    #[br(magic = 0x55u8)]
    Castore,
    #[br(magic = 0x56u8)]
    Sastore,
    #[br(magic = 0x57u8)]
    Pop,
    #[br(magic = 0x58u8)]
    Pop2,
    #[br(magic = 0x59u8)]
    Dup,
    #[br(magic = 0x5au8)]
    Dupx1,
    #[br(magic = 0x5bu8)]
    Dupx2,
    #[br(magic = 0x5cu8)]
    Dup2,
    #[br(magic = 0x5du8)]
    Dup2x1,
    #[br(magic = 0x5eu8)]
    Dup2x2,
    #[br(magic = 0x5fu8)]
    Swap,
    #[br(magic = 0x60u8)]
    Iadd,
    #[br(magic = 0x61u8)]
    Ladd,
    #[br(magic = 0x62u8)]
    Fadd,
    #[br(magic = 0x63u8)]
    Dadd,
    #[br(magic = 0x64u8)]
    Isub,
    #[br(magic = 0x65u8)]
    Lsub,
    #[br(magic = 0x66u8)]
    Fsub,
    #[br(magic = 0x67u8)]
    Dsub,
    #[br(magic = 0x68u8)]
    Imul,
    #[br(magic = 0x69u8)]
    Lmul,
    #[br(magic = 0x6au8)]
    Fmul,
    #[br(magic = 0x6bu8)]
    Dmul,
    #[br(magic = 0x6cu8)]
    Idiv,
    #[br(magic = 0x6du8)]
    Ldiv,
    #[br(magic = 0x6eu8)]
    Fdiv,
    #[br(magic = 0x6fu8)]
    Ddiv,
    #[br(magic = 0x70u8)]
    Irem,
    #[br(magic = 0x71u8)]
    Lrem,
    #[br(magic = 0x72u8)]
    Frem,
    #[br(magic = 0x73u8)]
    Drem,
    #[br(magic = 0x74u8)]
    Ineg,
    #[br(magic = 0x75u8)]
    Lneg,
    #[br(magic = 0x76u8)]
    Fneg,
    #[br(magic = 0x77u8)]
    Dneg,
    #[br(magic = 0x78u8)]
    Ishl,
    #[br(magic = 0x79u8)]
    Lshl,
    #[br(magic = 0x7au8)]
    Ishr,
    #[br(magic = 0x7bu8)]
    Lshr,
    #[br(magic = 0x7cu8)]
    Iushr,
    #[br(magic = 0x7du8)]
    Lushr,
    #[br(magic = 0x7eu8)]
    Iand,
    #[br(magic = 0x7fu8)]
    Land,
    #[br(magic = 0x80u8)]
    Ior,
    #[br(magic = 0x81u8)]
    Lor,
    #[br(magic = 0x82u8)]
    Ixor,
    #[br(magic = 0x83u8)]
    Lxor,
    #[br(magic = 0x84u8)]
    Iinc { index: u8, value: i8 },
    #[br(magic = 0x85u8)]
    I2l,
    #[br(magic = 0x86u8)]
    I2f,
    #[br(magic = 0x87u8)]
    I2d,
    #[br(magic = 0x88u8)]
    L2i,
    #[br(magic = 0x89u8)]
    L2f,
    #[br(magic = 0x8au8)]
    L2d,
    #[br(magic = 0x8bu8)]
    F2i,
    #[br(magic = 0x8cu8)]
    F2l,
    #[br(magic = 0x8du8)]
    F2d,
    #[br(magic = 0x8eu8)]
    D2i,
    #[br(magic = 0x8fu8)]
    D2l,
    #[br(magic = 0x90u8)]
    D2f,
    #[br(magic = 0x91u8)]
    I2b,
    #[br(magic = 0x92u8)]
    I2c,
    #[br(magic = 0x93u8)]
    I2s,
    #[br(magic = 0x94u8)]
    Lcmp,
    #[br(magic = 0x95u8)]
    Fcmpl,
    #[br(magic = 0x96u8)]
    Fcmpg,
    #[br(magic = 0x97u8)]
    Dcmpl,
    #[br(magic = 0x98u8)]
    Dcmpg,
    #[br(magic = 0x99u8)]
    Ifeq(i16),
    #[br(magic = 0x9au8)]
    Ifne(i16),
    #[br(magic = 0x9bu8)]
    Iflt(i16),
    #[br(magic = 0x9cu8)]
    Ifge(i16),
    #[br(magic = 0x9du8)]
    Ifgt(i16),
    #[br(magic = 0x9eu8)]
    Ifle(i16),
    #[br(magic = 0x9fu8)]
    IfIcmpeq(i16),
    #[br(magic = 0xa0u8)]
    IfIcmpne(i16),
    #[br(magic = 0xa1u8)]
    IfIcmplt(i16),
    #[br(magic = 0xa2u8)]
    IfIcmpge(i16),
    #[br(magic = 0xa3u8)]
    IfIcmpgt(i16),
    #[br(magic = 0xa4u8)]
    IfIcmple(i16),
    #[br(magic = 0xa5u8)]
    IfAcmpeq(i16),
    #[br(magic = 0xa6u8)]
    IfAcmpne(i16),
    #[br(magic = 0xa7u8)]
    Goto(i16),
    #[br(magic = 0xa8u8)]
    Jsr(i16),
    #[br(magic = 0xa9u8)]
    Ret(u8),
    #[br(magic = 0xaau8)]
    Tableswitch {
        #[br(pad_before = (4 - (address + 1) % 4) % 4)]
        default: i32,
        low: i32,
        high: i32,
        #[br(count = (high as i64 - low as i64 + 1).max(0) as usize)]
        offsets: Vec<i32>,
    },
    #[br(magic = 0xabu8)]
    Lookupswitch {
        #[br(pad_before = (4 - (address + 1) % 4) % 4)]
        default: i32,
        npairs: u32,
        #[br(count = npairs as usize)]
        pairs: Vec<(i32, i32)>,
    },
    #[br(magic = 0xacu8)]
    Ireturn,
    #[br(magic = 0xadu8)]
    Lreturn,
    #[br(magic = 0xaeu8)]
    Freturn,
    #[br(magic = 0xafu8)]
    Dreturn,
    #[br(magic = 0xb0u8)]
    Areturn,
    #[br(magic = 0xb1u8)]
    Return,
    #[br(magic = 0xb2u8)]
    Getstatic(u16),
    #[br(magic = 0xb3u8)]
    Putstatic(u16),
    #[br(magic = 0xb4u8)]
    Getfield(u16),
    #[br(magic = 0xb5u8)]
    Putfield(u16),
    #[br(magic = 0xb6u8)]
    Invokevirtual(u16),
    #[br(magic = 0xb7u8)]
    Invokespecial(u16),
    #[br(magic = 0xb8u8)]
    Invokestatic(u16),
    #[br(magic = 0xb9u8)]
    Invokeinterface { index: u16, count: u8, filler: u8 },
    #[br(magic = 0xbau8)]
    Invokedynamic { index: u16, filler: u16 },
    #[br(magic = 0xbbu8)]
    New(u16),
    #[br(magic = 0xbcu8)]
    Newarray(u8),
    #[br(magic = 0xbdu8)]
    Anewarray(u16),
    #[br(magic = 0xbeu8)]
    Arraylength,
    #[br(magic = 0xbfu8)]
    Athrow,
    #[br(magic = 0xc0u8)]
    Checkcast(u16),
    #[br(magic = 0xc1u8)]
    Instanceof(u16),
    #[br(magic = 0xc2u8)]
    Monitorenter,
    #[br(magic = 0xc3u8)]
    Monitorexit,
    #[br(magic = 0xc4u8)]
    Wide(WideInstruction),
    #[br(magic = 0xc5u8)]
    Multianewarray { index: u16, dimensions: u8 },
    #[br(magic = 0xc6u8)]
    Ifnull(i16),
    #[br(magic = 0xc7u8)]
    Ifnonnull(i16),
    #[br(magic = 0xc8u8)]
    GotoW(i32),
    #[br(magic = 0xc9u8)]
    JsrW(i32),
}

/// Instructions behind the `wide` (0xc4) prefix, with 16-bit slot indexes.
#[derive(Clone, Debug, Eq, PartialEq, BinRead)]
#[br(big, return_unexpected_error)]
pub enum WideInstruction {
    #[br(magic = 0x15u8)]
    Iload(u16),
    #[br(magic = 0x16u8)]
    Lload(u16),
    #[br(magic = 0x17u8)]
    Fload(u16),
    #[br(magic = 0x18u8)]
    Dload(u16),
    #[br(magic = 0x19u8)]
    Aload(u16),
    #[br(magic = 0x36u8)]
    Istore(u16),
    #[br(magic = 0x37u8)]
    Lstore(u16),
    #[br(magic = 0x38u8)]
    Fstore(u16),
    #[br(magic = 0x39u8)]
    Dstore(u16),
    #[br(magic = 0x3au8)]
    Astore(u16),
    #[br(magic = 0x84u8)]
    Iinc { index: u16, value: i16 },
    #[br(magic = 0xa9u8)]
    Ret(u16),
}

impl WideInstruction {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            WideInstruction::Iload(_) => "iload",
            WideInstruction::Lload(_) => "lload",
            WideInstruction::Fload(_) => "fload",
            WideInstruction::Dload(_) => "dload",
            WideInstruction::Aload(_) => "aload",
            WideInstruction::Istore(_) => "istore",
            WideInstruction::Lstore(_) => "lstore",
            WideInstruction::Fstore(_) => "fstore",
            WideInstruction::Dstore(_) => "dstore",
            WideInstruction::Astore(_) => "astore",
            WideInstruction::Iinc { .. } => "iinc",
            WideInstruction::Ret(_) => "ret",
        }
    }
}

/// Whether a local-variable instruction reads or writes its slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LocalAccess {
    Load,
    Store,
}

/// An instruction together with its byte offset in the code array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressedInstruction {
    pub address: u32,
    pub instruction: Instruction,
}

impl AddressedInstruction {
    /// Absolute target of a branch instruction.
    pub fn branch_target(&self) -> Option<u32> {
        let offset = self.instruction.branch_offset()?;
        u32::try_from(self.address as i64 + offset as i64).ok()
    }
}

impl Instruction {
    /// The JVM mnemonic, lower case. `wide` forms report the widened opcode.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Nop => "nop",
            Instruction::Aconstnull => "aconst_null",
            Instruction::Iconstm1 => "iconst_m1",
            Instruction::Iconst0 => "iconst_0",
            Instruction::Iconst1 => "iconst_1",
            Instruction::Iconst2 => "iconst_2",
            Instruction::Iconst3 => "iconst_3",
            Instruction::Iconst4 => "iconst_4",
            Instruction::Iconst5 => "iconst_5",
            Instruction::Lconst0 => "lconst_0",
            Instruction::Lconst1 => "lconst_1",
            Instruction::Fconst0 => "fconst_0",
            Instruction::Fconst1 => "fconst_1",
            Instruction::Fconst2 => "fconst_2",
            Instruction::Dconst0 => "dconst_0",
            Instruction::Dconst1 => "dconst_1",
            Instruction::Bipush(_) => "bipush",
            Instruction::Sipush(_) => "sipush",
            Instruction::Ldc(_) => "ldc",
            Instruction::LdcW(_) => "ldc_w",
            Instruction::Ldc2W(_) => "ldc2_w",
            Instruction::Iload(_) => "iload",
            Instruction::Lload(_) => "lload",
            Instruction::Fload(_) => "fload",
            Instruction::Dload(_) => "dload",
            Instruction::Aload(_) => "aload",
            Instruction::Iload0 => "iload_0",
            Instruction::Iload1 => "iload_1",
            Instruction::Iload2 => "iload_2",
            Instruction::Iload3 => "iload_3",
            Instruction::Lload0 => "lload_0",
            Instruction::Lload1 => "lload_1",
            Instruction::Lload2 => "lload_2",
            Instruction::Lload3 => "lload_3",
            Instruction::Fload0 => "fload_0",
            Instruction::Fload1 => "fload_1",
            Instruction::Fload2 => "fload_2",
            Instruction::Fload3 => "fload_3",
            Instruction::Dload0 => "dload_0",
            Instruction::Dload1 => "dload_1",
            Instruction::Dload2 => "dload_2",
            Instruction::Dload3 => "dload_3",
            Instruction::Aload0 => "aload_0",
            Instruction::Aload1 => "aload_1",
            Instruction::Aload2 => "aload_2",
            Instruction::Aload3 => "aload_3",
            Instruction::Iaload => "iaload",
            Instruction::Laload => "laload",
            Instruction::Faload => "faload",
            Instruction::Daload => "daload",
            Instruction::Aaload => "aaload",
            Instruction::Baload => "baload",
            Instruction::Caload => "caload",
            Instruction::Saload => "saload",
            Instruction::Istore(_) => "istore",
            Instruction::Lstore(_) => "lstore",
            Instruction::Fstore(_) => "fstore",
            Instruction::Dstore(_) => "dstore",
            Instruction::Astore(_) => "astore",
            Instruction::Istore0 => "istore_0",
            Instruction::Istore1 => "istore_1",
            Instruction::Istore2 => "istore_2",
            Instruction::Istore3 => "istore_3",
            Instruction::Lstore0 => "lstore_0",
            Instruction::Lstore1 => "lstore_1",
            Instruction::Lstore2 => "lstore_2",
            Instruction::Lstore3 => "lstore_3",
            Instruction::Fstore0 => "fstore_0",
            Instruction::Fstore1 => "fstore_1",
            Instruction::Fstore2 => "fstore_2",
            Instruction::Fstore3 => "fstore_3",
            Instruction::Dstore0 => "dstore_0",
            Instruction::Dstore1 => "dstore_1",
            Instruction::Dstore2 => "dstore_2",
            Instruction::Dstore3 => "dstore_3",
            Instruction::Astore0 => "astore_0",
            Instruction::Astore1 => "astore_1",
            Instruction::Astore2 => "astore_2",
            Instruction::Astore3 => "astore_3",
            Instruction::Iastore => "iastore",
            Instruction::Lastore => "lastore",
            Instruction::Fastore => "fastore",
            Instruction::Dastore => "dastore",
            Instruction::Aastore => "aastore",
            Instruction::Bastore => "bastore",
            Instruction::Castore => "castore",
            Instruction::Sastore => "sastore",
            Instruction::Pop => "pop",
            Instruction::Pop2 => "pop2",
            Instruction::Dup => "dup",
            Instruction::Dupx1 => "dup_x1",
            Instruction::Dupx2 => "dup_x2",
            Instruction::Dup2 => "dup2",
            Instruction::Dup2x1 => "dup2_x1",
            Instruction::Dup2x2 => "dup2_x2",
            Instruction::Swap => "swap",
            Instruction::Iadd => "iadd",
            Instruction::Ladd => "ladd",
            Instruction::Fadd => "fadd",
            Instruction::Dadd => "dadd",
            Instruction::Isub => "isub",
            Instruction::Lsub => "lsub",
            Instruction::Fsub => "fsub",
            Instruction::Dsub => "dsub",
            Instruction::Imul => "imul",
            Instruction::Lmul => "lmul",
            Instruction::Fmul => "fmul",
            Instruction::Dmul => "dmul",
            Instruction::Idiv => "idiv",
            Instruction::Ldiv => "ldiv",
            Instruction::Fdiv => "fdiv",
            Instruction::Ddiv => "ddiv",
            Instruction::Irem => "irem",
            Instruction::Lrem => "lrem",
            Instruction::Frem => "frem",
            Instruction::Drem => "drem",
            Instruction::Ineg => "ineg",
            Instruction::Lneg => "lneg",
            Instruction::Fneg => "fneg",
            Instruction::Dneg => "dneg",
            Instruction::Ishl => "ishl",
            Instruction::Lshl => "lshl",
            Instruction::Ishr => "ishr",
            Instruction::Lshr => "lshr",
            Instruction::Iushr => "iushr",
            Instruction::Lushr => "lushr",
            Instruction::Iand => "iand",
            Instruction::Land => "land",
            Instruction::Ior => "ior",
            Instruction::Lor => "lor",
            Instruction::Ixor => "ixor",
            Instruction::Lxor => "lxor",
            Instruction::Iinc { .. } => "iinc",
            Instruction::I2l => "i2l",
            Instruction::I2f => "i2f",
            Instruction::I2d => "i2d",
            Instruction::L2i => "l2i",
            Instruction::L2f => "l2f",
            Instruction::L2d => "l2d",
            Instruction::F2i => "f2i",
            Instruction::F2l => "f2l",
            Instruction::F2d => "f2d",
            Instruction::D2i => "d2i",
            Instruction::D2l => "d2l",
            Instruction::D2f => "d2f",
            Instruction::I2b => "i2b",
            Instruction::I2c => "i2c",
            Instruction::I2s => "i2s",
            Instruction::Lcmp => "lcmp",
            Instruction::Fcmpl => "fcmpl",
            Instruction::Fcmpg => "fcmpg",
            Instruction::Dcmpl => "dcmpl",
            Instruction::Dcmpg => "dcmpg",
            Instruction::Ifeq(_) => "ifeq",
            Instruction::Ifne(_) => "ifne",
            Instruction::Iflt(_) => "iflt",
            Instruction::Ifge(_) => "ifge",
            Instruction::Ifgt(_) => "ifgt",
            Instruction::Ifle(_) => "ifle",
            Instruction::IfIcmpeq(_) => "if_icmpeq",
            Instruction::IfIcmpne(_) => "if_icmpne",
            Instruction::IfIcmplt(_) => "if_icmplt",
            Instruction::IfIcmpge(_) => "if_icmpge",
            Instruction::IfIcmpgt(_) => "if_icmpgt",
            Instruction::IfIcmple(_) => "if_icmple",
            Instruction::IfAcmpeq(_) => "if_acmpeq",
            Instruction::IfAcmpne(_) => "if_acmpne",
            Instruction::Goto(_) => "goto",
            Instruction::Jsr(_) => "jsr",
            Instruction::Ret(_) => "ret",
            Instruction::Tableswitch { .. } => "tableswitch",
            Instruction::Lookupswitch { .. } => "lookupswitch",
            Instruction::Ireturn => "ireturn",
            Instruction::Lreturn => "lreturn",
            Instruction::Freturn => "freturn",
            Instruction::Dreturn => "dreturn",
            Instruction::Areturn => "areturn",
            Instruction::Return => "return",
            Instruction::Getstatic(_) => "getstatic",
            Instruction::Putstatic(_) => "putstatic",
            Instruction::Getfield(_) => "getfield",
            Instruction::Putfield(_) => "putfield",
            Instruction::Invokevirtual(_) => "invokevirtual",
            Instruction::Invokespecial(_) => "invokespecial",
            Instruction::Invokestatic(_) => "invokestatic",
            Instruction::Invokeinterface { .. } => "invokeinterface",
            Instruction::Invokedynamic { .. } => "invokedynamic",
            Instruction::New(_) => "new",
            Instruction::Newarray(_) => "newarray",
            Instruction::Anewarray(_) => "anewarray",
            Instruction::Arraylength => "arraylength",
            Instruction::Athrow => "athrow",
            Instruction::Checkcast(_) => "checkcast",
            Instruction::Instanceof(_) => "instanceof",
            Instruction::Monitorenter => "monitorenter",
            Instruction::Monitorexit => "monitorexit",
            Instruction::Multianewarray { .. } => "multianewarray",
            Instruction::Ifnull(_) => "ifnull",
            Instruction::Ifnonnull(_) => "ifnonnull",
            Instruction::GotoW(_) => "goto_w",
            Instruction::JsrW(_) => "jsr_w",
            Instruction::Wide(wide) => wide.mnemonic(),
        }
    }

    /// Returns the byte size of this instruction in the code array.
    /// `address` is the bytecode offset of this instruction (needed for switch alignment).
    pub fn byte_size(&self, address: u32) -> u32 {
        match self {
            Instruction::Bipush(_) | Instruction::Ldc(_) | Instruction::Newarray(_) => 2,
            Instruction::Iload(_)
            | Instruction::Lload(_)
            | Instruction::Fload(_)
            | Instruction::Dload(_)
            | Instruction::Aload(_)
            | Instruction::Istore(_)
            | Instruction::Lstore(_)
            | Instruction::Fstore(_)
            | Instruction::Dstore(_)
            | Instruction::Astore(_)
            | Instruction::Ret(_) => 2,
            Instruction::Sipush(_)
            | Instruction::LdcW(_)
            | Instruction::Ldc2W(_)
            | Instruction::Iinc { .. } => 3,
            Instruction::Ifeq(_)
            | Instruction::Ifne(_)
            | Instruction::Iflt(_)
            | Instruction::Ifge(_)
            | Instruction::Ifgt(_)
            | Instruction::Ifle(_)
            | Instruction::IfIcmpeq(_)
            | Instruction::IfIcmpne(_)
            | Instruction::IfIcmplt(_)
            | Instruction::IfIcmpge(_)
            | Instruction::IfIcmpgt(_)
            | Instruction::IfIcmple(_)
            | Instruction::IfAcmpeq(_)
            | Instruction::IfAcmpne(_)
            | Instruction::Ifnull(_)
            | Instruction::Ifnonnull(_)
            | Instruction::Goto(_)
            | Instruction::Jsr(_) => 3,
            Instruction::Tableswitch { low, high, .. } => {
                let padding = (4 - (address + 1) % 4) % 4;
                let count = (*high as i64 - *low as i64 + 1).max(0) as u32;
                // 1 (opcode) + padding + 4 (default) + 4 (low) + 4 (high) + 4*(high-low+1)
                1 + padding + 12 + 4 * count
            }
            Instruction::Lookupswitch { npairs, .. } => {
                let padding = (4 - (address + 1) % 4) % 4;
                // 1 (opcode) + padding + 4 (default) + 4 (npairs) + 8*npairs
                1 + padding + 8 + 8 * npairs
            }
            Instruction::Getstatic(_)
            | Instruction::Putstatic(_)
            | Instruction::Getfield(_)
            | Instruction::Putfield(_)
            | Instruction::Invokevirtual(_)
            | Instruction::Invokespecial(_)
            | Instruction::Invokestatic(_)
            | Instruction::New(_)
            | Instruction::Anewarray(_)
            | Instruction::Checkcast(_)
            | Instruction::Instanceof(_) => 3,
            Instruction::Multianewarray { .. } => 4,
            Instruction::Invokeinterface { .. }
            | Instruction::Invokedynamic { .. }
            | Instruction::GotoW(_)
            | Instruction::JsrW(_) => 5,
            // prefix + opcode + 2 byte index (+ 2 byte constant for iinc)
            Instruction::Wide(WideInstruction::Iinc { .. }) => 6,
            Instruction::Wide(_) => 4,
            _ => 1,
        }
    }

    /// Relative branch offset for `if*`, `goto`, `goto_w` and `jsr`.
    pub fn branch_offset(&self) -> Option<i32> {
        match self {
            Instruction::Ifeq(o)
            | Instruction::Ifne(o)
            | Instruction::Iflt(o)
            | Instruction::Ifge(o)
            | Instruction::Ifgt(o)
            | Instruction::Ifle(o)
            | Instruction::IfIcmpeq(o)
            | Instruction::IfIcmpne(o)
            | Instruction::IfIcmplt(o)
            | Instruction::IfIcmpge(o)
            | Instruction::IfIcmpgt(o)
            | Instruction::IfIcmple(o)
            | Instruction::IfAcmpeq(o)
            | Instruction::IfAcmpne(o)
            | Instruction::Ifnull(o)
            | Instruction::Ifnonnull(o)
            | Instruction::Goto(o)
            | Instruction::Jsr(o) => Some(*o as i32),
            Instruction::GotoW(o) | Instruction::JsrW(o) => Some(*o),
            _ => None,
        }
    }

    /// The slot touched by a local load or store, including the `_<n>` and `wide` forms.
    pub fn local_slot(&self) -> Option<(LocalAccess, u16)> {
        use LocalAccess::{Load, Store};
        Some(match self {
            Instruction::Iload(n)
            | Instruction::Lload(n)
            | Instruction::Fload(n)
            | Instruction::Dload(n)
            | Instruction::Aload(n) => (Load, *n as u16),
            Instruction::Iload0 | Instruction::Lload0 | Instruction::Fload0 | Instruction::Dload0 | Instruction::Aload0 => (Load, 0),
            Instruction::Iload1 | Instruction::Lload1 | Instruction::Fload1 | Instruction::Dload1 | Instruction::Aload1 => (Load, 1),
            Instruction::Iload2 | Instruction::Lload2 | Instruction::Fload2 | Instruction::Dload2 | Instruction::Aload2 => (Load, 2),
            Instruction::Iload3 | Instruction::Lload3 | Instruction::Fload3 | Instruction::Dload3 | Instruction::Aload3 => (Load, 3),
            Instruction::Istore(n)
            | Instruction::Lstore(n)
            | Instruction::Fstore(n)
            | Instruction::Dstore(n)
            | Instruction::Astore(n) => (Store, *n as u16),
            Instruction::Istore0 | Instruction::Lstore0 | Instruction::Fstore0 | Instruction::Dstore0 | Instruction::Astore0 => (Store, 0),
            Instruction::Istore1 | Instruction::Lstore1 | Instruction::Fstore1 | Instruction::Dstore1 | Instruction::Astore1 => (Store, 1),
            Instruction::Istore2 | Instruction::Lstore2 | Instruction::Fstore2 | Instruction::Dstore2 | Instruction::Astore2 => (Store, 2),
            Instruction::Istore3 | Instruction::Lstore3 | Instruction::Fstore3 | Instruction::Dstore3 | Instruction::Astore3 => (Store, 3),
            Instruction::Wide(
                WideInstruction::Iload(n)
                | WideInstruction::Lload(n)
                | WideInstruction::Fload(n)
                | WideInstruction::Dload(n)
                | WideInstruction::Aload(n),
            ) => (Load, *n),
            Instruction::Wide(
                WideInstruction::Istore(n)
                | WideInstruction::Lstore(n)
                | WideInstruction::Fstore(n)
                | WideInstruction::Dstore(n)
                | WideInstruction::Astore(n),
            ) => (Store, *n),
            _ => return None,
        })
    }
}

/// Decode a whole code array.
pub fn disassemble(code: &[u8]) -> Result<Vec<AddressedInstruction>> {
    let mut cursor = Cursor::new(code);
    let mut instructions = Vec::new();
    while (cursor.position() as usize) < code.len() {
        let address = cursor.position() as u32;
        let instruction = Instruction::read_args(&mut cursor, binrw::args! { address: address })?;
        instructions.push(AddressedInstruction {
            address,
            instruction,
        });
    }
    Ok(instructions)
}

/// Lay out instructions back to back starting at offset 0.
pub fn compute_addresses(code: Vec<Instruction>) -> Vec<AddressedInstruction> {
    let mut result = Vec::with_capacity(code.len());
    let mut address = 0u32;
    for instruction in code {
        let size = instruction.byte_size(address);
        result.push(AddressedInstruction {
            address,
            instruction,
        });
        address += size;
    }
    result
}
