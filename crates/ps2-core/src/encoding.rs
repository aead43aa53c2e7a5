/// Top-level dispatch group selected by the primary opcode (bits 31..26).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OpcodeGroup {
    Special,
    RegImm,
    Cop0,
    Primary,
}

/// Primary opcode selecting the `SPECIAL` function table.
pub const OP_SPECIAL: u8 = 0x00;
/// Primary opcode selecting the `REGIMM` table.
pub const OP_REGIMM: u8 = 0x01;
/// Primary opcode selecting coprocessor 0.
pub const OP_COP0: u8 = 0x10;
/// COP0 `rs` value for `MFC0`.
pub const COP0_MF: u8 = 0x00;
/// COP0 `rs` value for `MTC0`.
pub const COP0_MT: u8 = 0x04;
/// COP0 `rs` value selecting the `CO` function table.
pub const COP0_CO: u8 = 0x10;

impl OpcodeGroup {
    /// Classifies a 6-bit primary opcode.
    #[must_use]
    pub const fn from_primary(op: u8) -> Self {
        match op {
            OP_SPECIAL => Self::Special,
            OP_REGIMM => Self::RegImm,
            OP_COP0 => Self::Cop0,
            _ => Self::Primary,
        }
    }
}

/// Every implemented R5900 integer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum OpcodeEncoding {
    // SPECIAL
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Jr,
    Jalr,
    Movz,
    Movn,
    Syscall,
    Break,
    Sync,
    Mfhi,
    Mthi,
    Mflo,
    Mtlo,
    Dsllv,
    Dsrlv,
    Dsrav,
    Mult,
    Multu,
    Div,
    Divu,
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    Dadd,
    Daddu,
    Dsub,
    Dsubu,
    Dsll,
    Dsrl,
    Dsra,
    Dsll32,
    Dsrl32,
    Dsra32,
    // REGIMM
    Bltz,
    Bgez,
    Bltzl,
    Bgezl,
    Bltzal,
    Bgezal,
    Bltzall,
    Bgezall,
    // Primary
    J,
    Jal,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    Beql,
    Bnel,
    Blezl,
    Bgtzl,
    Daddi,
    Daddiu,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Lwu,
    Sb,
    Sh,
    Sw,
    Cache,
    Pref,
    Ld,
    Sd,
    // COP0
    Mfc0,
    Mtc0,
    Tlbr,
    Tlbwi,
    Tlbwr,
    Tlbp,
    Eret,
    Ei,
    Di,
}

/// `SPECIAL` function field (bits 5..0) assignments.
pub const SPECIAL_TABLE: &[(u8, OpcodeEncoding)] = &[
    (0x00, OpcodeEncoding::Sll),
    (0x02, OpcodeEncoding::Srl),
    (0x03, OpcodeEncoding::Sra),
    (0x04, OpcodeEncoding::Sllv),
    (0x06, OpcodeEncoding::Srlv),
    (0x07, OpcodeEncoding::Srav),
    (0x08, OpcodeEncoding::Jr),
    (0x09, OpcodeEncoding::Jalr),
    (0x0A, OpcodeEncoding::Movz),
    (0x0B, OpcodeEncoding::Movn),
    (0x0C, OpcodeEncoding::Syscall),
    (0x0D, OpcodeEncoding::Break),
    (0x0F, OpcodeEncoding::Sync),
    (0x10, OpcodeEncoding::Mfhi),
    (0x11, OpcodeEncoding::Mthi),
    (0x12, OpcodeEncoding::Mflo),
    (0x13, OpcodeEncoding::Mtlo),
    (0x14, OpcodeEncoding::Dsllv),
    (0x16, OpcodeEncoding::Dsrlv),
    (0x17, OpcodeEncoding::Dsrav),
    (0x18, OpcodeEncoding::Mult),
    (0x19, OpcodeEncoding::Multu),
    (0x1A, OpcodeEncoding::Div),
    (0x1B, OpcodeEncoding::Divu),
    (0x20, OpcodeEncoding::Add),
    (0x21, OpcodeEncoding::Addu),
    (0x22, OpcodeEncoding::Sub),
    (0x23, OpcodeEncoding::Subu),
    (0x24, OpcodeEncoding::And),
    (0x25, OpcodeEncoding::Or),
    (0x26, OpcodeEncoding::Xor),
    (0x27, OpcodeEncoding::Nor),
    (0x2A, OpcodeEncoding::Slt),
    (0x2B, OpcodeEncoding::Sltu),
    (0x2C, OpcodeEncoding::Dadd),
    (0x2D, OpcodeEncoding::Daddu),
    (0x2E, OpcodeEncoding::Dsub),
    (0x2F, OpcodeEncoding::Dsubu),
    (0x38, OpcodeEncoding::Dsll),
    (0x3A, OpcodeEncoding::Dsrl),
    (0x3B, OpcodeEncoding::Dsra),
    (0x3C, OpcodeEncoding::Dsll32),
    (0x3E, OpcodeEncoding::Dsrl32),
    (0x3F, OpcodeEncoding::Dsra32),
];

/// `REGIMM` `rt` field (bits 20..16) assignments.
pub const REGIMM_TABLE: &[(u8, OpcodeEncoding)] = &[
    (0x00, OpcodeEncoding::Bltz),
    (0x01, OpcodeEncoding::Bgez),
    (0x02, OpcodeEncoding::Bltzl),
    (0x03, OpcodeEncoding::Bgezl),
    (0x10, OpcodeEncoding::Bltzal),
    (0x11, OpcodeEncoding::Bgezal),
    (0x12, OpcodeEncoding::Bltzall),
    (0x13, OpcodeEncoding::Bgezall),
];

/// Primary opcode (bits 31..26) assignments outside the dispatch groups.
pub const PRIMARY_TABLE: &[(u8, OpcodeEncoding)] = &[
    (0x02, OpcodeEncoding::J),
    (0x03, OpcodeEncoding::Jal),
    (0x04, OpcodeEncoding::Beq),
    (0x05, OpcodeEncoding::Bne),
    (0x06, OpcodeEncoding::Blez),
    (0x07, OpcodeEncoding::Bgtz),
    (0x08, OpcodeEncoding::Addi),
    (0x09, OpcodeEncoding::Addiu),
    (0x0A, OpcodeEncoding::Slti),
    (0x0B, OpcodeEncoding::Sltiu),
    (0x0C, OpcodeEncoding::Andi),
    (0x0D, OpcodeEncoding::Ori),
    (0x0E, OpcodeEncoding::Xori),
    (0x0F, OpcodeEncoding::Lui),
    (0x14, OpcodeEncoding::Beql),
    (0x15, OpcodeEncoding::Bnel),
    (0x16, OpcodeEncoding::Blezl),
    (0x17, OpcodeEncoding::Bgtzl),
    (0x18, OpcodeEncoding::Daddi),
    (0x19, OpcodeEncoding::Daddiu),
    (0x20, OpcodeEncoding::Lb),
    (0x21, OpcodeEncoding::Lh),
    (0x23, OpcodeEncoding::Lw),
    (0x24, OpcodeEncoding::Lbu),
    (0x25, OpcodeEncoding::Lhu),
    (0x27, OpcodeEncoding::Lwu),
    (0x28, OpcodeEncoding::Sb),
    (0x29, OpcodeEncoding::Sh),
    (0x2B, OpcodeEncoding::Sw),
    (0x2F, OpcodeEncoding::Cache),
    (0x33, OpcodeEncoding::Pref),
    (0x37, OpcodeEncoding::Ld),
    (0x3F, OpcodeEncoding::Sd),
];

/// COP0 `CO` function field assignments.
pub const COP0_CO_TABLE: &[(u8, OpcodeEncoding)] = &[
    (0x01, OpcodeEncoding::Tlbr),
    (0x02, OpcodeEncoding::Tlbwi),
    (0x06, OpcodeEncoding::Tlbwr),
    (0x08, OpcodeEncoding::Tlbp),
    (0x18, OpcodeEncoding::Eret),
    (0x38, OpcodeEncoding::Ei),
    (0x39, OpcodeEncoding::Di),
];

fn lookup(table: &[(u8, OpcodeEncoding)], key: u8) -> Option<OpcodeEncoding> {
    table
        .iter()
        .find_map(|(entry, encoding)| (*entry == key).then_some(*encoding))
}

/// Extracts the primary opcode field.
#[must_use]
pub const fn primary_opcode(word: u32) -> u8 {
    ((word >> 26) & 0x3F) as u8
}

/// Returns the implemented encoding for an instruction word.
///
/// `None` means the word is reserved or outside the implemented subset.
#[must_use]
pub fn classify_opcode(word: u32) -> Option<OpcodeEncoding> {
    let op = primary_opcode(word);
    match OpcodeGroup::from_primary(op) {
        OpcodeGroup::Special => lookup(SPECIAL_TABLE, (word & 0x3F) as u8),
        OpcodeGroup::RegImm => lookup(REGIMM_TABLE, ((word >> 16) & 0x1F) as u8),
        OpcodeGroup::Cop0 => match ((word >> 21) & 0x1F) as u8 {
            COP0_MF => Some(OpcodeEncoding::Mfc0),
            COP0_MT => Some(OpcodeEncoding::Mtc0),
            COP0_CO => lookup(COP0_CO_TABLE, (word & 0x3F) as u8),
            _ => None,
        },
        OpcodeGroup::Primary => lookup(PRIMARY_TABLE, op),
    }
}

impl OpcodeEncoding {
    /// Lower-case assembler mnemonic.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Sll => "sll",
            Self::Srl => "srl",
            Self::Sra => "sra",
            Self::Sllv => "sllv",
            Self::Srlv => "srlv",
            Self::Srav => "srav",
            Self::Jr => "jr",
            Self::Jalr => "jalr",
            Self::Movz => "movz",
            Self::Movn => "movn",
            Self::Syscall => "syscall",
            Self::Break => "break",
            Self::Sync => "sync",
            Self::Mfhi => "mfhi",
            Self::Mthi => "mthi",
            Self::Mflo => "mflo",
            Self::Mtlo => "mtlo",
            Self::Dsllv => "dsllv",
            Self::Dsrlv => "dsrlv",
            Self::Dsrav => "dsrav",
            Self::Mult => "mult",
            Self::Multu => "multu",
            Self::Div => "div",
            Self::Divu => "divu",
            Self::Add => "add",
            Self::Addu => "addu",
            Self::Sub => "sub",
            Self::Subu => "subu",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Nor => "nor",
            Self::Slt => "slt",
            Self::Sltu => "sltu",
            Self::Dadd => "dadd",
            Self::Daddu => "daddu",
            Self::Dsub => "dsub",
            Self::Dsubu => "dsubu",
            Self::Dsll => "dsll",
            Self::Dsrl => "dsrl",
            Self::Dsra => "dsra",
            Self::Dsll32 => "dsll32",
            Self::Dsrl32 => "dsrl32",
            Self::Dsra32 => "dsra32",
            Self::Bltz => "bltz",
            Self::Bgez => "bgez",
            Self::Bltzl => "bltzl",
            Self::Bgezl => "bgezl",
            Self::Bltzal => "bltzal",
            Self::Bgezal => "bgezal",
            Self::Bltzall => "bltzall",
            Self::Bgezall => "bgezall",
            Self::J => "j",
            Self::Jal => "jal",
            Self::Beq => "beq",
            Self::Bne => "bne",
            Self::Blez => "blez",
            Self::Bgtz => "bgtz",
            Self::Addi => "addi",
            Self::Addiu => "addiu",
            Self::Slti => "slti",
            Self::Sltiu => "sltiu",
            Self::Andi => "andi",
            Self::Ori => "ori",
            Self::Xori => "xori",
            Self::Lui => "lui",
            Self::Beql => "beql",
            Self::Bnel => "bnel",
            Self::Blezl => "blezl",
            Self::Bgtzl => "bgtzl",
            Self::Daddi => "daddi",
            Self::Daddiu => "daddiu",
            Self::Lb => "lb",
            Self::Lh => "lh",
            Self::Lw => "lw",
            Self::Lbu => "lbu",
            Self::Lhu => "lhu",
            Self::Lwu => "lwu",
            Self::Sb => "sb",
            Self::Sh => "sh",
            Self::Sw => "sw",
            Self::Cache => "cache",
            Self::Pref => "pref",
            Self::Ld => "ld",
            Self::Sd => "sd",
            Self::Mfc0 => "mfc0",
            Self::Mtc0 => "mtc0",
            Self::Tlbr => "tlbr",
            Self::Tlbwi => "tlbwi",
            Self::Tlbwr => "tlbwr",
            Self::Tlbp => "tlbp",
            Self::Eret => "eret",
            Self::Ei => "ei",
            Self::Di => "di",
        }
    }

    /// `true` for control transfers that own a delay slot.
    #[must_use]
    pub const fn has_delay_slot(self) -> bool {
        matches!(
            self,
            Self::Jr
                | Self::Jalr
                | Self::J
                | Self::Jal
                | Self::Beq
                | Self::Bne
                | Self::Blez
                | Self::Bgtz
                | Self::Beql
                | Self::Bnel
                | Self::Blezl
                | Self::Bgtzl
                | Self::Bltz
                | Self::Bgez
                | Self::Bltzl
                | Self::Bgezl
                | Self::Bltzal
                | Self::Bgezal
                | Self::Bltzall
                | Self::Bgezall
        )
    }

    /// `true` for branch-likely forms that nullify their delay slot when not taken.
    #[must_use]
    pub const fn is_likely(self) -> bool {
        matches!(
            self,
            Self::Beql
                | Self::Bnel
                | Self::Blezl
                | Self::Bgtzl
                | Self::Bltzl
                | Self::Bgezl
                | Self::Bltzall
                | Self::Bgezall
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{
        classify_opcode, primary_opcode, OpcodeEncoding, OpcodeGroup, COP0_CO_TABLE,
        PRIMARY_TABLE, REGIMM_TABLE, SPECIAL_TABLE,
    };

    #[test]
    fn tables_contain_unique_keys_and_encodings() {
        let mut encodings = HashSet::new();
        for table in [SPECIAL_TABLE, REGIMM_TABLE, PRIMARY_TABLE, COP0_CO_TABLE] {
            let keys: HashSet<_> = table.iter().map(|(key, _)| *key).collect();
            assert_eq!(keys.len(), table.len());
            for (_, encoding) in table {
                assert!(encodings.insert(*encoding), "{encoding:?} listed twice");
            }
        }
    }

    #[test]
    fn lookup_matches_known_encodings() {
        assert_eq!(classify_opcode(0x0000_0000), Some(OpcodeEncoding::Sll));
        assert_eq!(classify_opcode(0x03E0_0008), Some(OpcodeEncoding::Jr));
        assert_eq!(classify_opcode(0x3C08_BFC0), Some(OpcodeEncoding::Lui));
        assert_eq!(classify_opcode(0x0411_0003), Some(OpcodeEncoding::Bgezal));
        assert_eq!(classify_opcode(0x4008_7800), Some(OpcodeEncoding::Mfc0));
        assert_eq!(classify_opcode(0x4200_0018), Some(OpcodeEncoding::Eret));
        assert_eq!(classify_opcode(0x4200_0038), Some(OpcodeEncoding::Ei));
    }

    #[test]
    fn every_table_entry_resolves_via_lookup() {
        for (funct, encoding) in SPECIAL_TABLE {
            assert_eq!(classify_opcode(u32::from(*funct)), Some(*encoding));
        }
        for (rt, encoding) in REGIMM_TABLE {
            assert_eq!(
                classify_opcode((1 << 26) | (u32::from(*rt) << 16)),
                Some(*encoding)
            );
        }
        for (op, encoding) in PRIMARY_TABLE {
            assert_eq!(classify_opcode(u32::from(*op) << 26), Some(*encoding));
        }
        for (funct, encoding) in COP0_CO_TABLE {
            assert_eq!(
                classify_opcode((0x10 << 26) | (0x10 << 21) | u32::from(*funct)),
                Some(*encoding)
            );
        }
    }

    #[test]
    fn unimplemented_encodings_are_rejected() {
        // MMI, COP1, COP2, LQ, SQ, LWL, SWR.
        for op in [0x1C_u32, 0x11, 0x12, 0x1E, 0x1F, 0x22, 0x2E] {
            assert_eq!(classify_opcode(op << 26), None, "op {op:#x}");
        }
        assert_eq!(classify_opcode(0x0000_0001), None);
        assert_eq!(classify_opcode(0x0404_0000), None);
        assert_eq!(classify_opcode(0x4100_0000), None);
    }

    #[test]
    fn group_dispatch_uses_primary_field() {
        assert_eq!(primary_opcode(0xFC00_0000), 0x3F);
        assert_eq!(OpcodeGroup::from_primary(0x00), OpcodeGroup::Special);
        assert_eq!(OpcodeGroup::from_primary(0x01), OpcodeGroup::RegImm);
        assert_eq!(OpcodeGroup::from_primary(0x10), OpcodeGroup::Cop0);
        assert_eq!(OpcodeGroup::from_primary(0x23), OpcodeGroup::Primary);
    }

    #[test]
    fn likely_branches_are_a_subset_of_delay_slot_owners() {
        for (_, encoding) in REGIMM_TABLE.iter().chain(PRIMARY_TABLE) {
            if encoding.is_likely() {
                assert!(encoding.has_delay_slot());
            }
        }
        assert!(OpcodeEncoding::Jalr.has_delay_slot());
        assert!(!OpcodeEncoding::Eret.has_delay_slot());
    }
}
