use core::str::FromStr;

/// Operation set of the DODA processing element ALU.
///
/// The numeric discriminant is the value placed in the opcode field of the
/// program memory word and fits in [`crate::params::OPCODE_WIDTH`] bits.
///
/// String parsing accepts both the canonical names and the operation
/// spellings of the source IR. The PE exposes a single comparison unit and a
/// single right-shift unit, so the signed/unsigned comparison forms and the
/// arithmetic/logical right shifts collapse to one opcode each. This loses
/// signedness information by design of the hardware target.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum Opcode {
    /// Unused processing element.
    NIL = 0x00,
    /// Integer addition.
    ADD = 0x01,
    /// Integer subtraction.
    SUB = 0x02,
    /// Integer multiplication.
    MUL = 0x03,
    /// Left shift.
    #[strum(to_string = "LS", serialize = "shl")]
    LS = 0x04,
    /// Right shift.
    #[strum(to_string = "RS", serialize = "lshr", serialize = "ashr")]
    RS = 0x05,
    /// Bitwise and.
    AND = 0x06,
    /// Bitwise or.
    OR = 0x07,
    /// Bitwise exclusive or.
    XOR = 0x08,
    /// Predicated two-way select.
    SELECT = 0x09,
    /// Equality comparison.
    #[strum(to_string = "CMP", serialize = "icmp_eq")]
    CMP = 0x0a,
    /// Inequality comparison.
    #[strum(to_string = "CNE", serialize = "icmp_ne")]
    CNE = 0x0b,
    /// Less-than comparison.
    #[strum(to_string = "CLT", serialize = "icmp_slt", serialize = "icmp_ult")]
    CLT = 0x0c,
    /// Less-than-or-equal comparison.
    #[strum(to_string = "CLTE", serialize = "icmp_sle", serialize = "icmp_ule")]
    CLTE = 0x0d,
    /// Greater-than comparison.
    #[strum(to_string = "CGT", serialize = "icmp_sgt", serialize = "icmp_ugt")]
    CGT = 0x0e,
    /// Greater-than-or-equal comparison.
    #[strum(to_string = "CGTE", serialize = "icmp_sge", serialize = "icmp_uge")]
    CGTE = 0x0f,
    /// Scratchpad load indexed by operand i1.
    LOAD = 0x10,
    /// Scratchpad store of operand i2 at index i1.
    STORE = 0x11,
    /// Loop terminator.
    JUMP = 0x12,
    /// Operation string not in the table.
    UNSUPPORTED = 0x13,
}

impl Opcode {
    /// Resolves a source operation string.
    ///
    /// Total: unknown strings yield [`Opcode::UNSUPPORTED`]. Matching is
    /// ASCII-case-insensitive, so the upper-case tokens of the textual dump
    /// resolve too.
    pub fn parse(op: &str) -> Self {
        Self::from_str(op).unwrap_or(Self::UNSUPPORTED)
    }
}

impl From<u8> for Opcode {
    /// Decodes the opcode field of a program memory word.
    fn from(b: u8) -> Self {
        use Opcode::*;
        match b {
            0x00 => NIL,
            0x01 => ADD,
            0x02 => SUB,
            0x03 => MUL,
            0x04 => LS,
            0x05 => RS,
            0x06 => AND,
            0x07 => OR,
            0x08 => XOR,
            0x09 => SELECT,
            0x0a => CMP,
            0x0b => CNE,
            0x0c => CLT,
            0x0d => CLTE,
            0x0e => CGT,
            0x0f => CGTE,
            0x10 => LOAD,
            0x11 => STORE,
            0x12 => JUMP,
            _ => UNSUPPORTED,
        }
    }
}
