//! The disassembler seam the `disassemble` command reaches through. Decoding
//! itself is out of scope here (§1 Non-goals) -- a real attachment backs this
//! with something like a capstone adapter.
use crate::error::ArmResult;
use crate::mode::InstructionSet;

/// One decoded instruction: its mnemonic/operand text and how many bytes of
/// the instruction stream it consumed, so the `disassemble` command's address
/// cursor can advance correctly for mixed 16/32-bit Thumb2 streams.
#[derive(Debug, Clone)]
pub struct DecodedInstruction {
    pub text: String,
    pub size_bytes: u32,
}

/// External collaborator: given an opcode word (or stream, for Thumb2) at an
/// address, produce its disassembly. Implementations decide how much of the
/// instruction set they support; unsupported opcodes are a decode error, not
/// a panic.
pub trait InstructionDecoder {
    fn decode_arm(&self, opcode: u32, address: u32) -> ArmResult<DecodedInstruction>;

    /// Thumb and Thumb2 share an entry point because a 16-bit Thumb halfword
    /// may be the first half of a 32-bit Thumb2 instruction; the decoder reads
    /// as many halfwords as it needs.
    fn decode_thumb(&self, first_halfword: u16, second_halfword: Option<u16>, address: u32) -> ArmResult<DecodedInstruction>;
}

/// What instruction stream a single `disassemble` step should read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    Arm,
    Thumb,
}

impl DecodeMode {
    pub fn from_state(state: InstructionSet) -> Self {
        match state {
            InstructionSet::Thumb | InstructionSet::ThumbEE => DecodeMode::Thumb,
            InstructionSet::Arm | InstructionSet::Jazelle => DecodeMode::Arm,
        }
    }
}
