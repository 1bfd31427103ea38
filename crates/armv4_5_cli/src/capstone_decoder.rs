//! Capstone-backed [`InstructionDecoder`], the pairing `grba_log::format`
//! already uses for ARM/Thumb disassembly.
use armv4_5_core::decode::{DecodedInstruction, InstructionDecoder};
use armv4_5_core::error::{ArmError, ArmResult};
use capstone::prelude::*;

pub struct CapstoneDecoder {
    arm: Capstone,
    thumb: Capstone,
}

impl CapstoneDecoder {
    pub fn new() -> ArmResult<Self> {
        let arm = Capstone::new()
            .arm()
            .mode(arch::arm::ArchMode::Arm)
            .detail(true)
            .build()
            .map_err(|e| ArmError::internal(format!("capstone arm init failed: {e}")))?;
        let thumb = Capstone::new()
            .arm()
            .mode(arch::arm::ArchMode::Thumb)
            .detail(true)
            .build()
            .map_err(|e| ArmError::internal(format!("capstone thumb init failed: {e}")))?;
        Ok(CapstoneDecoder { arm, thumb })
    }
}

fn render(insns: &capstone::Instructions, address: u32) -> ArmResult<DecodedInstruction> {
    let insn = insns
        .get(0)
        .ok_or_else(|| ArmError::invalid_arguments(format!("undefined instruction at {address:#010x}")))?;

    let text = format!(
        "{:08x}\t{}\t{}",
        insn.address(),
        insn.mnemonic().unwrap_or("?"),
        insn.op_str().unwrap_or("")
    );
    Ok(DecodedInstruction {
        text,
        size_bytes: insn.bytes().len() as u32,
    })
}

impl InstructionDecoder for CapstoneDecoder {
    fn decode_arm(&self, opcode: u32, address: u32) -> ArmResult<DecodedInstruction> {
        let bytes = opcode.to_le_bytes();
        let insns = self
            .arm
            .disasm_count(&bytes, address as u64, 1)
            .map_err(|e| ArmError::invalid_arguments(format!("disassembly failed: {e}")))?;
        render(&insns, address)
    }

    fn decode_thumb(&self, first: u16, second: Option<u16>, address: u32) -> ArmResult<DecodedInstruction> {
        let mut bytes = Vec::with_capacity(4);
        bytes.extend_from_slice(&first.to_le_bytes());
        if let Some(second) = second {
            bytes.extend_from_slice(&second.to_le_bytes());
        }
        let insns = self
            .thumb
            .disasm_count(&bytes, address as u64, 1)
            .map_err(|e| ArmError::invalid_arguments(format!("disassembly failed: {e}")))?;
        render(&insns, address)
    }
}
