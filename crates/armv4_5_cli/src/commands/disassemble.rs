use anyhow::bail;
use armv4_5_core::core_state::Arm;

use crate::capstone_decoder::CapstoneDecoder;
use crate::image_backend::ImageBackend;

#[derive(clap::Args, Debug)]
pub struct DisassembleCommand {
    /// Address to start disassembling at, decimal or `0x`-prefixed hex.
    address: String,
    /// Number of instructions to disassemble.
    #[clap(default_value = "1")]
    count: u32,
    /// Force Thumb decoding regardless of the cached core state.
    #[clap(long)]
    thumb: bool,
}

pub fn handle_disassemble(cmd: DisassembleCommand, arm: &Arm, backend: &mut ImageBackend) -> anyhow::Result<()> {
    let decoder = CapstoneDecoder::new()?;
    let address = crate::parse_address(&cmd.address)?;
    let (status, lines) = armv4_5_core::commands::disassemble(arm, backend, &decoder, address, cmd.count, cmd.thumb)?;

    for line in &lines {
        println!("{line}");
    }

    if status != armv4_5_core::error::CommandStatus::Ok {
        bail!("disassembly stopped early after {} instruction(s)", lines.len());
    }
    Ok(())
}
