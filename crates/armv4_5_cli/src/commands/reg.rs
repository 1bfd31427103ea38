use anyhow::bail;
use armv4_5_core::core_state::Arm;

use crate::image_backend::ImageBackend;

#[derive(clap::Args, Debug)]
pub struct RegCommand;

pub fn handle_reg(_cmd: RegCommand, arm: &mut Arm, backend: &mut ImageBackend) -> anyhow::Result<()> {
    let (status, banks) = armv4_5_core::commands::reg(arm, backend)?;
    if status != armv4_5_core::error::CommandStatus::Ok {
        bail!("error: target must be halted for register accesses");
    }

    for bank in banks {
        println!("{}", bank.banner);
        for row in bank.rows {
            println!("{row}");
        }
    }
    Ok(())
}
