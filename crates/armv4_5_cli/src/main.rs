use anyhow::Context;
use armv4_5_core::core_state::{Arm, CoreConfig};
use clap::Parser;

use args::{Args, SubCommands};
use image_backend::ImageBackend;

mod args;
mod capstone_decoder;
mod commands;
mod image_backend;

fn main() -> anyhow::Result<()> {
    simplelog::TermLogger::init(
        log::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )
    .context("failed to initialize logger")?;

    let args = Args::parse();

    let image_base = parse_address(&args.image_base).context("invalid --image-base")?;
    let image = match &args.image {
        Some(path) => std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?,
        None => Vec::new(),
    };

    let mut backend = ImageBackend::new(image, image_base);
    let mut arm = Arm::new(CoreConfig::default());

    match args.commands {
        SubCommands::Reg(cmd) => commands::reg::handle_reg(cmd, &mut arm, &mut backend)?,
        SubCommands::CoreState(cmd) => commands::core_state::handle_core_state(cmd, &mut arm)?,
        SubCommands::Disassemble(cmd) => commands::disassemble::handle_disassemble(cmd, &arm, &mut backend)?,
    }

    Ok(())
}

pub fn parse_address(s: &str) -> anyhow::Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u32::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse()?)
    }
}
