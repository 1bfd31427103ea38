use clap::Subcommand;
use std::path::PathBuf;

#[derive(clap::Parser, Debug)]
#[clap(version, about)]
pub struct Args {
    /// Raw memory image backing the simulated target (no live JTAG transport
    /// in this tool -- see DESIGN.md).
    #[clap(long, short, global = true, env)]
    pub image: Option<PathBuf>,

    /// Address `--image` is loaded at.
    #[clap(long, default_value = "0", global = true)]
    pub image_base: String,

    #[clap(subcommand)]
    pub commands: SubCommands,
}

#[derive(Subcommand, Debug)]
pub enum SubCommands {
    /// Display ARM core registers across every mode bank.
    #[clap(alias = "r")]
    Reg(crate::commands::reg::RegCommand),
    /// Display or change the cached ARM/Thumb core state.
    #[clap(alias = "cs")]
    CoreState(crate::commands::core_state::CoreStateCommand),
    /// Disassemble instructions starting at an address.
    #[clap(alias = "d")]
    Disassemble(crate::commands::disassemble::DisassembleCommand),
}
