use armv4_5_core::core_state::Arm;
use armv4_5_core::mode::InstructionSet;

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum StateArg {
    Arm,
    Thumb,
}

#[derive(clap::Args, Debug)]
pub struct CoreStateCommand {
    /// New core state to switch to; omit to just display the current one.
    state: Option<StateArg>,
}

pub fn handle_core_state(cmd: CoreStateCommand, arm: &mut Arm) -> anyhow::Result<()> {
    let requested = cmd.state.map(|s| match s {
        StateArg::Arm => InstructionSet::Arm,
        StateArg::Thumb => InstructionSet::Thumb,
    });

    println!("{}", armv4_5_core::commands::core_state(arm, requested));
    Ok(())
}
