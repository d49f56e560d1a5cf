use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};
use std::io::Write;

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script generation.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `shell` to `out`.
///
/// # Errors
///
/// Returns an error if flushing `out` fails.
pub fn run_completions(shell: Shell, command: &mut clap::Command, out: &mut dyn Write) -> Result<()> {
    generate(shell, command, "spira", out);
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, Command};

    #[test]
    fn bash_script_names_the_binary_and_subcommands() {
        let mut command = Command::new("spira")
            .subcommand(Command::new("tree"))
            .subcommand(Command::new("show").arg(Arg::new("key")));
        let mut buf = Vec::new();
        run_completions(Shell::Bash, &mut command, &mut buf).expect("generate");
        let script = String::from_utf8(buf).expect("utf8");
        assert!(script.contains("_spira"));
        assert!(script.contains("tree"));
        assert!(script.contains("show"));
    }
}
