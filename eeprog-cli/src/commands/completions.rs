//! Shell completion generation.

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::env;
use std::io;
use std::path::Path;

use crate::Cli;

/// Generate shell completions to stdout.
pub(crate) fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

/// Detect the user's current shell from environment.
pub(crate) fn detect_shell_type() -> Option<Shell> {
    if let Ok(shell_path) = env::var("SHELL") {
        return shell_from_path(&shell_path);
    }

    // On Windows, PSModulePath implies PowerShell
    if cfg!(windows) && env::var("PSModulePath").is_ok() {
        return Some(Shell::PowerShell);
    }

    None
}

/// Map a shell binary path to its `Shell`.
fn shell_from_path(shell_path: &str) -> Option<Shell> {
    let shell_name = Path::new(shell_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    match shell_name {
        "bash" => Some(Shell::Bash),
        "zsh" => Some(Shell::Zsh),
        "fish" => Some(Shell::Fish),
        "elvish" => Some(Shell::Elvish),
        "pwsh" | "powershell" => Some(Shell::PowerShell),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_from_path_known() {
        assert_eq!(shell_from_path("/bin/bash"), Some(Shell::Bash));
        assert_eq!(shell_from_path("/usr/bin/zsh"), Some(Shell::Zsh));
        assert_eq!(shell_from_path("/usr/local/bin/fish"), Some(Shell::Fish));
        assert_eq!(shell_from_path("/usr/bin/elvish"), Some(Shell::Elvish));
        assert_eq!(shell_from_path("/usr/bin/pwsh"), Some(Shell::PowerShell));
        assert_eq!(shell_from_path("bash"), Some(Shell::Bash));
    }

    #[test]
    fn test_shell_from_path_unknown() {
        assert_eq!(shell_from_path("/usr/bin/tcsh"), None);
        assert_eq!(shell_from_path(""), None);
    }

    #[test]
    fn test_completions_generate_output() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
            let mut buf = Vec::new();
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "eeprog", &mut buf);
            let output = String::from_utf8(buf).unwrap();
            assert!(output.contains("eeprog"), "{shell}");
            assert!(output.contains("odometer"), "{shell}");
        }
    }
}
