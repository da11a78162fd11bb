//! Command-line surface: argument parsing and sub-command wiring.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(
    name = "devsync",
    about = "Daily workstation synchronisation: repos, package managers, secrets",
    version
)]
pub struct Cli {
    /// Selected sub-command.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Flags shared by every sub-command.
    #[command(flatten)]
    pub global: GlobalOpts,
}

impl Cli {
    /// Short name of the selected sub-command, used as the log target.
    #[must_use]
    pub fn command_name(&self) -> &'static str {
        match &self.command {
            Command::Run => "run",
            Command::Repo { .. } => "repo",
            Command::Sys { .. } => "sys",
            Command::Env { .. } => "env",
            Command::ShellInit(_) => "shell-init",
            Command::Completion(_) => "completion",
            Command::Version => "version",
        }
    }
}

/// Flags accepted anywhere on the command line.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Override the repository root directory
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Number of concurrent jobs (overrides the configured value when > 0)
    #[arg(short = 'j', long, global = true, default_value_t = 0, allow_hyphen_values = true)]
    pub jobs: i64,
}

/// Sub-commands of the tool.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Daily refresh: unlock secrets, update packages, sync repositories
    Run,
    /// Repository management
    Repo {
        /// Repository operation to run.
        #[command(subcommand)]
        command: RepoCommand,
    },
    /// Package manager updates
    Sys {
        /// Package-manager operation to run.
        #[command(subcommand)]
        command: SysCommand,
    },
    /// Secret injection from the credential vault
    Env {
        /// Secret operation to run.
        #[command(subcommand)]
        command: EnvCommand,
    },
    /// Print the shell integration script
    ShellInit(ShellInitOpts),
    /// Generate shell completions
    Completion(CompletionOpts),
    /// Print version information
    Version,
}

/// Repository maintenance operations.
#[derive(Subcommand, Debug)]
pub enum RepoCommand {
    /// List managed repositories and their status
    List,
    /// Fetch and rebase-pull every repository under the root
    Update(RepoUpdateOpts),
    /// Delete local branches that are merged or squash-merged upstream
    Cleanup,
}

/// Flags for `repo update`.
#[derive(Parser, Debug, Clone, Default)]
pub struct RepoUpdateOpts {
    /// Force submodule update on, regardless of configuration
    #[arg(long, conflicts_with = "disable_submodule_update")]
    pub enable_submodule_update: bool,

    /// Force submodule update off, regardless of configuration
    #[arg(long)]
    pub disable_submodule_update: bool,

    /// Skip the GitHub clone bootstrap even when an owner is configured
    #[arg(long)]
    pub no_bootstrap: bool,
}

/// Package-manager operations.
#[derive(Subcommand, Debug)]
pub enum SysCommand {
    /// Query available updates without mutating anything
    Check,
    /// Run updates through every enabled package manager
    Update,
}

/// Secret-injection operations.
#[derive(Subcommand, Debug)]
pub enum EnvCommand {
    /// Print `export KEY='value'` lines for shell evaluation
    Export,
    /// Run a command with vault secrets injected into its environment
    Run(EnvRunOpts),
}

/// Arguments for `env run`.
#[derive(Parser, Debug, Clone)]
pub struct EnvRunOpts {
    /// Command and arguments to run
    #[arg(trailing_var_arg = true, required = true)]
    pub args: Vec<String>,
}

/// Arguments for `shell-init`.
#[derive(Parser, Debug, Clone)]
pub struct ShellInitOpts {
    /// Target shell
    #[arg(value_enum)]
    pub shell: ShellKind,
}

/// Shells with an integration script.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    /// Bourne-again shell.
    Bash,
    /// Z shell.
    Zsh,
    /// Windows PowerShell.
    Powershell,
}

/// Arguments for `completion`.
#[derive(Parser, Debug, Clone)]
pub struct CompletionOpts {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_run() {
        let cli = Cli::parse_from(["devsync", "run"]);
        assert!(matches!(cli.command, Command::Run));
    }

    #[test]
    fn parse_repo_list() {
        let cli = Cli::parse_from(["devsync", "repo", "list"]);
        assert!(matches!(
            cli.command,
            Command::Repo {
                command: RepoCommand::List
            }
        ));
    }

    #[test]
    fn parse_repo_update_dry_run() {
        let cli = Cli::parse_from(["devsync", "repo", "update", "--dry-run"]);
        assert!(cli.global.dry_run);
    }

    #[test]
    fn parse_dry_run_short() {
        let cli = Cli::parse_from(["devsync", "-d", "repo", "cleanup"]);
        assert!(cli.global.dry_run);
    }

    #[test]
    fn parse_jobs_override() {
        let cli = Cli::parse_from(["devsync", "--jobs", "3", "repo", "update"]);
        assert_eq!(cli.global.jobs, 3);
    }

    #[test]
    fn parse_root_override() {
        let cli = Cli::parse_from(["devsync", "--root", "/tmp/src", "repo", "list"]);
        assert_eq!(cli.global.root, Some(PathBuf::from("/tmp/src")));
    }

    #[test]
    fn parse_submodule_overrides_conflict() {
        let result = Cli::try_parse_from([
            "devsync",
            "repo",
            "update",
            "--enable-submodule-update",
            "--disable-submodule-update",
        ]);
        assert!(result.is_err(), "conflicting overrides must be rejected");
    }

    #[test]
    fn parse_sys_check() {
        let cli = Cli::parse_from(["devsync", "sys", "check"]);
        assert!(matches!(
            cli.command,
            Command::Sys {
                command: SysCommand::Check
            }
        ));
    }

    #[test]
    fn parse_env_run_trailing_args() {
        let cli = Cli::parse_from(["devsync", "env", "run", "terraform", "plan"]);
        if let Command::Env {
            command: EnvCommand::Run(opts),
        } = cli.command
        {
            assert_eq!(opts.args, vec!["terraform", "plan"]);
        } else {
            panic!("expected env run");
        }
    }

    #[test]
    fn parse_shell_init() {
        let cli = Cli::parse_from(["devsync", "shell-init", "zsh"]);
        if let Command::ShellInit(opts) = cli.command {
            assert_eq!(opts.shell, ShellKind::Zsh);
        } else {
            panic!("expected shell-init");
        }
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["devsync", "-v", "run"]);
        assert!(cli.verbose);
    }

    #[test]
    fn command_name_matches_subcommand() {
        let cli = Cli::parse_from(["devsync", "sys", "update"]);
        assert_eq!(cli.command_name(), "sys");
    }
}
