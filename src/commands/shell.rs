//! Shell integration scripts: unlock, env-load, and the run wrapper.
//!
//! Each template defines `devsync-unlock` (vault unlock + session export),
//! `devsync-load-env` (evaluate `devsync env export`, aborting on non-zero
//! exit) and `devsync-run` (unlock → load → run chain).
use crate::cli::{ShellInitOpts, ShellKind};

/// Print the integration script for the selected shell.
#[allow(clippy::print_stdout)]
pub fn run(opts: &ShellInitOpts) {
    let exe = std::env::current_exe()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "devsync".to_string());
    print!("{}", script_for(opts.shell, &exe));
}

/// The integration script for one shell.
#[must_use]
pub fn script_for(shell: ShellKind, exe_path: &str) -> String {
    match shell {
        ShellKind::Bash => bash_script(exe_path),
        ShellKind::Zsh => zsh_script(exe_path),
        ShellKind::Powershell => powershell_script(exe_path),
    }
}

fn bash_script(exe_path: &str) -> String {
    format!(
        r#"# devsync shell integration (bash)
DEVSYNC_PATH="{exe_path}"
if ! command -v devsync >/dev/null 2>&1; then
    alias devsync="$DEVSYNC_PATH"
fi

devsync-unlock() {{
    local token
    token="$(bw unlock --raw)"
    local status=$?
    if [ $status -ne 0 ]; then
        echo "vault のアンロックに失敗しました" >&2
        return $status
    fi
    export BW_SESSION="$token"
}}

devsync-load-env() {{
    local env_output
    env_output="$("$DEVSYNC_PATH" env export)"
    local status=$?
    if [ $status -ne 0 ]; then
        echo "環境変数の読み込みに失敗しました" >&2
        return $status
    fi
    eval "$env_output"
}}

devsync-run() {{
    devsync-unlock || return 1
    devsync-load-env || return 1
    "$DEVSYNC_PATH" run "$@"
}}
"#
    )
}

fn zsh_script(exe_path: &str) -> String {
    format!(
        r#"# devsync shell integration (zsh)
DEVSYNC_PATH="{exe_path}"
if ! command -v devsync >/dev/null 2>&1; then
    alias devsync="$DEVSYNC_PATH"
fi

devsync-unlock() {{
    local token
    token="$(bw unlock --raw)"
    local status=$?
    if [[ $status -ne 0 ]]; then
        echo "vault のアンロックに失敗しました" >&2
        return $status
    fi
    export BW_SESSION="$token"
}}

devsync-load-env() {{
    local env_output
    env_output="$("$DEVSYNC_PATH" env export)"
    local status=$?
    if [[ $status -ne 0 ]]; then
        echo "環境変数の読み込みに失敗しました" >&2
        return $status
    fi
    eval "$env_output"
}}

devsync-run() {{
    devsync-unlock || return 1
    devsync-load-env || return 1
    "$DEVSYNC_PATH" run "$@"
}}
"#
    )
}

fn powershell_script(exe_path: &str) -> String {
    format!(
        r#"# devsync shell integration (PowerShell)
$DEVSYNC_PATH = "{exe_path}"
if (-not (Get-Command devsync -ErrorAction SilentlyContinue)) {{
    Set-Alias devsync $DEVSYNC_PATH
}}

function devsync-unlock {{
    $token = & bw unlock --raw
    if ($LASTEXITCODE -ne 0) {{ return $LASTEXITCODE }}
    $env:BW_SESSION = $token
}}

function devsync-load-env {{
    $envExports = & $DEVSYNC_PATH env export
    if ($LASTEXITCODE -ne 0) {{ return $LASTEXITCODE }}
    try {{
        Invoke-Expression -Command $envExports -ErrorAction Stop
    }} catch {{
        Write-Error "環境変数の読み込み中にエラーが発生しました: $_"
        return 1
    }}
}}

function devsync-run {{
    devsync-unlock
    devsync-load-env
    & $DEVSYNC_PATH run @args
}}
"#
    )
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn assert_contains_all(script: &str, phrases: &[&str]) {
        for phrase in phrases {
            assert!(
                script.contains(phrase),
                "script is missing required phrase {phrase:?}"
            );
        }
    }

    #[test]
    fn bash_script_contains_unlock_load_and_run() {
        let script = script_for(ShellKind::Bash, "/tmp/devsync");
        assert_contains_all(
            &script,
            &[
                "command -v devsync",
                r#"token="$(bw unlock --raw)""#,
                r#"env_output="$("$DEVSYNC_PATH" env export)""#,
                "if [ $status -ne 0 ]; then",
                "devsync-unlock || return 1",
                "devsync-load-env || return 1",
                r#""$DEVSYNC_PATH" run "$@""#,
            ],
        );
    }

    #[test]
    fn zsh_script_contains_unlock_load_and_run() {
        let script = script_for(ShellKind::Zsh, "/tmp/devsync");
        assert_contains_all(
            &script,
            &[
                "command -v devsync",
                r#"token="$(bw unlock --raw)""#,
                r#"env_output="$("$DEVSYNC_PATH" env export)""#,
                "if [[ $status -ne 0 ]]; then",
                "devsync-unlock || return 1",
                "devsync-load-env || return 1",
                r#""$DEVSYNC_PATH" run "$@""#,
            ],
        );
    }

    #[test]
    fn powershell_script_contains_unlock_load_and_run() {
        let script = script_for(ShellKind::Powershell, "/tmp/devsync");
        assert_contains_all(
            &script,
            &[
                "Get-Command devsync",
                "$token = & bw unlock --raw",
                "$envExports = & $DEVSYNC_PATH env export",
                "if ($LASTEXITCODE -ne 0) { return $LASTEXITCODE }",
                "Invoke-Expression -Command $envExports -ErrorAction Stop",
                r#"Write-Error "環境変数の読み込み中にエラーが発生しました: $_""#,
                "devsync-unlock",
                "devsync-load-env",
                "& $DEVSYNC_PATH run @args",
            ],
        );
    }

    #[test]
    fn scripts_embed_the_executable_path() {
        for shell in [ShellKind::Bash, ShellKind::Zsh, ShellKind::Powershell] {
            let script = script_for(shell, "/opt/bin/devsync");
            assert!(script.contains("/opt/bin/devsync"));
        }
    }
}
