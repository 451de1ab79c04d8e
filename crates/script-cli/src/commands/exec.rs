use anyhow::Result;
use clap::Args;
use script_executor::ScriptCommand;
use std::path::PathBuf;

#[derive(Args)]
pub struct ExecArgs {
    /// Environment override, may be repeated
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    env: Vec<(String, String)>,

    /// Piece delimiter
    #[arg(short, long)]
    delimiter: Option<String>,

    /// Shell executable
    #[arg(long)]
    shell: Option<PathBuf>,

    /// Command string run through the shell
    command: String,

    /// Positional arguments for the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl ExecArgs {
    fn into_command(self) -> ScriptCommand {
        let mut command = ScriptCommand::new(self.command);
        command.args(self.args).envs(self.env);

        if let Some(delimiter) = self.delimiter {
            command.delimiter(unescape(&delimiter));
        }
        if let Some(shell) = self.shell {
            command.shell(shell);
        }

        command
    }
}

pub async fn run(args: ExecArgs) -> Result<i32> {
    super::supervise(args.into_command()).await
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Delimiters are usually typed on a shell, so allow `\n` and `\t`
fn unescape(delimiter: &str) -> String {
    delimiter.replace("\\n", "\n").replace("\\t", "\t")
}
