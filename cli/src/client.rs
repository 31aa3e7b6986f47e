//! Redemption through an external command.

use autoshift_codes::Platform;
use autoshift_codes::RedemptionClient;
use autoshift_codes::Status;
use std::process::Command;
use std::process::Stdio;

/// Runs `<program> [args..] <code> <platform>` once per code and reads the
/// status word from the first token of its stdout.
#[derive(Debug, Clone)]
pub struct CommandClient {
    program: String,
    args: Vec<String>,
    platform: Platform,
}

impl CommandClient {
    pub fn new(command: &str, platform: Platform) -> anyhow::Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            anyhow::bail!("redeemer command is empty");
        };
        Ok(Self {
            program,
            args: parts.collect(),
            platform,
        })
    }
}

/// `success`, `trylater`, ... as the first word; anything else is `Unknown`
/// and no output at all is `None`.
pub fn parse_reply(stdout: &str) -> Status {
    match stdout.split_whitespace().next() {
        None => Status::None,
        Some(word) => word.parse().unwrap_or(Status::Unknown),
    }
}

impl RedemptionClient for CommandClient {
    fn attempt_redeem(&mut self, code: &str) -> Status {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(code)
            .arg(self.platform.as_str())
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output();
        let output = match output {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(program = %self.program, "could not run redeemer: {e}");
                return Status::Unknown;
            }
        };
        if !output.status.success() {
            tracing::debug!(program = %self.program, status = %output.status, "redeemer exited unsuccessfully");
        }
        parse_reply(&String::from_utf8_lossy(&output.stdout))
    }
}
