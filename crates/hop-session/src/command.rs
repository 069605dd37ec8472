use std::fmt;

use hop_core::config::GatewayConfig;

/// The remote-shell invocation that reaches the gateway and asks it to
/// launch a session to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCommand {
    program: String,
    args: Vec<String>,
}

impl GatewayCommand {
    /// `ssh <user>@<gateway> -p <port> -t <launch> <target id>`
    pub fn new(
        gateway: &GatewayConfig,
        operator_user: &str,
        gateway_host: &str,
        target_id: &str,
    ) -> Self {
        let mut args = vec![
            format!("{operator_user}@{gateway_host}"),
            "-p".to_string(),
            gateway.port.to_string(),
        ];
        if gateway.request_tty {
            args.push("-t".to_string());
        }
        args.push(gateway.launch_command.clone());
        args.push(target_id.to_string());

        Self {
            program: gateway.ssh_program.clone(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for GatewayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
