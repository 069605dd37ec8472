use std::io;

use hop_core::credentials::SessionCredentials;
use zeroize::Zeroizing;

use crate::console::Console;

/// Ask for the gateway password and the one-time PIN for this attempt.
///
/// The password is read without echo. The PIN is read visibly and trimmed.
/// Nothing collected here is printed or logged.
pub async fn collect<C>(
    console: &mut C,
    operator_user: &str,
    gateway_host: &str,
) -> io::Result<SessionCredentials>
where
    C: Console + ?Sized,
{
    let rule = "-".repeat(40);
    console.say(&format!("\n{rule}\nGATEWAY CREDENTIALS\n{rule}"));
    console.say(&format!("User: {operator_user}"));
    console.say(&format!("Gateway: {gateway_host}"));

    let secret = console.read_secret("Password: ").await?;
    let otp = console
        .read_line("PIN (OTP): ")
        .await?
        .map(Zeroizing::new)
        .ok_or(io::ErrorKind::UnexpectedEof)?;

    Ok(SessionCredentials::new(
        secret.as_bytes().to_vec(),
        otp.trim(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::testing::{Input, ScriptedConsole};

    #[tokio::test]
    async fn reads_secret_then_trimmed_otp() {
        let mut console = ScriptedConsole::lines(&["s3cret", "  123456 "]);

        let creds = collect(&mut console, "op", "gw.example.com").await.unwrap();

        assert_eq!(creds.secret(), b"s3cret");
        assert_eq!(creds.otp(), "123456");
        assert_eq!(console.secret_prompts, 1);
        assert!(console.shown().contains("User: op"));
        assert!(console.shown().contains("Gateway: gw.example.com"));
    }

    #[tokio::test]
    async fn answers_are_never_echoed() {
        let mut console = ScriptedConsole::lines(&["s3cret", "123456"]);
        collect(&mut console, "op", "gw").await.unwrap();

        let shown = console.shown();
        assert!(!shown.contains("s3cret"));
        assert!(!shown.contains("123456"));
    }

    #[tokio::test]
    async fn end_of_input_at_otp_is_an_error() {
        let mut console = ScriptedConsole::new([Input::Line("s3cret"), Input::Eof]);
        let err = collect(&mut console, "op", "gw").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn interrupt_at_password_propagates() {
        let mut console = ScriptedConsole::new([Input::Interrupt]);
        let err = collect(&mut console, "op", "gw").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }
}
