//! The interactive loop: pick a target, collect credentials, connect, and
//! offer another round.

use std::io;

use hop_core::catalog::{Catalog, TargetDescriptor};
use hop_core::credentials::SessionCredentials;
use hop_session::transport::Launcher;
use hop_session::{SessionDriver, SessionOutcome};
use tracing::{debug, info};

use crate::console::Console;
use crate::credentials;
use crate::menu::{self, Selection};

const AFFIRMATIVE: &[&str] = &["y", "yes", "s", "si", "sí"];

/// How the loop ended. Every variant is a normal exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// `q` at the menu.
    Quit,
    /// Anything but yes at "connect to another server?".
    Declined,
    /// Ctrl+C while waiting on the operator.
    Interrupted,
    /// Standard input closed.
    InputClosed,
}

enum Step<'a> {
    Menu,
    Credentials(&'a TargetDescriptor),
    Connecting(&'a TargetDescriptor, SessionCredentials),
    AskAgain,
    Finished(Exit),
}

pub struct Orchestrator<'a, L: Launcher, C: Console> {
    catalog: &'a Catalog,
    driver: &'a SessionDriver<L>,
    console: C,
    operator_user: String,
    gateway_host: String,
}

impl<'a, L: Launcher, C: Console> Orchestrator<'a, L, C> {
    pub fn new(
        catalog: &'a Catalog,
        driver: &'a SessionDriver<L>,
        console: C,
        operator_user: impl Into<String>,
        gateway_host: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            driver,
            console,
            operator_user: operator_user.into(),
            gateway_host: gateway_host.into(),
        }
    }

    #[cfg(test)]
    pub fn console(&self) -> &C {
        &self.console
    }

    /// Run rounds until the operator is done. Only unexpected console
    /// failures are returned as errors.
    pub async fn run(&mut self) -> io::Result<Exit> {
        let catalog = self.catalog;
        let mut step = Step::Menu;

        loop {
            step = match step {
                Step::Menu => match menu::choose(catalog, &mut self.console).await {
                    Ok(Selection::Target(target)) => {
                        self.console.say(&format!("\nSelected: {target}"));
                        Step::Credentials(target)
                    }
                    Ok(Selection::Quit) => Step::Finished(Exit::Quit),
                    Err(e) => self.on_input_error(e)?,
                },

                Step::Credentials(target) => {
                    let collected = credentials::collect(
                        &mut self.console,
                        &self.operator_user,
                        &self.gateway_host,
                    )
                    .await;
                    match collected {
                        Ok(creds) => Step::Connecting(target, creds),
                        Err(e) => self.on_input_error(e)?,
                    }
                }

                Step::Connecting(target, creds) => {
                    let outcome = self.connect(target, creds).await;
                    if outcome == SessionOutcome::Cancelled {
                        Step::Menu
                    } else {
                        Step::AskAgain
                    }
                }

                Step::AskAgain => {
                    let answer = self
                        .console
                        .read_line("\nConnect to another server? (y/N): ")
                        .await;
                    match answer {
                        Ok(Some(answer)) if is_affirmative(&answer) => Step::Menu,
                        Ok(_) => Step::Finished(Exit::Declined),
                        Err(e) => self.on_input_error(e)?,
                    }
                }

                Step::Finished(exit) => {
                    info!(?exit, "done");
                    if exit == Exit::Interrupted {
                        self.console.say("\n\nInterrupted.");
                    }
                    return Ok(exit);
                }
            };
        }
    }

    async fn connect(
        &mut self,
        target: &TargetDescriptor,
        creds: SessionCredentials,
    ) -> SessionOutcome {
        let command = self
            .driver
            .command_for(target, &self.operator_user, &self.gateway_host);
        self.console.say(&format!(
            "\nConnecting to {} ({}) via gateway...",
            target.label(),
            target.address()
        ));
        self.console.say(&format!("Target ID: {}", target.id()));
        self.console.say(&format!("Command: {command}"));
        self.console.say("Press Ctrl+C to cancel\n");

        let outcome = self
            .driver
            .connect(target, &self.operator_user, &self.gateway_host, creds)
            .await;

        self.console.say(&format!("\nResult: {outcome}"));
        outcome
    }

    /// Map a console failure to the next step. Interrupts and closed input
    /// end the program normally.
    fn on_input_error(&self, e: io::Error) -> io::Result<Step<'a>> {
        match e.kind() {
            io::ErrorKind::Interrupted => Ok(Step::Finished(Exit::Interrupted)),
            io::ErrorKind::UnexpectedEof => Ok(Step::Finished(Exit::InputClosed)),
            _ => {
                debug!("console failure: {e}");
                Err(e)
            }
        }
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    AFFIRMATIVE.contains(&answer.as_str())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use hop_core::config::Config;
    use hop_session::command::GatewayCommand;
    use hop_session::error::Result;
    use hop_session::interrupt::{Interrupt, InterruptTrigger};
    use hop_session::transport::{HandoffEnd, ReadEvent, Transport};

    use super::*;
    use crate::console::testing::{Input, ScriptedConsole};

    #[derive(Debug, Clone, Copy)]
    enum Reply {
        Say(&'static [u8]),
        Silence,
        Hang,
    }

    #[derive(Debug, Clone, Default)]
    struct Trace(Arc<Mutex<Vec<String>>>);

    impl Trace {
        fn push(&self, entry: String) {
            self.0.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FakeGateway {
        replies: VecDeque<Reply>,
        trace: Trace,
    }

    #[async_trait]
    impl Transport for FakeGateway {
        async fn read_chunk(&mut self, _timeout: Duration) -> ReadEvent {
            match self.replies.pop_front() {
                Some(Reply::Say(bytes)) => ReadEvent::Data(bytes.to_vec()),
                Some(Reply::Silence) => ReadEvent::TimedOut,
                Some(Reply::Hang) => std::future::pending().await,
                None => ReadEvent::Closed,
            }
        }

        fn send_line(&mut self, line: &[u8]) -> Result<()> {
            self.trace
                .push(format!("send:{}", String::from_utf8_lossy(line)));
            Ok(())
        }

        async fn hand_off(&mut self, _pending: Vec<u8>) -> Result<HandoffEnd> {
            self.trace.push("handoff".into());
            Ok(HandoffEnd::SessionClosed)
        }

        fn release(&mut self) {
            self.trace.push("release".into());
        }
    }

    /// Each launch replays the next script in line.
    struct FakeLauncher {
        rounds: Mutex<VecDeque<Vec<Reply>>>,
        trace: Trace,
    }

    impl Launcher for FakeLauncher {
        type Transport = FakeGateway;

        fn launch(&self, command: &GatewayCommand) -> Result<FakeGateway> {
            self.trace.push(format!("launch:{command}"));
            let replies = self.rounds.lock().unwrap().pop_front().unwrap_or_default();
            Ok(FakeGateway {
                replies: replies.into(),
                trace: self.trace.clone(),
            })
        }
    }

    const FULL_LOGIN: &[Reply] = &[
        Reply::Say(b"Are you sure you want to continue connecting (yes/no)? "),
        Reply::Say(b"op@gw's password: "),
        Reply::Say(b"Pin code: "),
    ];

    fn catalog() -> Catalog {
        Catalog::from_targets(vec![
            TargetDescriptor::new("14021", "10.0.0.5", "db-primary").unwrap(),
        ])
        .unwrap()
    }

    fn driver(rounds: Vec<Vec<Reply>>) -> (SessionDriver<FakeLauncher>, Trace, InterruptTrigger) {
        let trace = Trace::default();
        let launcher = FakeLauncher {
            rounds: Mutex::new(rounds.into()),
            trace: trace.clone(),
        };
        let (trigger, interrupt) = Interrupt::manual();
        (
            SessionDriver::new(launcher, &Config::default(), interrupt),
            trace,
            trigger,
        )
    }

    #[test]
    fn affirmative_answers() {
        for yes in ["y", "Y", "yes", "YES", " s ", "si", "sí", "Sí"] {
            assert!(is_affirmative(yes), "{yes:?} should be affirmative");
        }
        for no in ["", "n", "no", "yep", "1"] {
            assert!(!is_affirmative(no), "{no:?} should not be affirmative");
        }
    }

    #[tokio::test]
    async fn one_round_then_decline() {
        let catalog = catalog();
        let (driver, trace, _trigger) = driver(vec![FULL_LOGIN.to_vec()]);
        let console = ScriptedConsole::lines(&["1", "pw", "123456", "n"]);
        let mut orchestrator = Orchestrator::new(&catalog, &driver, console, "op", "gw");

        let exit = orchestrator.run().await.unwrap();

        assert_eq!(exit, Exit::Declined);
        assert_eq!(
            trace.entries(),
            [
                "launch:ssh op@gw -p 22 -t launch 14021",
                "send:yes",
                "send:pw",
                "send:123456",
                "handoff",
                "release",
            ]
        );
        let shown = orchestrator.console().shown();
        assert!(shown.contains("Connecting to db-primary (10.0.0.5) via gateway..."));
        assert!(shown.contains("Result: session ended"));
    }

    #[tokio::test]
    async fn yes_returns_to_the_menu() {
        let catalog = catalog();
        let (driver, trace, _trigger) = driver(vec![vec![Reply::Silence], FULL_LOGIN.to_vec()]);
        let console = ScriptedConsole::lines(&["1", "pw", "1", "sí", "1", "pw", "2", "q"]);
        let mut orchestrator = Orchestrator::new(&catalog, &driver, console, "op", "gw");

        let exit = orchestrator.run().await.unwrap();

        // Round one times out, "sí" starts round two, "q" at the continue
        // prompt is not a yes.
        assert_eq!(exit, Exit::Declined);
        let console = orchestrator.console();
        assert_eq!(console.count("AVAILABLE SERVERS"), 2);
        assert!(console
            .shown()
            .contains("Result: timeout waiting for gateway response"));
        assert_eq!(
            trace
                .entries()
                .iter()
                .filter(|e| e.starts_with("launch:"))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn cancelled_session_goes_back_to_the_menu() {
        let catalog = catalog();
        let (driver, trace, trigger) = driver(vec![vec![Reply::Say(b"password: "), Reply::Hang]]);
        let console = ScriptedConsole::lines(&["1", "pw", "123456", "q"]);
        let mut orchestrator = Orchestrator::new(&catalog, &driver, console, "op", "gw");

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.fire();
        });

        let exit = orchestrator.run().await.unwrap();

        assert_eq!(exit, Exit::Quit);
        let console = orchestrator.console();
        assert!(console.shown().contains("Result: connection cancelled by user"));
        assert_eq!(console.count("AVAILABLE SERVERS"), 2);
        assert!(!console.shown().contains("Connect to another server?"));
        assert_eq!(trace.entries().last().map(String::as_str), Some("release"));
    }

    #[tokio::test]
    async fn quit_at_the_menu_connects_nothing() {
        let catalog = catalog();
        let (driver, trace, _trigger) = driver(vec![]);
        let mut orchestrator =
            Orchestrator::new(&catalog, &driver, ScriptedConsole::lines(&["q"]), "op", "gw");

        assert_eq!(orchestrator.run().await.unwrap(), Exit::Quit);
        assert!(trace.entries().is_empty());
    }

    #[tokio::test]
    async fn interrupt_at_credentials_ends_without_connecting() {
        let catalog = catalog();
        let (driver, trace, _trigger) = driver(vec![FULL_LOGIN.to_vec()]);
        let console = ScriptedConsole::new([Input::Line("1"), Input::Interrupt]);
        let mut orchestrator = Orchestrator::new(&catalog, &driver, console, "op", "gw");

        assert_eq!(orchestrator.run().await.unwrap(), Exit::Interrupted);
        assert!(trace.entries().is_empty());
        assert!(orchestrator.console().shown().contains("Interrupted."));
    }

    #[tokio::test]
    async fn closed_input_at_continue_prompt_ends_normally() {
        let catalog = catalog();
        let (driver, _trace, _trigger) = driver(vec![FULL_LOGIN.to_vec()]);
        let console = ScriptedConsole::new([
            Input::Line("1"),
            Input::Line("pw"),
            Input::Line("123456"),
            Input::Eof,
        ]);
        let mut orchestrator = Orchestrator::new(&catalog, &driver, console, "op", "gw");

        assert_eq!(orchestrator.run().await.unwrap(), Exit::Declined);
    }
}
