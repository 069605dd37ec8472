use std::time::Duration;

use hop_core::catalog::TargetDescriptor;
use hop_core::config::{Config, GatewayConfig};
use hop_core::credentials::SessionCredentials;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::command::GatewayCommand;
use crate::cue::{CueTable, MatchBuffer};
use crate::error::Result;
use crate::interrupt::Interrupt;
use crate::machine::{transition, Action, DriverState, Event, RejectReason, SessionOutcome};
use crate::pty::PtyLauncher;
use crate::transport::{Launcher, ReadEvent, Transport};

// ---------------------------------------------------------------------------
// SessionDriver
// ---------------------------------------------------------------------------

/// Drives one gateway login per [`connect`](SessionDriver::connect) call and
/// hands the resulting session to the operator.
pub struct SessionDriver<L: Launcher = PtyLauncher> {
    launcher: L,
    gateway: GatewayConfig,
    cues: CueTable,
    affirm: String,
    wait: Duration,
    interrupt: Interrupt,
}

impl SessionDriver<PtyLauncher> {
    pub fn from_config(config: &Config, interrupt: Interrupt) -> Self {
        Self::new(PtyLauncher, config, interrupt)
    }
}

impl<L: Launcher> SessionDriver<L> {
    pub fn new(launcher: L, config: &Config, interrupt: Interrupt) -> Self {
        Self {
            launcher,
            gateway: config.gateway.clone(),
            cues: CueTable::from_config(&config.cues),
            affirm: config.cues.affirm.clone(),
            wait: config.gateway.wait_timeout(),
            interrupt,
        }
    }

    /// Override the per-cycle wait from the config.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// The command line `connect` would run for `target`.
    pub fn command_for(
        &self,
        target: &TargetDescriptor,
        operator_user: &str,
        gateway_host: &str,
    ) -> GatewayCommand {
        GatewayCommand::new(&self.gateway, operator_user, gateway_host, target.id())
    }

    /// Spawn the gateway session for `target`, answer its challenges and hand
    /// it to the operator.
    ///
    /// `credentials` are consumed and dropped before this returns, whatever
    /// the outcome. The subordinate process is released exactly once on every
    /// path.
    pub async fn connect(
        &self,
        target: &TargetDescriptor,
        operator_user: &str,
        gateway_host: &str,
        credentials: SessionCredentials,
    ) -> SessionOutcome {
        let attempt = Uuid::new_v4();
        let span = info_span!(
            "connect",
            %attempt,
            target = target.id(),
            gateway = gateway_host
        );
        let command = self.command_for(target, operator_user, gateway_host);
        self.run(command, credentials).instrument(span).await
    }

    async fn run(&self, command: GatewayCommand, credentials: SessionCredentials) -> SessionOutcome {
        let mut interrupt = self.interrupt.clone();
        interrupt.clear();

        let mut state = DriverState::Init;
        let mut transport = match self.launcher.launch(&command) {
            Ok(transport) => {
                info!(%command, "subordinate spawned");
                state = transition(&state, Event::Spawned).next;
                transport
            }
            Err(e) => {
                warn!(%command, "spawn failed: {e}");
                return self.terminal_outcome(&state, Event::SpawnFailed(e.to_string()));
            }
        };

        let mut buffer = MatchBuffer::default();
        let mut deadline = Instant::now() + self.wait;

        loop {
            match &state {
                DriverState::Init | DriverState::AwaitPattern => {}
                DriverState::Interactive => break,
                DriverState::Terminated(outcome) => {
                    let outcome = outcome.clone();
                    transport.release();
                    return outcome;
                }
            }

            let event = if let Some(kind) = buffer.next_cue(&self.cues) {
                deadline = Instant::now() + self.wait;
                Event::Cue(kind)
            } else {
                let remaining = deadline.saturating_duration_since(Instant::now());
                tokio::select! {
                    biased;
                    _ = interrupt.triggered() => Event::Interrupted,
                    read = transport.read_chunk(remaining) => match read {
                        ReadEvent::Data(bytes) => {
                            buffer.push(&bytes, &self.cues);
                            continue;
                        }
                        ReadEvent::TimedOut => Event::WaitElapsed,
                        ReadEvent::Closed => Event::StreamClosed,
                    },
                }
            };

            debug!(?event, "driver event");
            state = self.apply(&state, event, &mut transport, &credentials);
        }

        // The PIN gate has been crossed: nothing below inspects or injects.
        drop(credentials);
        info!("challenge sequence complete, handing off");

        let event = match transport.hand_off(buffer.into_remaining()).await {
            Ok(end) => {
                info!(?end, "interactive session finished");
                Event::SessionEnded
            }
            Err(e) => {
                warn!("handoff to the terminal failed: {e}");
                Event::TransportFailed(e.to_string())
            }
        };
        transport.release();

        self.terminal_outcome(&state, event)
    }

    /// Run one transition and perform its action against `transport`.
    fn apply(
        &self,
        state: &DriverState,
        event: Event,
        transport: &mut L::Transport,
        credentials: &SessionCredentials,
    ) -> DriverState {
        let step = transition(state, event);
        let Some(action) = step.action else {
            return step.next;
        };

        match self.perform(action, transport, credentials) {
            Ok(()) => step.next,
            Err(e) => {
                warn!(?action, "failed to answer gateway prompt: {e}");
                transition(state, Event::TransportFailed(e.to_string())).next
            }
        }
    }

    fn perform(
        &self,
        action: Action,
        transport: &mut L::Transport,
        credentials: &SessionCredentials,
    ) -> Result<()> {
        // Never log the payloads, only which prompt was answered.
        match action {
            Action::Affirm => {
                info!("accepting gateway host key");
                transport.send_line(self.affirm.as_bytes())
            }
            Action::SendSecret => {
                info!("answering password prompt");
                transport.send_line(credentials.secret())
            }
            Action::SendOtp => {
                info!("answering PIN prompt");
                transport.send_line(credentials.otp().as_bytes())
            }
        }
    }

    fn terminal_outcome(&self, state: &DriverState, event: Event) -> SessionOutcome {
        match transition(state, event).next {
            DriverState::Terminated(outcome) => outcome,
            other => {
                warn!(?other, "unexpected non-terminal state");
                SessionOutcome::Rejected(RejectReason::StreamClosed)
            }
        }
    }
}
