use crate::config::CaptureConfig;
use crate::frame::SourceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Connection lifecycle of one camera source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
    Backoff,
    Terminated,
}

impl ConnectionState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, ConnectionState::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Terminated)
    }

    pub(crate) fn as_u8(&self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Streaming => 2,
            ConnectionState::Backoff => 3,
            ConnectionState::Terminated => 4,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Streaming,
            3 => ConnectionState::Backoff,
            4 => ConnectionState::Terminated,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Backoff => "backoff",
            ConnectionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Fixed-delay retry policy.
///
/// Attempts are spaced by `reconnect_delay`; once `max_reconnect_attempts`
/// consecutive failures accumulate the source waits `extended_retry_delay`
/// before starting over. Delays do not grow between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub extended_retry_delay: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            max_reconnect_attempts: config.max_reconnect_attempts,
            reconnect_delay: config.reconnect_delay(),
            extended_retry_delay: config.extended_retry_delay(),
        }
    }
}

/// Inputs driving the connection machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineInput {
    /// Start opening the stream
    Connect,
    Opened,
    OpenFailed,
    FrameRead,
    ReadFailed,
    /// Attempt budget exhausted while disconnected
    BudgetExhausted,
    BackoffElapsed,
    Shutdown,
}

/// A completed state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub reconnect_attempts: u32,
}

/// What the worker should do next, given the machine's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Open,
    Read,
    EnterBackoff,
    Wait(Duration),
    Stop,
}

/// Per-source connection state machine.
///
/// Pure bookkeeping: it performs no I/O and never sleeps. The owning worker
/// feeds it [`MachineInput`]s and acts on [`NextStep`].
#[derive(Debug)]
pub struct ConnectionMachine {
    source_id: SourceId,
    state: ConnectionState,
    reconnect_attempts: u32,
    policy: ReconnectPolicy,
}

impl ConnectionMachine {
    pub fn new(source_id: SourceId, policy: ReconnectPolicy) -> Self {
        Self {
            source_id,
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn budget_exhausted(&self) -> bool {
        self.reconnect_attempts >= self.policy.max_reconnect_attempts
    }

    /// Next action for the worker
    pub fn next_step(&self) -> NextStep {
        match self.state {
            ConnectionState::Disconnected if self.budget_exhausted() => NextStep::EnterBackoff,
            ConnectionState::Disconnected => NextStep::Open,
            ConnectionState::Connecting => NextStep::Open,
            ConnectionState::Streaming => NextStep::Read,
            ConnectionState::Backoff => NextStep::Wait(self.policy.extended_retry_delay),
            ConnectionState::Terminated => NextStep::Stop,
        }
    }

    /// Apply an input. Returns the resulting transition, or `None` when the
    /// input leaves the state unchanged or does not apply to it.
    pub fn apply(&mut self, input: MachineInput) -> Option<Transition> {
        use ConnectionState::*;

        let to = match (self.state, input) {
            (Terminated, _) => return None,
            (_, MachineInput::Shutdown) => Terminated,

            (Disconnected, MachineInput::Connect) if !self.budget_exhausted() => Connecting,
            (Disconnected, MachineInput::BudgetExhausted) if self.budget_exhausted() => Backoff,

            (Connecting, MachineInput::Opened) => Streaming,
            (Connecting, MachineInput::OpenFailed) => {
                self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
                Disconnected
            }

            (Streaming, MachineInput::FrameRead) => {
                // Successful read: budget refills, state stays Streaming
                self.reconnect_attempts = 0;
                return None;
            }
            // A dropped stream does not spend the open-retry budget
            (Streaming, MachineInput::ReadFailed) => Disconnected,

            (Backoff, MachineInput::BackoffElapsed) => {
                self.reconnect_attempts = 0;
                Disconnected
            }

            (state, input) => {
                debug!(
                    "Source {} ignored {:?} while {}",
                    self.source_id, input, state
                );
                return None;
            }
        };

        let transition = Transition {
            from: self.state,
            to,
            reconnect_attempts: self.reconnect_attempts,
        };
        self.state = to;
        Some(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_reconnect_attempts: max,
            reconnect_delay: Duration::from_millis(10),
            extended_retry_delay: Duration::from_millis(50),
        }
    }

    fn fail_open(machine: &mut ConnectionMachine) -> Transition {
        machine.apply(MachineInput::Connect).unwrap();
        machine.apply(MachineInput::OpenFailed).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let machine = ConnectionMachine::new(SourceId(1), policy(3));
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert_eq!(machine.reconnect_attempts(), 0);
        assert_eq!(machine.next_step(), NextStep::Open);
    }

    #[test]
    fn test_successful_connect() {
        let mut machine = ConnectionMachine::new(SourceId(1), policy(3));

        let t = machine.apply(MachineInput::Connect).unwrap();
        assert_eq!((t.from, t.to), (ConnectionState::Disconnected, ConnectionState::Connecting));

        let t = machine.apply(MachineInput::Opened).unwrap();
        assert_eq!((t.from, t.to), (ConnectionState::Connecting, ConnectionState::Streaming));
        assert_eq!(machine.next_step(), NextStep::Read);
    }

    #[test]
    fn test_reconnect_attempts_strictly_increase_then_backoff() {
        let mut machine = ConnectionMachine::new(SourceId(1), policy(3));

        for expected in 1..=3 {
            assert_eq!(machine.next_step(), NextStep::Open);
            let t = fail_open(&mut machine);
            assert_eq!(t.to, ConnectionState::Disconnected);
            assert_eq!(t.reconnect_attempts, expected);
        }

        assert!(machine.budget_exhausted());
        assert_eq!(machine.next_step(), NextStep::EnterBackoff);
        // Further connects are refused until backoff completes
        assert!(machine.apply(MachineInput::Connect).is_none());

        let t = machine.apply(MachineInput::BudgetExhausted).unwrap();
        assert_eq!((t.from, t.to), (ConnectionState::Disconnected, ConnectionState::Backoff));
        assert_eq!(
            machine.next_step(),
            NextStep::Wait(Duration::from_millis(50))
        );

        let t = machine.apply(MachineInput::BackoffElapsed).unwrap();
        assert_eq!((t.from, t.to), (ConnectionState::Backoff, ConnectionState::Disconnected));
        assert_eq!(t.reconnect_attempts, 0);
        assert_eq!(machine.next_step(), NextStep::Open);
    }

    #[test]
    fn test_successful_read_resets_attempts() {
        let mut machine = ConnectionMachine::new(SourceId(1), policy(5));
        fail_open(&mut machine);
        fail_open(&mut machine);
        assert_eq!(machine.reconnect_attempts(), 2);

        machine.apply(MachineInput::Connect).unwrap();
        machine.apply(MachineInput::Opened).unwrap();
        // Opening alone does not reset the budget
        assert_eq!(machine.reconnect_attempts(), 2);

        assert!(machine.apply(MachineInput::FrameRead).is_none());
        assert_eq!(machine.reconnect_attempts(), 0);
        assert_eq!(machine.state(), ConnectionState::Streaming);
    }

    #[test]
    fn test_read_failure_disconnects() {
        let mut machine = ConnectionMachine::new(SourceId(1), policy(5));
        machine.apply(MachineInput::Connect).unwrap();
        machine.apply(MachineInput::Opened).unwrap();
        machine.apply(MachineInput::FrameRead);

        let t = machine.apply(MachineInput::ReadFailed).unwrap();
        assert_eq!((t.from, t.to), (ConnectionState::Streaming, ConnectionState::Disconnected));
        assert_eq!(t.reconnect_attempts, 0);
    }

    #[test]
    fn test_repeated_read_failures_keep_open_budget() {
        let mut machine = ConnectionMachine::new(SourceId(1), policy(1));
        for _ in 0..3 {
            machine.apply(MachineInput::Connect).unwrap();
            machine.apply(MachineInput::Opened).unwrap();
            machine.apply(MachineInput::ReadFailed).unwrap();
            assert_eq!(machine.reconnect_attempts(), 0);
        }
        // Budget of one is still unspent, so no backoff yet
        assert!(machine.apply(MachineInput::BudgetExhausted).is_none());
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_shutdown_from_any_state_is_final() {
        for setup in 0..4 {
            let mut machine = ConnectionMachine::new(SourceId(1), policy(1));
            match setup {
                1 => {
                    machine.apply(MachineInput::Connect);
                }
                2 => {
                    machine.apply(MachineInput::Connect);
                    machine.apply(MachineInput::Opened);
                }
                3 => {
                    fail_open(&mut machine);
                    machine.apply(MachineInput::BudgetExhausted);
                }
                _ => {}
            }

            let t = machine.apply(MachineInput::Shutdown).unwrap();
            assert_eq!(t.to, ConnectionState::Terminated);
            assert_eq!(machine.next_step(), NextStep::Stop);
            assert!(machine.apply(MachineInput::Connect).is_none());
            assert!(machine.apply(MachineInput::Shutdown).is_none());
        }
    }

    #[test]
    fn test_state_u8_roundtrip() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Streaming,
            ConnectionState::Backoff,
            ConnectionState::Terminated,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
    }
}
