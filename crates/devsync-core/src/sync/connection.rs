//! Connection lifecycle state machine
//!
//! Pure bookkeeping with no I/O: the client task feeds socket and timer
//! events in and acts on the returned transitions. Keeping it separate lets
//! the reconnect rules be tested without a socket.
//!
//! ```text
//! Idle ──(token found)──> Connecting ──(open)──> Connected
//! Connecting | Connected ──(close/error, attempts < max)──> Reconnecting
//! Connecting | Connected ──(close/error, attempts == max)──> Disconnected
//! Reconnecting ──(timer, current generation)──> Connecting
//! Idle | Reconnecting ──(no token)──> Disconnected
//! any ──(shutdown)──> Disconnected
//! ```

use std::time::Duration;

use super::backoff::ReconnectPolicy;

/// Why a connection ended up terminally disconnected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Reconnect budget exhausted
    RetriesExhausted,
    /// Token disappeared before a reconnect was due
    NoCredentials,
    /// Explicit shutdown
    Shutdown,
}

/// Lifecycle state of the sync connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, no connection attempted (no token)
    Idle,
    /// Socket handshake in progress
    Connecting,
    /// Socket open, receiving frames
    Connected,
    /// Waiting for the reconnect timer
    Reconnecting { attempt: u32, delay: Duration },
    /// Terminal; only a fresh client connects again
    Disconnected(DisconnectReason),
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Disconnected(_))
    }

    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting { .. } => "reconnecting",
            ConnectionState::Disconnected(_) => "disconnected",
        }
    }
}

/// Point-in-time view published to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    /// Reconnect attempts used since the last successful open
    pub attempts: u32,
}

/// What the caller must do after the connection was lost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Arm a one-shot timer; hand `generation` back to [`Connection::timer_fired`]
    ScheduleReconnect {
        attempt: u32,
        delay: Duration,
        generation: u64,
    },
    /// Budget spent, stay disconnected
    GiveUp,
    /// Event arrived in a state where it means nothing
    Ignored,
}

/// Reconnect bookkeeping for a single socket
#[derive(Debug, Clone)]
pub struct Connection {
    state: ConnectionState,
    attempts: u32,
    /// Bumped whenever a pending timer becomes stale
    generation: u64,
    policy: ReconnectPolicy,
}

impl Connection {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            attempts: 0,
            generation: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            state: self.state,
            attempts: self.attempts,
        }
    }

    /// A token was resolved and a handshake is starting
    ///
    /// Returns false when the connection is already terminal.
    pub fn begin_connect(&mut self) -> bool {
        match self.state {
            ConnectionState::Idle | ConnectionState::Reconnecting { .. } => {
                self.state = ConnectionState::Connecting;
                true
            }
            _ => false,
        }
    }

    /// The socket opened
    ///
    /// Resets the attempt counter so that a stable session followed by a
    /// drop gets the full reconnect budget again.
    pub fn opened(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Connected;
            self.attempts = 0;
        }
    }

    /// The socket closed or errored (during handshake or after open)
    pub fn lost(&mut self) -> Transition {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return Transition::Ignored;
        }

        let attempt = self.attempts + 1;
        match self.policy.delay_for(attempt) {
            Some(delay) => {
                self.attempts = attempt;
                self.generation += 1;
                self.state = ConnectionState::Reconnecting { attempt, delay };
                Transition::ScheduleReconnect {
                    attempt,
                    delay,
                    generation: self.generation,
                }
            }
            None => {
                self.generation += 1;
                self.state = ConnectionState::Disconnected(DisconnectReason::RetriesExhausted);
                Transition::GiveUp
            }
        }
    }

    /// A reconnect timer elapsed
    ///
    /// Returns true if the timer is still current and a connect should
    /// start now. Stale timers (superseded or after shutdown) return false.
    pub fn timer_fired(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        matches!(self.state, ConnectionState::Reconnecting { .. })
    }

    /// No token was available when a connect was due
    ///
    /// Terminal from every non-terminal state, the first connect included.
    pub fn abandon(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.generation += 1;
        self.state = ConnectionState::Disconnected(DisconnectReason::NoCredentials);
    }

    /// Explicit teardown; invalidates any pending timer
    pub fn shutdown(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Disconnected(DisconnectReason::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::from_millis(1000), 5)
    }

    #[test]
    fn test_initial_state() {
        let conn = Connection::new(policy());
        assert_eq!(conn.state(), ConnectionState::Idle);
        assert_eq!(conn.attempts(), 0);
    }

    #[test]
    fn test_open_then_close_schedules_first_retry() {
        let mut conn = Connection::new(policy());
        assert!(conn.begin_connect());
        conn.opened();
        assert_eq!(conn.state(), ConnectionState::Connected);

        let transition = conn.lost();
        match transition {
            Transition::ScheduleReconnect { attempt, delay, .. } => {
                assert_eq!(attempt, 1);
                assert_eq!(delay, Duration::from_millis(1000));
            }
            other => panic!("Expected reconnect, got {:?}", other),
        }
        assert_eq!(
            conn.state(),
            ConnectionState::Reconnecting {
                attempt: 1,
                delay: Duration::from_millis(1000)
            }
        );
    }

    #[test]
    fn test_exhaustion_is_terminal() {
        let mut conn = Connection::new(policy());
        let mut delays = Vec::new();

        assert!(conn.begin_connect());
        loop {
            match conn.lost() {
                Transition::ScheduleReconnect {
                    delay, generation, ..
                } => {
                    delays.push(delay.as_millis());
                    assert!(conn.timer_fired(generation));
                    assert!(conn.begin_connect());
                }
                Transition::GiveUp => break,
                Transition::Ignored => panic!("Unexpected ignored transition"),
            }
        }

        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
        assert_eq!(conn.attempts(), 5);
        assert_eq!(
            conn.state(),
            ConnectionState::Disconnected(DisconnectReason::RetriesExhausted)
        );

        // Nothing revives a terminal connection
        assert!(!conn.begin_connect());
        assert_eq!(conn.lost(), Transition::Ignored);
    }

    #[test]
    fn test_successful_open_resets_attempts() {
        let mut conn = Connection::new(policy());
        conn.begin_connect();
        for _ in 0..3 {
            if let Transition::ScheduleReconnect { generation, .. } = conn.lost() {
                assert!(conn.timer_fired(generation));
                conn.begin_connect();
            }
        }
        assert_eq!(conn.attempts(), 3);

        conn.opened();
        assert_eq!(conn.attempts(), 0);

        match conn.lost() {
            Transition::ScheduleReconnect { attempt, .. } => assert_eq!(attempt, 1),
            other => panic!("Expected reconnect, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_timer_ignored_after_shutdown() {
        let mut conn = Connection::new(policy());
        conn.begin_connect();
        let Transition::ScheduleReconnect { generation, .. } = conn.lost() else {
            panic!("Expected reconnect");
        };

        conn.shutdown();
        assert!(!conn.timer_fired(generation));
        assert_eq!(
            conn.state(),
            ConnectionState::Disconnected(DisconnectReason::Shutdown)
        );
    }

    #[test]
    fn test_superseded_timer_ignored() {
        let mut conn = Connection::new(policy());
        conn.begin_connect();
        let Transition::ScheduleReconnect {
            generation: first, ..
        } = conn.lost()
        else {
            panic!("Expected reconnect");
        };
        assert!(conn.timer_fired(first));
        conn.begin_connect();
        let Transition::ScheduleReconnect {
            generation: second, ..
        } = conn.lost()
        else {
            panic!("Expected reconnect");
        };

        assert!(!conn.timer_fired(first));
        assert!(conn.timer_fired(second));
    }

    #[test]
    fn test_abandon_before_first_connect() {
        let mut conn = Connection::new(policy());
        conn.abandon();
        assert_eq!(
            conn.state(),
            ConnectionState::Disconnected(DisconnectReason::NoCredentials)
        );
        assert!(!conn.begin_connect());
    }

    #[test]
    fn test_abandon_while_reconnecting() {
        let mut conn = Connection::new(policy());
        conn.begin_connect();
        let Transition::ScheduleReconnect { generation, .. } = conn.lost() else {
            panic!("Expected reconnect");
        };
        conn.abandon();
        assert_eq!(
            conn.state(),
            ConnectionState::Disconnected(DisconnectReason::NoCredentials)
        );
        assert!(!conn.timer_fired(generation));

        // Already terminal
        conn.abandon();
        assert_eq!(
            conn.state(),
            ConnectionState::Disconnected(DisconnectReason::NoCredentials)
        );
    }

    #[test]
    fn test_zero_budget_gives_up_immediately() {
        let mut conn = Connection::new(ReconnectPolicy::new(Duration::from_millis(10), 0));
        conn.begin_connect();
        assert_eq!(conn.lost(), Transition::GiveUp);
        assert!(conn.state().is_terminal());
    }
}
