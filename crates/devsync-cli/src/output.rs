//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;
use serde_json::{Map, Value};

use devsync_core::sync::{ConnectionSnapshot, DisconnectReason};
use devsync_core::{ConnectionState, DeviceSession};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print the session list; `current_device` marks this device
    pub fn print_sessions(&self, sessions: &[DeviceSession], current_device: Option<&str>) {
        let is_current =
            |s: &DeviceSession| s.current || current_device == Some(s.device_id.as_str());

        match self.format {
            OutputFormat::Human => {
                if sessions.is_empty() {
                    println!("No active sessions.");
                    return;
                }
                for session in sessions {
                    let marker = if is_current(session) { "*" } else { " " };
                    let name = if session.device_name.is_empty() {
                        "(unnamed)"
                    } else {
                        session.device_name.as_str()
                    };
                    let last_active = session
                        .last_active_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{} {} | {} | {} | {}",
                        marker,
                        truncate(&session.device_id, 36),
                        truncate(name, 30),
                        session.device_type.as_deref().unwrap_or("-"),
                        last_active
                    );
                }
                println!("\n{} session(s)", sessions.len());
            }
            OutputFormat::Json => {
                let entries: Vec<_> = sessions
                    .iter()
                    .map(|s| {
                        let mut value = serde_json::to_value(s).unwrap_or(Value::Null);
                        if let Value::Object(ref mut obj) = value {
                            obj.insert("current".to_string(), Value::Bool(is_current(s)));
                        }
                        value
                    })
                    .collect();
                print_json(&entries);
            }
            OutputFormat::Quiet => {
                for session in sessions {
                    println!("{}", session.device_id);
                }
            }
        }
    }

    /// Print a connection state change
    pub fn print_state(&self, snapshot: &ConnectionSnapshot) {
        match self.format {
            OutputFormat::Human => {
                println!("[{}] {}", timestamp(), describe_state(&snapshot.state));
            }
            OutputFormat::Json => {
                let mut obj = serde_json::json!({
                    "event": "state",
                    "state": snapshot.state.label(),
                    "attempts": snapshot.attempts,
                });
                match snapshot.state {
                    ConnectionState::Reconnecting { attempt, delay } => {
                        obj["attempt"] = attempt.into();
                        obj["delay_ms"] = (delay.as_millis() as u64).into();
                    }
                    ConnectionState::Disconnected(reason) => {
                        obj["reason"] = reason_label(reason).into();
                    }
                    _ => {}
                }
                println!("{}", obj);
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print fields merged into the current user
    pub fn print_user_update(&self, fields: &Map<String, Value>) {
        match self.format {
            OutputFormat::Human => {
                let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
                println!("[{}] User updated: {}", timestamp(), keys.join(", "));
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"event": "user_update", "fields": fields})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Pretty-print a serializable value as JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

/// Human description of a connection state
pub fn describe_state(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Idle => "Idle".to_string(),
        ConnectionState::Connecting => "Connecting...".to_string(),
        ConnectionState::Connected => "Connected".to_string(),
        ConnectionState::Reconnecting { attempt, delay } => format!(
            "Connection lost, retrying in {}ms (attempt {})",
            delay.as_millis(),
            attempt
        ),
        ConnectionState::Disconnected(reason) => match reason {
            DisconnectReason::RetriesExhausted => "Disconnected: gave up reconnecting".to_string(),
            DisconnectReason::NoCredentials => "Disconnected: no stored token".to_string(),
            DisconnectReason::Shutdown => "Disconnected".to_string(),
        },
    }
}

fn reason_label(reason: DisconnectReason) -> &'static str {
    match reason {
        DisconnectReason::RetriesExhausted => "retries_exhausted",
        DisconnectReason::NoCredentials => "no_credentials",
        DisconnectReason::Shutdown => "shutdown",
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
