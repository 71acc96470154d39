//! Debug Adapter Protocol message types.
//!
//! Only the envelopes and bodies this adapter actually speaks are modeled.
//! Everything serializes through `serde`; JSON `null` is the distinguished
//! [`serde_json::Value::Null`], while an absent field is `Option::None` and
//! is skipped on the wire — the two never collapse into each other.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An incoming request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Sequence number assigned by the client.
    pub seq: i64,
    /// Message type discriminator; must be `"request"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Command name.
    pub command: String,
    /// Command-specific arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// An outgoing response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number; stamped by the session at send time.
    pub seq: i64,
    #[serde(rename = "type")]
    pub kind: String,
    /// The `seq` of the request this answers.
    pub request_seq: i64,
    pub success: bool,
    /// The command that was requested.
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Response {
    /// A success response with no body.
    pub fn success(request: &Request) -> Self {
        Self {
            seq: 0,
            kind: "response".to_string(),
            request_seq: request.seq,
            success: true,
            command: request.command.clone(),
            body: None,
        }
    }

    /// A success response carrying a body.
    pub fn with_body<T: Serialize>(request: &Request, body: T) -> Self {
        Self {
            body: serde_json::to_value(body).ok(),
            ..Self::success(request)
        }
    }
}

/// An outgoing event envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Sequence number; stamped by the session at send time.
    pub seq: i64,
    #[serde(rename = "type")]
    pub kind: String,
    /// Event name.
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Event {
    /// An event with no body.
    pub fn new(event: &str) -> Self {
        Self {
            seq: 0,
            kind: "event".to_string(),
            event: event.to_string(),
            body: None,
        }
    }

    /// An event carrying a body.
    pub fn with_body<T: Serialize>(event: &str, body: T) -> Self {
        Self {
            body: serde_json::to_value(body).ok(),
            ..Self::new(event)
        }
    }
}

// ============================================================================
// Request arguments
// ============================================================================

/// Arguments of `launch`.
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchArguments {
    /// Path of the script to debug.
    pub program: String,
    /// Positional arguments handed to the script.
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Arguments of `setBreakpoints`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetBreakpointsArguments {
    pub source: Source,
    #[serde(default)]
    pub breakpoints: Vec<SourceBreakpoint>,
}

/// A requested breakpoint location within a `setBreakpoints` source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceBreakpoint {
    /// 1-based line number.
    pub line: i64,
}

/// Arguments of `scopes`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopesArguments {
    pub frame_id: i64,
}

/// Arguments of `variables`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesArguments {
    pub variables_reference: i64,
}

// ============================================================================
// Response bodies
// ============================================================================

/// Body of the `initialize` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub supports_configuration_done_request: bool,
}

/// A source reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A breakpoint descriptor, one per requested location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakpointInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

/// Body of the `setBreakpoints` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetBreakpointsResponseBody {
    pub breakpoints: Vec<BreakpointInfo>,
}

/// The one synthetic thread of the single-threaded debuggee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub name: String,
}

/// Body of the `threads` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadsResponseBody {
    pub threads: Vec<Thread>,
}

/// A stack frame as shown to the editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFrame {
    /// Frame id; equals the interpreter stack level at capture.
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub line: i64,
    pub column: i64,
}

/// Body of the `stackTrace` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponseBody {
    pub stack_frames: Vec<StackFrame>,
    pub total_frames: i64,
}

/// A variable scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub name: String,
    pub presentation_hint: String,
    /// 1-based index into the snapshot's variable table.
    pub variables_reference: i64,
    pub expensive: bool,
}

/// Body of the `scopes` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopesResponseBody {
    pub scopes: Vec<Scope>,
}

/// A named value within a scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    /// The interpreter's default stringification.
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// 0 marks a leaf with no children.
    pub variables_reference: i64,
}

/// Body of the `variables` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariablesResponseBody {
    pub variables: Vec<Variable>,
}

// ============================================================================
// Event bodies
// ============================================================================

/// Body of the `stopped` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    pub reason: String,
    pub thread_id: i64,
    pub all_threads_stopped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_breakpoint_ids: Option<Vec<i64>>,
}

/// Body of the `output` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEventBody {
    pub category: String,
    pub output: String,
}

/// Body of the `exited` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitedEventBody {
    pub exit_code: i64,
}
