//! Common constants used across Sluice

/// Capacity of the per-session data queue (content, reasoning and
/// recoverable error frames)
pub const DATA_QUEUE_CAPACITY: usize = 100;

/// Capacity of the per-session error queue (fatal faults)
pub const ERROR_QUEUE_CAPACITY: usize = 10;

/// Liveness tick period in seconds
pub const HEARTBEAT_INTERVAL_SECS: u64 = 5;

/// Frames buffered between the encoder and the HTTP body
pub const SINK_BUFFER_FRAMES: usize = 8;

/// Action tag carried by every agent answer payload
pub const ACTION_AGENT_ANSWER: &str = "agent_answer";

/// Cause reported when the producer terminates abnormally
pub const INTERNAL_SERVER_ERROR: &str = "internal server error";

/// Upper bound on engine tool-call rounds for a single query
pub const MAX_TOOL_ROUNDS: usize = 8;

/// Default pagination limits
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Wire framing
pub mod wire {
    pub const KEEP_ALIVE: &str = ": keep-alive\n\n";
    pub const DATA_PREFIX: &str = "data: ";
    pub const ERROR_PREFIX: &str = "error: [ERROR]";
    pub const FRAME_END: &str = "\n\n";
    pub const DONE: &str = "[DONE]\n";
}

/// Common provider identifiers
pub mod providers {
    pub const OPENAI: &str = "openai";
    pub const OLLAMA: &str = "ollama";
    pub const QWEN: &str = "qwen";
    pub const ANTHROPIC: &str = "anthropic";
    pub const GEMINI: &str = "gemini";
    pub const GROQ: &str = "groq";
    pub const DEEPSEEK: &str = "deepseek";
}

/// Default timeout values in seconds
pub mod timeouts {
    /// Agent and provider record lookups before streaming starts
    pub const LOOKUP_TIMEOUT: u64 = 5;
    /// Non-streaming HTTP requests
    pub const DEFAULT_REQUEST_TIMEOUT: u64 = 10;
}
