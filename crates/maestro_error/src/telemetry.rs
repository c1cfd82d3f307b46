//! Telemetry delivery error type.

/// Telemetry sink delivery failure.
///
/// The router logs these locally and swallows them; telemetry must never
/// fail a request.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Telemetry Error: {} at line {} in {}", message, line, file)]
pub struct TelemetryError {
    /// The underlying error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl TelemetryError {
    /// Create a new TelemetryError with the given message at the current location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
