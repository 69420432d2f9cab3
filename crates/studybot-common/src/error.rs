use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type shared across all Studybot crates.
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(String),

    /// Unknown user or session; rejected before any processing begins.
    #[error("not found: {0}")]
    NotFound(String),

    /// The completion service was unreachable or returned a malformed
    /// response. `status` is `None` for transport-level failures that
    /// never produced an HTTP status.
    #[error("completion service failed: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// The tool-calling loop hit its round limit without a final answer.
    #[error("tool loop exceeded maximum of {0} rounds")]
    RoundLimit(usize),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    /// Audio input rejected before any backend call.
    #[error("audio input is {actual_secs:.1}s, longer than the {limit_secs}s limit")]
    AudioTooLong { actual_secs: f64, limit_secs: u32 },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Internal orchestration fault (bad state, malformed tool payloads).
    #[error("agent error: {0}")]
    Agent(String),
}

impl Error {
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Error::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn upstream_display_omits_status_plumbing() {
        let err = Error::Upstream {
            status: Some(503),
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "completion service failed: overloaded");
        assert_eq!(err.upstream_status(), Some(503));
    }

    #[test]
    fn audio_too_long_reports_both_durations() {
        let err = Error::AudioTooLong {
            actual_secs: 70.2,
            limit_secs: 60,
        };
        let msg = err.to_string();
        assert!(msg.contains("70.2"));
        assert!(msg.contains("60"));
    }
}
