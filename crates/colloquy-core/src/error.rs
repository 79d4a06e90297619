//! Error types for the Colloquy composer.

/// Result type alias for Colloquy operations
pub type ColloquyResult<T> = Result<T, ColloquyError>;

/// Main error type for Colloquy operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ColloquyError {
    /// Speech synthesis failed for an utterance
    #[error("Speech synthesis failed: {message}")]
    SynthesisError {
        /// Error message describing the failure
        message: String,
    },

    /// Audio format or processing error
    #[error("Audio processing error: {message}")]
    AudioProcessingError {
        /// Error message describing the processing issue
        message: String,
    },

    /// File I/O error
    #[error("File I/O error: {message}")]
    FileError {
        /// Error message describing the file operation failure
        message: String,
    },

    /// Voice not found error
    #[error("Voice '{voice_id}' not found")]
    VoiceNotFound {
        /// The voice ID or bucket that could not be resolved
        voice_id: String,
    },

    /// Invalid input error
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message describing the invalid input
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Conversation or participant table could not be ingested
    #[error("Script error: {message}")]
    ScriptError {
        /// Error message describing the malformed row or column
        message: String,
    },

    /// JSON serialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Error message describing the serialization failure
        message: String,
    },
}

impl ColloquyError {
    /// Create a new synthesis error
    #[must_use]
    pub fn synthesis<S: Into<String>>(message: S) -> Self {
        Self::SynthesisError {
            message: message.into(),
        }
    }

    /// Create a new audio processing error
    #[must_use]
    pub fn audio_processing<S: Into<String>>(message: S) -> Self {
        Self::AudioProcessingError {
            message: message.into(),
        }
    }

    /// Create a new file error
    #[must_use]
    pub fn file<S: Into<String>>(message: S) -> Self {
        Self::FileError {
            message: message.into(),
        }
    }

    /// Create a new voice not found error
    #[must_use]
    pub fn voice_not_found<S: Into<String>>(voice_id: S) -> Self {
        Self::VoiceNotFound {
            voice_id: voice_id.into(),
        }
    }

    /// Create a new invalid input error
    #[must_use]
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new script error
    #[must_use]
    pub fn script<S: Into<String>>(message: S) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    #[must_use]
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Check if this error is due to invalid user input or setup
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::VoiceNotFound { .. }
                | Self::ConfigurationError { .. }
                | Self::ScriptError { .. }
        )
    }

    /// Get the error category for logging
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::SynthesisError { .. } => "synthesis",
            Self::AudioProcessingError { .. } => "audio_processing",
            Self::FileError { .. } => "file",
            Self::VoiceNotFound { .. } => "voice",
            Self::InvalidInput { .. } => "input",
            Self::ConfigurationError { .. } => "configuration",
            Self::ScriptError { .. } => "script",
            Self::SerializationError { .. } => "serialization",
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for ColloquyError {
    fn from(err: std::io::Error) -> Self {
        Self::file(err.to_string())
    }
}

impl From<serde_json::Error> for ColloquyError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON serialization error: {err}"))
    }
}

impl From<csv::Error> for ColloquyError {
    fn from(err: csv::Error) -> Self {
        Self::script(format!("CSV error: {err}"))
    }
}

impl From<hound::Error> for ColloquyError {
    fn from(err: hound::Error) -> Self {
        Self::audio_processing(format!("WAV error: {err}"))
    }
}

impl From<rubato::ResamplerConstructionError> for ColloquyError {
    fn from(err: rubato::ResamplerConstructionError) -> Self {
        Self::audio_processing(format!("Resampler setup failed: {err}"))
    }
}

impl From<rubato::ResampleError> for ColloquyError {
    fn from(err: rubato::ResampleError) -> Self {
        Self::audio_processing(format!("Resampling failed: {err}"))
    }
}

impl From<toml::de::Error> for ColloquyError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(format!("Invalid config file: {err}"))
    }
}
