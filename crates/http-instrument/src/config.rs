use h1stream::ParserLimits;

/// Configuration shared by the streams of instrumented connections
#[derive(Debug, Clone)]
pub struct InstrumentConfig {
    /// Line and capture limits for response parsing
    pub limits:               ParserLimits,
    /// Keep the body of responses with status >= 400 on their record
    pub capture_error_bodies: bool,
    /// Largest request head the writer buffers while looking for its end.
    /// Request observation stops for a stream that exceeds it. Default:
    /// 16 KiB.
    pub max_request_head:     usize,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            limits:               ParserLimits::default(),
            capture_error_bodies: true,
            max_request_head:     16 * 1024,
        }
    }
}

impl InstrumentConfig {
    /// Timing only: error bodies are neither captured nor buffered
    pub fn timing_only() -> Self {
        let mut config = Self::default();
        config.capture_error_bodies = false;
        config
    }

    /// Parser limits with error body capture applied
    pub fn parser_limits(&self) -> ParserLimits {
        let mut limits = self.limits.clone();
        if !self.capture_error_bodies {
            limits.error_body = 0;
        }
        limits
    }
}
