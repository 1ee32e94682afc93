use std::time::Duration;

use url::Url;

pub const DEFAULT_INIT_PATH: &str = "/textTerminalInit";
pub const DEFAULT_DATA_PATH: &str = "/textTerminalData";
pub const DEFAULT_INPUT_PATH: &str = "/textTerminalInput";
pub const DEFAULT_SESSION_HEADER: &str = "uuid";
pub const DEFAULT_INTERRUPT_HEADER: &str = "textio-user-interrupt";
pub const DEFAULT_HANDLER_HEADER: &str = "textio-handler-id";

/// Endpoint paths and header names. Paths are joined onto `base_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    pub base_url: Url,
    pub init_path: String,
    pub data_path: String,
    pub input_path: String,
    pub session_header: String,
    pub interrupt_header: String,
    pub handler_header: String,
    /// Bounds connection setup only; requests themselves never time out.
    pub connect_timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            init_path: DEFAULT_INIT_PATH.to_string(),
            data_path: DEFAULT_DATA_PATH.to_string(),
            input_path: DEFAULT_INPUT_PATH.to_string(),
            session_header: DEFAULT_SESSION_HEADER.to_string(),
            interrupt_header: DEFAULT_INTERRUPT_HEADER.to_string(),
            handler_header: DEFAULT_HANDLER_HEADER.to_string(),
            connect_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_init_path(mut self, path: impl Into<String>) -> Self {
        self.init_path = path.into();
        self
    }

    pub fn with_data_path(mut self, path: impl Into<String>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_input_path(mut self, path: impl Into<String>) -> Self {
        self.input_path = path.into();
        self
    }
}
