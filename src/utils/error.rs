use thiserror::Error;

#[derive(Error, Debug)]
pub enum TstatError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("Device {slave} rejected request: {code}")]
    ExceptionResponse { slave: u8, code: String },

    #[error("Timeout occurred")]
    Timeout,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Must specify tstat id")]
    MissingDeviceId,

    #[error("No operation selected (see --help)")]
    NoOperation,

    #[error("Device not found: address {0}")]
    DeviceNotFound(u8),

    #[error("Address is not free at ID {0}")]
    AddressOccupied(u8),

    #[error("Register {register} reads back {actual}, expected {expected}")]
    ReadbackMismatch {
        register: u16,
        expected: u16,
        actual: u16,
    },

    #[error("Unknown register profile: {0}")]
    UnknownProfile(String),

    #[error("Profile file error: {0}")]
    ProfileFile(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for TstatError {
    fn from(err: std::io::Error) -> Self {
        TstatError::CommunicationError(format!("IO error: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for TstatError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        TstatError::Timeout
    }
}

impl From<toml::de::Error> for TstatError {
    fn from(err: toml::de::Error) -> Self {
        TstatError::ConfigError(format!("TOML error: {}", err))
    }
}

pub type TstatResult<T> = Result<T, TstatError>;
