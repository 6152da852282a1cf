use thiserror::Error;
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("malformed frame: {0}")]
    Decode(String),
    #[error("frame has no `type` discriminator")]
    MissingType,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to render scope: {0}")]
    Plot(String),
    #[error("export log is empty; start viewing before exporting")]
    EmptyExport,
    #[error("status poll failed: {0}")]
    Status(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for ScopeError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ScopeError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for ScopeError {
    fn from(value: image::ImageError) -> Self {
        ScopeError::Plot(value.to_string())
    }
}
impl From<serde_json::Error> for ScopeError {
    fn from(value: serde_json::Error) -> Self {
        ScopeError::Decode(value.to_string())
    }
}
impl From<toml::de::Error> for ScopeError {
    fn from(value: toml::de::Error) -> Self {
        ScopeError::Config(value.to_string())
    }
}
impl From<reqwest::Error> for ScopeError {
    fn from(value: reqwest::Error) -> Self {
        ScopeError::Status(value.to_string())
    }
}
impl From<tokio_tungstenite::tungstenite::Error> for ScopeError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        ScopeError::Transport(value.to_string())
    }
}
