#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown job kind: {0}")]
    UnknownJobKind(String),

    #[error("Invalid stage list: {0}")]
    InvalidStages(String),
}
