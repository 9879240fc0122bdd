use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mirror error: {0}")]
    Mirror(#[from] distmirror_engine::MirrorError),
}
