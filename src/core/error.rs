use thiserror::Error;

#[derive(Error, Debug)]
pub enum AllocError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Out of space: requested {requested} blocks, largest free range is {largest_free}")]
    OutOfSpace { requested: u32, largest_free: u32 },

    #[error("Unknown handle [{start}, +{count}): not issued by this allocator or already released")]
    UnknownHandle { start: u32, count: u32 },

    #[error("Node pool exhausted: {0}")]
    PoolExhausted(&'static str),

    #[error("Allocator state corrupted: {0}")]
    Corrupted(String),

    #[error("Node pool initialization failed: {0}")]
    PoolInit(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for AllocError {
    fn from(err: toml::de::Error) -> Self {
        AllocError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AllocError>;
