//! Error taxonomy shared by the class reader, the walker and the toppings.

use thiserror::Error;

/// Crate result type
pub type Result<T> = std::result::Result<T, Error>;

/// Result of anything that can be cut short by a dispatch hook.
pub type Walk<T> = std::result::Result<T, Halt>;

#[derive(Debug, Error)]
pub enum Error {
    /// An opcode with no handler, or one that is deliberately refused.
    #[error("unsupported instruction {mnemonic} at {position}")]
    Unsupported {
        mnemonic: &'static str,
        position: u32,
    },

    /// An assumption about the operand stack, argument count or constant type did not hold.
    #[error("unexpected shape at {position}: {message}")]
    Shape { position: u32, message: String },

    #[error("resolution failed: {0}")]
    Resolution(String),

    #[error("hook failed: {0}")]
    Hook(String),

    #[error("malformed descriptor {0:?}")]
    Descriptor(String),

    #[error("unbalanced operations: {0}")]
    Nesting(String),

    #[error("class parse error: {0}")]
    ClassParse(#[from] binrw::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),
}

impl Error {
    pub fn shape(position: u32, message: impl Into<String>) -> Self {
        Error::Shape {
            position,
            message: message.into(),
        }
    }
}

/// Why a walk ended before reaching the end of the method.
///
/// `Stop` is the hook's way of saying everything meaningful has already been
/// seen; it is not a failure and the operations gathered so far are kept.
#[derive(Debug, Error)]
pub enum Halt {
    #[error("walk stopped by hook")]
    Stop,
    #[error(transparent)]
    Fail(#[from] Error),
}

impl Halt {
    /// Turns a stop into `None` and a failure into the underlying error.
    pub fn into_error(self) -> Option<Error> {
        match self {
            Halt::Stop => None,
            Halt::Fail(e) => Some(e),
        }
    }
}
