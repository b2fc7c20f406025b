use thiserror::Error;

use crate::backend::GrammarRule;

/// Recoverable errors: everything caused by caller-supplied text or
/// files.  Contract violations inside the engine panic instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parsing ground program failed: {0}")]
    Parse(Box<pest::error::Error<GrammarRule>>),

    #[error("Unknown program fragment '{0}'")]
    UnknownFragment(String),

    #[error("Fragment '{name}' expects {expected} parameters, found {found}")]
    FragmentArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// `thiserror`'s `#[from]` can't box for us.
impl From<pest::error::Error<GrammarRule>> for Error {
    fn from(err: pest::error::Error<GrammarRule>) -> Self {
        Error::Parse(Box::new(err))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
