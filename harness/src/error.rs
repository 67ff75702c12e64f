use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Harness errors: either a scenario's own assertion failed, or one of the
/// libraries under test returned an error the scenario didn't expect.
#[derive(Debug)]
pub enum Error {
    Assertion(String),
    Engine(clydefscore::Error),
    Directory(clydefs::Error),
}

impl From<clydefscore::Error> for Error {
    fn from(err: clydefscore::Error) -> Self {
        Self::Engine(err)
    }
}

impl From<clydefs::Error> for Error {
    fn from(err: clydefs::Error) -> Self {
        Self::Directory(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assertion(msg) => write!(f, "assertion failed: {msg}"),
            Self::Engine(err) => write!(f, "engine error: {err}"),
            Self::Directory(err) => write!(f, "directory error: {err}"),
        }
    }
}

impl std::error::Error for Error {}

/// Shorthand for a scenario's own `left == right` checks, since this crate
/// has no `assert_eq!`-in-a-`Result` helper in its dependency tree.
pub fn ensure_eq<T: PartialEq + fmt::Debug>(left: T, right: T, what: &str) -> Result<()> {
    if left != right {
        return Err(Error::Assertion(format!("{what}: {left:?} != {right:?}")));
    }
    Ok(())
}

pub fn ensure(cond: bool, what: &str) -> Result<()> {
    if !cond {
        return Err(Error::Assertion(what.to_string()));
    }
    Ok(())
}
