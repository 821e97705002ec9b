use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    BadOperation,
    DegenerateGeometry,
    ForeignError,
    InconsistentState,
    IoError,
    MalformedData,
    NumericalFailure,
    ResourceMissing,
    UnsupportedFeature,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub description: String,
}

impl Error {
    pub fn new(kind: ErrorKind, description: String) -> Error {
        Error { kind, description }
    }

    // Whether the failure is confined to a single view of a batch.
    pub fn is_per_view(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::DegenerateGeometry | ErrorKind::NumericalFailure
        )
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{:?}: {}", self.kind, self.description)
    }
}

impl StdError for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::new(ErrorKind::IoError, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait IntoResult<T> {
    fn res<F: FnOnce() -> String>(self, desc: F) -> Result<T>;
}

impl<T, E: StdError> IntoResult<T> for std::result::Result<T, E> {
    fn res<F: FnOnce() -> String>(self, desc: F) -> Result<T> {
        self.map_err(|err| {
            let desc = format!("{} ({})", desc(), err);
            Error::new(ErrorKind::ForeignError, desc)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_into_result() {
        let res: std::result::Result<(), std::fmt::Error> =
            Err(std::fmt::Error);
        let err = res.res(|| "failed to format".to_string()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ForeignError);
        assert!(err.description.starts_with("failed to format ("));
    }

    #[test]
    fn test_is_per_view() {
        let err = Error::new(ErrorKind::DegenerateGeometry, String::new());
        assert!(err.is_per_view());
        let err = Error::new(ErrorKind::ResourceMissing, String::new());
        assert!(!err.is_per_view());
    }
}
