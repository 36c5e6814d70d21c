use std::fmt;

#[derive(Debug)]
pub enum ExportError {
    ExportInProgress,
    MissingPageShell,
    InvalidConfiguration(String),
    Render(String),
    Pdf(lopdf::Error),
    Archive(zip::result::ZipError),
    Sink(String),
    Io(std::io::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::ExportInProgress => write!(f, "an export is already in progress"),
            ExportError::MissingPageShell => write!(f, "no page shell template available"),
            ExportError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            ExportError::Render(message) => write!(f, "render surface error: {}", message),
            ExportError::Pdf(err) => write!(f, "pdf assembly failed: {}", err),
            ExportError::Archive(err) => write!(f, "archive assembly failed: {}", err),
            ExportError::Sink(message) => write!(f, "file delivery failed: {}", message),
            ExportError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Pdf(err) => Some(err),
            ExportError::Archive(err) => Some(err),
            ExportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(value: std::io::Error) -> Self {
        ExportError::Io(value)
    }
}

impl From<lopdf::Error> for ExportError {
    fn from(value: lopdf::Error) -> Self {
        ExportError::Pdf(value)
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(value: zip::result::ZipError) -> Self {
        ExportError::Archive(value)
    }
}
