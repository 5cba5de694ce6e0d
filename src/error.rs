use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GpxError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed XML at position {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
    #[error("Malformed attribute: {0}")]
    Attribute(#[source] quick_xml::Error),
    #[error("Document root is not a <gpx> element")]
    NotGpx,
    #[error("Invalid {attribute} on <{element}>: {value:?}")]
    InvalidCoordinate {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
    #[error("Unexpected end of document inside <{0}>")]
    UnexpectedEof(String),
    #[error("Failed to write XML: {0}")]
    Write(#[source] quick_xml::Error),
}

impl GpxError {
    /// Attaches a file path to an I/O failure.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GpxError::Io {
            path: path.into(),
            source,
        }
    }
}
