use thiserror::Error;

use crate::process::MemoryError;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("Parse error: {detail}")]
    ParseError { detail: String },
    #[error("Memory read failed: {err}")]
    Memory {
        #[from]
        err: MemoryError,
    },
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Declared {what} count is negative: {value}")]
    NegativeCount { what: &'static str, value: i64 },
    #[error("Surface {surface}: data block index {value} outside table of {limit}")]
    SurfaceDataOutOfRange {
        surface: usize,
        value: u32,
        limit: u32,
    },
    #[error("Surface {surface}: vertex range {base}+{count} exceeds declared vertex count {limit}")]
    VertexRangeOutOfBounds {
        surface: usize,
        base: u32,
        count: u32,
        limit: u32,
    },
    #[error("Surface {surface}: face element {element} outside index array of {limit}")]
    FaceElementOutOfBounds {
        surface: usize,
        element: u64,
        limit: u64,
    },
    #[error("Surface {surface}: face index {value} outside vertex range of {limit}")]
    FaceIndexOutOfBounds {
        surface: usize,
        value: u64,
        limit: u64,
    },
    #[error(
        "Surface {surface}: {attribute} bytes {offset:#x}+{length:#x} exceed zone buffer of {limit:#x}"
    )]
    ZoneSliceOutOfBounds {
        surface: usize,
        attribute: &'static str,
        offset: u64,
        length: u64,
        limit: u64,
    },
    #[error("Surface {surface}: data block declares zero texture layers")]
    ZeroLayerCount { surface: usize },
    #[error("Vertex {vertex}: non-finite {attribute}")]
    NonFiniteAttribute {
        vertex: usize,
        attribute: &'static str,
    },
    #[error("Vertex {vertex}: packed normal decodes to a zero-length vector")]
    DegenerateNormal { vertex: usize },
    #[error("Placement {placement}: non-finite {attribute}")]
    NonFinitePlacement {
        placement: usize,
        attribute: &'static str,
    },
    #[error("Instance range {range}: unique model index {value} outside table of {limit}")]
    UniqueModelOutOfBounds {
        range: usize,
        value: u32,
        limit: u32,
    },
    #[error("Instance range {range}: instances {first}+{count} outside placement table of {limit}")]
    InstanceRangeOutOfBounds {
        range: usize,
        first: u32,
        count: u32,
        limit: usize,
    },
}

impl From<winnow::error::ErrMode<winnow::error::ContextError>> for Error {
    fn from(e: winnow::error::ErrMode<winnow::error::ContextError>) -> Self {
        Self {
            kind: ErrorKind::ParseError {
                detail: format!("{e}"),
            },
        }
    }
}

impl From<winnow::error::ErrMode<winnow::error::ContextError>> for ErrorKind {
    fn from(e: winnow::error::ErrMode<winnow::error::ContextError>) -> Self {
        ErrorKind::ParseError {
            detail: format!("{e}"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error { kind }
    }
}

impl From<MemoryError> for Error {
    fn from(x: MemoryError) -> Error {
        Error { kind: x.into() }
    }
}

impl From<std::io::Error> for Error {
    fn from(x: std::io::Error) -> Error {
        Error { kind: x.into() }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

pub type RipResult<T> = Result<T, Error>;

pub fn failure_from_kind(kind: ErrorKind) -> Error {
    Error { kind }
}
