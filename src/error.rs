use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while loading data, training, or moving
/// parameters to and from disk.
#[derive(Debug)]
pub enum Error {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    Encoding {
        path: PathBuf,
        source: bincode::Error,
    },
    /// The dataset root has no class subdirectories.
    NoClasses { root: PathBuf },
    /// The dataset root has the wrong number of class subdirectories.
    ClassCount {
        root: PathBuf,
        expected: usize,
        found: usize,
    },
    /// A class subdirectory contains no images.
    EmptyClass { root: PathBuf, class: String },
    ShapeMismatch {
        what: &'static str,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    ParamCount { expected: usize, found: usize },
    /// The parameter file was written by a network with a different topology.
    TopologyMismatch { expected: u64, found: u64 },
    BadMagic { path: PathBuf },
    InvalidTopology(String),
    InvalidConfig(String),
    EmptyDataset,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io { path, .. } => write!(f, "I/O error on {path:?}"),
            Error::Image { path, .. } => write!(f, "failed to decode image {path:?}"),
            Error::Encoding { path, .. } => write!(f, "failed to encode or decode model file {path:?}"),
            Error::NoClasses { root } => {
                write!(f, "dataset directory {root:?} has no class subdirectories")
            }
            Error::ClassCount {
                root,
                expected,
                found,
            } => write!(
                f,
                "dataset directory {root:?} has {found} class subdirectories, expected {expected}"
            ),
            Error::EmptyClass { root, class } => {
                write!(f, "class {class:?} in dataset directory {root:?} contains no images")
            }
            Error::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got:?}, expected {expected:?}"),
            Error::ParamCount { expected, found } => write!(
                f,
                "model file has {found} parameters, the network needs {expected}"
            ),
            Error::TopologyMismatch { expected, found } => write!(
                f,
                "model file was trained on a different network topology \
                 (fingerprint {found:016x}, this network is {expected:016x})"
            ),
            Error::BadMagic { path } => write!(f, "{path:?} is not a model file"),
            Error::InvalidTopology(msg) => write!(f, "invalid network topology: {msg}"),
            Error::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Error::EmptyDataset => write!(f, "dataset is empty"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Image { source, .. } => Some(source),
            Error::Encoding { source, .. } => Some(source),
            _ => None,
        }
    }
}
