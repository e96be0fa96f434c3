use std::{fmt, io, path::PathBuf};

// Errors produced while reading the MNIST IDX files.
#[derive(Debug)]
pub enum MnistError {
    // Neither the gzip-compressed nor the raw version of a file exists.
    MissingFile { dir: PathBuf, name: &'static str },

    // The file exists but could not be read or decompressed.
    Io { path: PathBuf, source: io::Error },

    // The leading magic number does not identify the expected kind of IDX file.
    BadMagic { expected: u32, found: u32 },

    // The file ends before its header says it should.
    Truncated { expected: usize, found: usize },

    // The image file and the label file disagree on the number of samples.
    CountMismatch { images: usize, labels: usize },

    // Images are not 28x28.
    UnexpectedDimensions { rows: usize, columns: usize },

    // A label outside of [0, 9].
    InvalidLabel { index: usize, label: u8 },
}

impl fmt::Display for MnistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MnistError::MissingFile { dir, name } => {
                write!(f, "neither {name}.gz nor {name} found in {}", dir.display())
            }
            MnistError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            MnistError::BadMagic { expected, found } => {
                write!(f, "bad magic number: expected {expected}, found {found}")
            }
            MnistError::Truncated { expected, found } => {
                write!(f, "truncated file: expected {expected} bytes, found {found}")
            }
            MnistError::CountMismatch { images, labels } => {
                write!(f, "{images} images but {labels} labels")
            }
            MnistError::UnexpectedDimensions { rows, columns } => {
                write!(f, "expected 28x28 images, found {rows}x{columns}")
            }
            MnistError::InvalidLabel { index, label } => {
                write!(f, "sample {index} has label {label}, which is not a digit")
            }
        }
    }
}

impl std::error::Error for MnistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MnistError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// Errors produced by the model, the loss and the optimizer when given inconsistent inputs.
#[derive(Debug)]
pub enum ModelError {
    // A configuration value is unusable (e.g. a zero-width layer or a negative learning rate).
    InvalidConfig(String),

    // A shape invariant was violated.
    ShapeMismatch {
        // What was being checked (e.g. "input rows", "labels").
        what: &'static str,
        got: usize,
        expected: usize,
    },

    // A label does not index one of the output classes.
    LabelOutOfRange { label: usize, classes: usize },

    // A batch with no samples.
    EmptyBatch,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            ModelError::ShapeMismatch { what, got, expected } => {
                write!(f, "shape mismatch for {what}: got {got}, expected {expected}")
            }
            ModelError::LabelOutOfRange { label, classes } => {
                write!(f, "label {label} is out of range for {classes} classes")
            }
            ModelError::EmptyBatch => write!(f, "batch contains no samples"),
        }
    }
}

impl std::error::Error for ModelError {}
