use crate::error::MnistError;
use flate2::read::GzDecoder;
use itertools::Itertools;
use log::{debug, info};
use ndarray::Array1;
use std::{
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};

pub const IMAGE_ROWS: usize = 28;
pub const IMAGE_COLUMNS: usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_ROWS * IMAGE_COLUMNS;
pub const NUM_CLASSES: usize = 10;

const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;

// Intensities are first scaled to [0, 1], then shifted and scaled by this mean and standard
// deviation, leaving every pixel in [-1, 1].
const NORMALIZE_MEAN: f64 = 0.5;
const NORMALIZE_STD: f64 = 0.5;

const TRAINING_IMAGES: &str = "train-images-idx3-ubyte";
const TRAINING_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

// A single handwritten digit, flattened row by row into a 784-element vector of normalized
// intensities, paired with its correct label.
#[derive(Debug, Clone)]
pub struct MnistSample {
    pub image: Array1<f64>,
    pub label: u8,
}

pub struct MnistData {
    pub training_data: Vec<MnistSample>,
    pub test_data: Vec<MnistSample>,
}

impl MnistData {
    // Loads the four MNIST files from `dir`. Each file may be stored either gzip-compressed (with
    // a ".gz" suffix) or raw; the compressed version is preferred when both exist.
    pub fn load(dir: &Path) -> Result<MnistData, MnistError> {
        let training_data = parse_idx(
            &read_idx_file(dir, TRAINING_IMAGES)?,
            &read_idx_file(dir, TRAINING_LABELS)?,
        )?;
        let test_data = parse_idx(
            &read_idx_file(dir, TEST_IMAGES)?,
            &read_idx_file(dir, TEST_LABELS)?,
        )?;

        info!(
            "Loaded {} training and {} test samples from {}",
            training_data.len(),
            test_data.len(),
            dir.display()
        );

        Ok(MnistData {
            training_data,
            test_data,
        })
    }
}

fn read_idx_file(dir: &Path, name: &'static str) -> Result<Vec<u8>, MnistError> {
    fn read_all(path: &PathBuf, mut reader: impl Read) -> Result<Vec<u8>, MnistError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|source| MnistError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(bytes)
    }

    fn open(path: &PathBuf) -> Result<Option<File>, MnistError> {
        match File::open(path) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(MnistError::Io {
                path: path.clone(),
                source,
            }),
        }
    }

    let gz_path = dir.join(format!("{name}.gz"));
    if let Some(file) = open(&gz_path)? {
        debug!("Decompressing {}", gz_path.display());
        return read_all(&gz_path, GzDecoder::new(file));
    }

    let raw_path = dir.join(name);
    match open(&raw_path)? {
        Some(file) => {
            debug!("Reading {}", raw_path.display());
            read_all(&raw_path, file)
        }
        None => Err(MnistError::MissingFile {
            dir: dir.to_path_buf(),
            name,
        }),
    }
}

// Reads `fields` big-endian u32 header values from the start of an IDX file.
fn read_header(bytes: &[u8], fields: usize) -> Result<Vec<u32>, MnistError> {
    let header_len = fields * 4;
    if bytes.len() < header_len {
        return Err(MnistError::Truncated {
            expected: header_len,
            found: bytes.len(),
        });
    }

    Ok(bytes[..header_len]
        .chunks_exact(4)
        .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

// Takes the raw (decompressed) bytes of an MNIST image file and its label file and turns them into
// normalized samples.
//
// The image header is four u32s: the magic number (2051), the number of images, the number of
// rows and the number of columns. The label header is two u32s: the magic number (2049) and the
// number of labels. Everything after the headers is one byte per pixel or per label.
pub fn parse_idx(image_bytes: &[u8], label_bytes: &[u8]) -> Result<Vec<MnistSample>, MnistError> {
    let image_header = read_header(image_bytes, 4)?;
    if image_header[0] != IMAGE_MAGIC {
        return Err(MnistError::BadMagic {
            expected: IMAGE_MAGIC,
            found: image_header[0],
        });
    }
    let images = image_header[1] as usize;
    let rows = image_header[2] as usize;
    let columns = image_header[3] as usize;

    let label_header = read_header(label_bytes, 2)?;
    if label_header[0] != LABEL_MAGIC {
        return Err(MnistError::BadMagic {
            expected: LABEL_MAGIC,
            found: label_header[0],
        });
    }
    let labels = label_header[1] as usize;

    if images != labels {
        return Err(MnistError::CountMismatch { images, labels });
    }
    if rows != IMAGE_ROWS || columns != IMAGE_COLUMNS {
        return Err(MnistError::UnexpectedDimensions { rows, columns });
    }

    let image_body = &image_bytes[16..];
    let label_body = &label_bytes[8..];
    if image_body.len() < images * IMAGE_PIXELS {
        return Err(MnistError::Truncated {
            expected: 16 + images * IMAGE_PIXELS,
            found: image_bytes.len(),
        });
    }
    if label_body.len() < labels {
        return Err(MnistError::Truncated {
            expected: 8 + labels,
            found: label_bytes.len(),
        });
    }

    let mut samples = Vec::with_capacity(images);

    // Split the pixel stream into 784-byte images and pair each one with its label.
    for (index, (pixels, &label)) in image_body[..images * IMAGE_PIXELS]
        .iter()
        .chunks(IMAGE_PIXELS)
        .into_iter()
        .zip(&label_body[..labels])
        .enumerate()
    {
        if label as usize >= NUM_CLASSES {
            return Err(MnistError::InvalidLabel { index, label });
        }

        samples.push(MnistSample {
            image: pixels.map(|&pixel| normalize(pixel)).collect(),
            label,
        });
    }

    Ok(samples)
}

fn normalize(pixel: u8) -> f64 {
    (pixel as f64 / 255.0 - NORMALIZE_MEAN) / NORMALIZE_STD
}
