use crate::error::ModelError;
use crate::mnist::{IMAGE_PIXELS, MnistSample};
use ndarray::Array2;
use ndarray_rand::rand::{Rng, seq::SliceRandom};

// A group of samples used for one gradient update. Each column of `inputs` is one flattened image,
// so the matrix is [784 x batch length], and `labels[j]` is the label of column j.
pub struct Batch {
    pub inputs: Array2<f64>,
    pub labels: Vec<usize>,
}

impl Batch {
    pub fn from_samples(samples: &[&MnistSample]) -> Result<Batch, ModelError> {
        if let Some(sample) = samples.iter().find(|sample| sample.image.len() != IMAGE_PIXELS) {
            return Err(ModelError::ShapeMismatch {
                what: "image pixels",
                got: sample.image.len(),
                expected: IMAGE_PIXELS,
            });
        }

        let inputs = Array2::from_shape_fn((IMAGE_PIXELS, samples.len()), |(pixel, column)| {
            samples[column].image[pixel]
        });
        let labels = samples.iter().map(|sample| sample.label as usize).collect();

        Ok(Batch { inputs, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub struct DataLoader<'a> {
    samples: &'a [MnistSample],
    batch_size: usize,
    shuffle: bool,
}

impl<'a> DataLoader<'a> {
    pub fn new(
        samples: &'a [MnistSample],
        batch_size: usize,
        shuffle: bool,
    ) -> Result<DataLoader<'a>, ModelError> {
        if batch_size == 0 {
            return Err(ModelError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }

        Ok(DataLoader {
            samples,
            batch_size,
            shuffle,
        })
    }

    pub fn num_batches(&self) -> usize {
        self.samples.len().div_ceil(self.batch_size)
    }

    // Returns the batches for one epoch. Every sample appears in exactly one batch; when the number
    // of samples isn't a multiple of the batch size, the last batch holds the remainder. The order
    // is drawn from `rng` up front, so the iterator doesn't keep borrowing it.
    pub fn batches<R: Rng + ?Sized>(&self, rng: &mut R) -> Batches<'a> {
        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        if self.shuffle {
            order.shuffle(rng);
        }

        Batches {
            samples: self.samples,
            order,
            batch_size: self.batch_size,
            position: 0,
        }
    }
}

pub struct Batches<'a> {
    samples: &'a [MnistSample],
    order: Vec<usize>,
    batch_size: usize,
    position: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch, ModelError>;

    fn next(&mut self) -> Option<Result<Batch, ModelError>> {
        if self.position >= self.order.len() {
            return None;
        }

        let end = (self.position + self.batch_size).min(self.order.len());
        let members: Vec<&MnistSample> = self.order[self.position..end]
            .iter()
            .map(|&index| &self.samples[index])
            .collect();
        self.position = end;

        Some(Batch::from_samples(&members))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use ndarray_rand::rand::{SeedableRng, rngs::StdRng};

    // Samples whose pixels all equal their index, so a column identifies where it came from.
    fn numbered_samples(count: usize) -> Vec<MnistSample> {
        (0..count)
            .map(|i| MnistSample {
                image: Array1::from_elem(IMAGE_PIXELS, i as f64),
                label: (i % 10) as u8,
            })
            .collect()
    }

    #[test]
    fn rejects_zero_batch_size() {
        let samples = numbered_samples(3);
        assert!(matches!(
            DataLoader::new(&samples, 0, true),
            Err(ModelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn keeps_order_without_shuffle_and_keeps_the_remainder() {
        let samples = numbered_samples(10);
        let loader = DataLoader::new(&samples, 4, false).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let batches: Vec<Batch> = loader
            .batches(&mut rng)
            .map(Result::unwrap)
            .collect();

        assert_eq!(loader.num_batches(), 3);
        assert_eq!(batches.len(), 3);
        assert_eq!(
            batches.iter().map(Batch::len).collect::<Vec<_>>(),
            vec![4, 4, 2]
        );
        assert_eq!(batches[0].inputs.dim(), (IMAGE_PIXELS, 4));
        assert_eq!(batches[2].labels, vec![8, 9]);
        assert_eq!(batches[1].inputs[[5, 0]], 4.0);
    }

    #[test]
    fn shuffled_epoch_visits_every_sample_once() {
        let samples = numbered_samples(25);
        let loader = DataLoader::new(&samples, 8, true).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let mut seen: Vec<usize> = loader
            .batches(&mut rng)
            .map(Result::unwrap)
            .flat_map(|batch| {
                batch
                    .inputs
                    .row(0)
                    .iter()
                    .map(|&x| x as usize)
                    .collect::<Vec<_>>()
            })
            .collect();
        let visited_in_order = seen.clone();
        seen.sort_unstable();

        assert_eq!(seen, (0..25).collect::<Vec<_>>());
        assert_ne!(visited_in_order, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn labels_follow_their_images() {
        let samples = numbered_samples(12);
        let loader = DataLoader::new(&samples, 5, true).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        for batch in loader.batches(&mut rng) {
            let batch = batch.unwrap();
            for (column, &label) in batch.labels.iter().enumerate() {
                assert_eq!(batch.inputs[[0, column]] as usize % 10, label);
            }
        }
    }

    #[test]
    fn images_of_the_wrong_size_are_an_error() {
        let short = MnistSample {
            image: Array1::zeros(10),
            label: 1,
        };
        let samples = vec![numbered_samples(1).remove(0), short];

        assert!(matches!(
            Batch::from_samples(&[&samples[0], &samples[1]]),
            Err(ModelError::ShapeMismatch {
                what: "image pixels",
                got: 10,
                expected: IMAGE_PIXELS
            })
        ));

        let loader = DataLoader::new(&samples, 2, false).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let results: Vec<_> = loader.batches(&mut rng).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
