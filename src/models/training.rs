use rand::{Rng, SeedableRng, XorShiftRng};
use rayon::prelude::*;

/// Accumulated loss over a partition.
#[derive(Clone, Copy, Debug, Default)]
pub struct PartitionLoss {
    pub loss: f32,
    pub examples: usize,
}

impl PartitionLoss {
    fn merge(self, other: PartitionLoss) -> PartitionLoss {
        PartitionLoss {
            loss: self.loss + other.loss,
            examples: self.examples + other.examples,
        }
    }

    fn mean(&self) -> f32 {
        if self.examples == 0 {
            0.0
        } else {
            self.loss / self.examples as f32
        }
    }
}

/// Run one hogwild epoch over `examples`.
///
/// Examples are shuffled and split into `num_threads` partitions, each
/// trained by `train_partition` on its own thread with its own rng.
/// Parameters are shared between threads without locking. Returns the
/// mean per-example loss.
pub fn run_epoch<T, F>(
    examples: &mut [T],
    num_threads: usize,
    rng: &mut XorShiftRng,
    train_partition: F,
) -> f32
where
    T: Sync,
    F: Fn(&[T], &mut XorShiftRng) -> PartitionLoss + Sync,
{
    rng.shuffle(examples);

    let num_threads = num_threads.max(1);
    let chunk_size = ((examples.len() + num_threads - 1) / num_threads).max(1);

    let mut partitions: Vec<_> = examples
        .chunks(chunk_size)
        .map(|chunk| (chunk, XorShiftRng::from_seed(rng.gen())))
        .collect();

    partitions
        .par_iter_mut()
        .map(|&mut (partition, ref mut thread_rng)| train_partition(partition, thread_rng))
        .reduce(PartitionLoss::default, PartitionLoss::merge)
        .mean()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_example_visited_once() {
        let mut examples: Vec<usize> = (0..103).collect();
        let mut rng = XorShiftRng::from_seed([3; 16]);

        let loss = run_epoch(&mut examples, 4, &mut rng, |partition, _| PartitionLoss {
            loss: partition.iter().map(|&x| x as f32).sum(),
            examples: partition.len(),
        });

        assert!((loss - 51.0).abs() < 1e-4);
    }

    #[test]
    fn empty_epoch() {
        let mut examples: Vec<usize> = Vec::new();
        let mut rng = XorShiftRng::from_seed([3; 16]);

        let loss = run_epoch(&mut examples, 4, &mut rng, |partition, _| PartitionLoss {
            loss: 0.0,
            examples: partition.len(),
        });

        assert_eq!(loss, 0.0);
    }
}
