//! Loading interaction datasets from CSV files.
//!
//! Files need a header with `user_id`, `item_id` and `timestamp` columns
//! and an optional `label` column; labels default to `1.0`. Vocabulary
//! sizes are taken from the largest ids present.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv;
use failure;

use crate::data::{Interaction, Interactions};

/// Read interactions from any CSV source.
pub fn from_reader<R: Read>(reader: R) -> Result<Interactions, failure::Error> {
    let mut reader = csv::Reader::from_reader(reader);
    let interactions: Vec<Interaction> = reader.deserialize().collect::<Result<Vec<_>, _>>()?;

    info!("Loaded {} interactions", interactions.len());

    Ok(Interactions::from(interactions))
}

/// Read interactions from the CSV file at `path`.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Interactions, failure::Error> {
    from_reader(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_optional() {
        let data = "user_id,item_id,timestamp\n0,3,10\n2,1,11\n";
        let interactions = from_reader(data.as_bytes()).unwrap();

        assert_eq!(interactions.shape(), (3, 4));
        assert_eq!(interactions.data()[1], Interaction::new(2, 1, 11));
        assert_eq!(interactions.data()[0].label(), 1.0);
    }

    #[test]
    fn explicit_labels() {
        let data = "user_id,item_id,timestamp,label\n0,0,1,4.5\n1,1,2,0\n";
        let interactions = from_reader(data.as_bytes()).unwrap();

        assert_eq!(interactions.data()[0].label(), 4.5);
        assert!(!interactions.data()[1].is_positive());
    }

    #[test]
    fn malformed_rows_fail() {
        let data = "user_id,item_id,timestamp\n0,x,1\n";

        assert!(from_reader(data.as_bytes()).is_err());
    }

    #[test]
    fn reads_file() {
        let path = std::env::temp_dir().join("recokit_datasets_reads_file.csv");
        std::fs::write(&path, "user_id,item_id,timestamp,label\n1,2,3,0.5\n").unwrap();

        let interactions = load_csv(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(interactions.shape(), (2, 3));
        assert_eq!(interactions.data()[0].label(), 0.5);
    }

    #[test]
    fn missing_file() {
        assert!(load_csv("does/not/exist.csv").is_err());
    }
}
