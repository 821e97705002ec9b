use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind as IoErrorKind};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::defs::{Error, ErrorKind::*, IntoResult, Result};

fn describe(action: &str, path: &Path) -> String {
    if let Some(path) = path.to_str() {
        format!("failed to {} '{}'", action, path)
    } else {
        format!("failed to {}", action)
    }
}

pub fn open_file<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    File::open(path).map_err(|err| {
        let desc = describe("open file", path);
        if err.kind() == IoErrorKind::NotFound {
            Error::new(ResourceMissing, desc)
        } else {
            Error::new(IoError, format!("{} ({})", desc, err))
        }
    })
}

pub fn create_file<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    File::create(path).res(|| describe("create file", path))
}

pub fn create_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    create_dir_all(path).res(|| describe("create directory", path))
}

pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = open_file(path)?;
    BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .res(|| describe("read file", path))
}

pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = open_file(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| {
        let desc = format!("{} ({})", describe("parse JSON file", path), err);
        Error::new(MalformedData, desc)
    })
}

pub fn write_json<T: Serialize, P: AsRef<Path>>(
    path: P,
    value: &T,
) -> Result<()> {
    let path = path.as_ref();
    let writer = BufWriter::new(create_file(path)?);
    serde_json::to_writer_pretty(writer, value)
        .res(|| describe("write JSON file", path))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        let err = open_file("/nonexistent/dir/file.png").unwrap_err();
        assert_eq!(err.kind, ResourceMissing);
        assert_eq!(
            &err.description,
            "failed to open file '/nonexistent/dir/file.png'"
        );
    }

    #[test]
    fn test_json_round_trip() {
        let dir = std::env::temp_dir().join("base_fs_test_json");
        create_dir(&dir).unwrap();
        let path = dir.join("values.json");
        write_json(&path, &vec![1.5, 2.5]).unwrap();
        let values: Vec<f64> = read_json(&path).unwrap();
        assert_eq!(values, vec![1.5, 2.5]);
    }
}
