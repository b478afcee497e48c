use std::fs;
use std::io::Read;
use std::ops::Range;

use camino::Utf8Path;
use serde::Deserialize;
use zip::ZipArchive;

use crate::error::ExpdataError;

#[derive(Debug, Deserialize)]
struct RawSignal {
    fs: f64,
    #[serde(default)]
    shape: Option<Vec<usize>>,
    data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArraySignal {
    fs: f64,
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl ArraySignal {
    pub fn new(fs: f64, shape: Vec<usize>, data: Vec<f64>) -> Result<Self, ExpdataError> {
        if fs <= 0.0 {
            return Err(ExpdataError::InvalidSignal(format!(
                "sampling rate must be positive, got {fs}"
            )));
        }
        if shape.is_empty() {
            return Err(ExpdataError::InvalidSignal(
                "shape must have at least one dimension".to_string(),
            ));
        }
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ExpdataError::InvalidSignal(format!(
                "shape {shape:?} does not cover {} samples",
                data.len()
            )));
        }
        Ok(Self { fs, shape, data })
    }

    pub fn from_samples(fs: f64, data: Vec<f64>) -> Result<Self, ExpdataError> {
        let shape = vec![data.len()];
        Self::new(fs, shape, data)
    }

    pub fn from_archive_member(archive: &Utf8Path, name: &str) -> Result<Self, ExpdataError> {
        let member = format!("{name}.json");
        let file = fs::File::open(archive.as_std_path()).map_err(|err| {
            ExpdataError::Filesystem(format!("open archive {archive}: {err}"))
        })?;
        let mut bundle =
            ZipArchive::new(file).map_err(|err| ExpdataError::Archive(err.to_string()))?;
        let mut bytes = Vec::new();
        {
            let mut entry = bundle
                .by_name(&member)
                .map_err(|err| ExpdataError::Archive(err.to_string()))?;
            entry
                .read_to_end(&mut bytes)
                .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
        }
        let raw: RawSignal =
            serde_json::from_slice(&bytes).map_err(|err| ExpdataError::MemberDecode {
                member: member.clone(),
                reason: err.to_string(),
            })?;
        let shape = raw.shape.unwrap_or_else(|| vec![raw.data.len()]);
        Self::new(raw.fs, shape, raw.data)
    }

    pub fn fs(&self) -> f64 {
        self.fs
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration(&self) -> f64 {
        let samples = self.shape.last().copied().unwrap_or(0);
        samples as f64 / self.fs
    }

    pub fn samples(&self) -> &[f64] {
        &self.data
    }

    pub fn slice(&self, range: Range<usize>) -> Option<&[f64]> {
        self.data.get(range)
    }

    pub fn channel(&self, at: usize) -> Option<&[f64]> {
        let chunk = self.shape.last().copied()?;
        if chunk == 0 {
            return None;
        }
        let start = at.checked_mul(chunk)?;
        self.data.get(start..start + chunk)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn duration_follows_last_dimension() {
        let signal = ArraySignal::new(100.0, vec![2, 50], vec![0.0; 100]).unwrap();
        assert_eq!(signal.duration(), 0.5);
        assert_eq!(signal.shape(), &[2, 50]);
    }

    #[test]
    fn slicing_is_bounds_checked() {
        let signal = ArraySignal::from_samples(10.0, vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(signal.slice(1..3), Some(&[2.0, 3.0][..]));
        assert_eq!(signal.slice(2..5), None);
    }

    #[test]
    fn channel_views_split_on_last_dimension() {
        let signal = ArraySignal::new(10.0, vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(signal.channel(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(signal.channel(2), None);
    }

    #[test]
    fn mismatched_shape_fails() {
        let err = ArraySignal::new(10.0, vec![4], vec![1.0, 2.0]).unwrap_err();
        assert_matches!(err, ExpdataError::InvalidSignal(_));
    }
}
