use std::ffi::OsString;
use std::path::{Path, PathBuf};

use image::RgbImage;
use log::info;
use serde::{Deserialize, Serialize};

use base::defs::{Error, ErrorKind::*, Result};
use base::util::fs;

use crate::camera::{CameraParameters, Pose};
use crate::misc::{load_image, Vector2};

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ModelParameters {
    #[serde(flatten)]
    pub pose: Pose,
    #[serde(default)]
    pub identity_weights: Vec<f64>,
    #[serde(default)]
    pub expression_weights: Vec<f64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ReconstructionResult {
    pub camera: CameraParameters,
    pub model: ModelParameters,
}

// Photograph with its landmarks (pixel coordinates, Y axis down) and the
// reconstruction result fitted to it.
pub struct ImageBundle {
    pub name: String,
    pub image: RgbImage,
    pub points: Vec<Vector2>,
    pub params: ReconstructionResult,
}

impl ImageBundle {
    pub fn load<P: AsRef<Path>>(
        image_path: P,
        points_path: P,
    ) -> Result<ImageBundle> {
        let image_path = image_path.as_ref();
        let image = load_image(image_path)?;
        let points = parse_points(&fs::read_lines(points_path)?)?;
        let params: ReconstructionResult =
            fs::read_json(result_path(image_path))?;

        let [w, h] = params.camera.image_size;
        if image.dimensions() != (w, h) {
            let desc = format!(
                "image '{}' is {}x{} while its camera expects {}x{}",
                image_path.display(),
                image.width(),
                image.height(),
                w,
                h
            );
            return Err(Error::new(MalformedData, desc));
        }

        let name = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(
            "  loaded image '{}' with {} landmarks",
            image_path.display(),
            points.len()
        );

        Ok(ImageBundle {
            name,
            image,
            points,
            params,
        })
    }
}

// The reconstruction result sits next to its image: `<image path>.res`.
pub fn result_path(image_path: &Path) -> PathBuf {
    let mut path = OsString::from(image_path.as_os_str());
    path.push(".res");
    PathBuf::from(path)
}

// Pairs of image and points file paths, relative to `base_dir`.
pub fn parse_settings(
    lines: &[String],
    base_dir: &Path,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut pairs = vec![];
    for (i, line) in lines.iter().enumerate() {
        let line = line.split('#').next().unwrap_or_default();
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[..] {
            [] => (),
            [image, points] => {
                pairs.push((base_dir.join(image), base_dir.join(points)))
            }
            _ => {
                let desc = format!("malformed settings line {}", i + 1);
                return Err(Error::new(MalformedData, desc));
            }
        }
    }
    Ok(pairs)
}

pub fn parse_points(lines: &[String]) -> Result<Vec<Vector2>> {
    let mut expected = None;
    let mut points = vec![];

    for (i, line) in lines.iter().enumerate() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let malformed = || {
            let desc = format!("malformed point at line {}", i + 1);
            Err(Error::new(MalformedData, desc))
        };
        match parts[..] {
            [] => (),
            [count] if i == 0 => match count.parse::<usize>() {
                Ok(count) => expected = Some(count),
                Err(_) => return malformed(),
            },
            [x, y] => match (x.parse::<f64>(), y.parse::<f64>()) {
                (Ok(x), Ok(y)) => points.push(Vector2::new(x, y)),
                _ => return malformed(),
            },
            _ => return malformed(),
        }
    }

    match expected {
        Some(count) if count != points.len() => {
            let desc = format!(
                "points file declares {} points but has {}",
                count,
                points.len()
            );
            Err(Error::new(MalformedData, desc))
        }
        _ => Ok(points),
    }
}

pub fn load_bundles<P: AsRef<Path>>(
    settings_path: P,
) -> Result<Vec<ImageBundle>> {
    let settings_path = settings_path.as_ref();
    let base_dir = settings_path.parent().unwrap_or_else(|| Path::new(""));
    let pairs = parse_settings(&fs::read_lines(settings_path)?, base_dir)?;

    info!(
        "Loading {} image bundles from '{}'...",
        pairs.len(),
        settings_path.display()
    );
    pairs
        .iter()
        .map(|(image_path, points_path)| {
            ImageBundle::load(image_path, points_path)
        })
        .collect()
}
