// Multi-view fusion of photographs into a mean atlas texture.

use derive_more::{Add, AddAssign};
use image::RgbImage;
use rayon::prelude::*;

use base::defs::{Error, ErrorKind::*, Result};

use crate::atlas::PixelMap;
use crate::mesh::Mesh;
use crate::misc::{sample_bilinear, set_pixel_as_vector3, Vector3};
use crate::visibility::View;

#[derive(Add, AddAssign, Clone, Copy, Debug, PartialEq)]
pub struct Texel {
    pub sum: Vector3,
    pub weight: f64, // Number of contributing views.
}

impl Texel {
    pub fn empty() -> Texel {
        Texel {
            sum: Vector3::zeros(),
            weight: 0.0,
        }
    }

    pub fn mean(&self) -> Option<Vector3> {
        if self.weight > 0.0 {
            Some(self.sum / self.weight)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeanTexture {
    pub width: u32,
    pub height: u32,
    texels: Vec<Texel>,
}

impl MeanTexture {
    pub fn new(width: u32, height: u32) -> MeanTexture {
        MeanTexture {
            width,
            height,
            texels: vec![Texel::empty(); (width * height) as usize],
        }
    }

    pub fn texel(&self, x: u32, y: u32) -> Texel {
        self.texels[(y * self.width + x) as usize]
    }

    // Adds one observation per atlas texel whose triangle is visible in the
    // view and whose sample is not background. Returns the number of
    // observations.
    pub fn accumulate(
        &mut self,
        atlas: &PixelMap,
        mesh: &Mesh,
        view: &View,
        photo: &RgbImage,
    ) -> Result<usize> {
        if (atlas.width, atlas.height) != (self.width, self.height) {
            let desc = format!(
                "atlas is {}x{} while mean texture is {}x{}",
                atlas.width, atlas.height, self.width, self.height
            );
            return Err(Error::new(BadOperation, desc));
        }

        let num_samples = self
            .texels
            .par_chunks_mut(self.width as usize)
            .enumerate()
            .map(|(y, row)| {
                let mut num_samples = 0;
                let entries = atlas.row(y as u32);
                for (texel, entry) in row.iter_mut().zip(entries.iter()) {
                    let info = match entry {
                        Some(info) if view.is_visible(info.face) => info,
                        _ => continue,
                    };

                    let p =
                        mesh.interpolate(&view.shape, info.face, info.bary);
                    let pixel = view.project_to_pixel(&p);
                    let color = sample_bilinear(photo, pixel[0], pixel[1]);
                    if color == Vector3::zeros() {
                        continue;
                    }

                    *texel += Texel {
                        sum: color,
                        weight: 1.0,
                    };
                    num_samples += 1;
                }
                num_samples
            })
            .sum::<usize>();

        Ok(num_samples)
    }

    // Folds in an accumulator filled by another worker.
    pub fn merge(&mut self, other: &MeanTexture) -> Result<()> {
        if (other.width, other.height) != (self.width, self.height) {
            let desc = format!(
                "cannot merge {}x{} mean texture into {}x{}",
                other.width, other.height, self.width, self.height
            );
            return Err(Error::new(BadOperation, desc));
        }
        for (texel, other) in self.texels.iter_mut().zip(other.texels.iter()) {
            *texel += *other;
        }
        Ok(())
    }

    pub fn num_observed(&self) -> usize {
        self.texels.iter().filter(|t| t.weight > 0.0).count()
    }

    // Texels without observations stay background.
    pub fn finalize(&self) -> RgbImage {
        let mut image = RgbImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                if let Some(color) = self.texel(x, y).mean() {
                    set_pixel_as_vector3(x, y, color, &mut image);
                }
            }
        }
        image
    }
}
