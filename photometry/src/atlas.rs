// Correspondence between texture atlas texels and mesh surface points.

use std::path::Path;

use image::RgbImage;
use log::info;
use rayon::prelude::*;

use base::defs::{Error, ErrorKind::*, Result};

use crate::codec::decode_index;
use crate::mesh::Mesh;
use crate::misc::{
    load_image, set_pixel_as_vector3, texel_center_uv, Vector2, Vector3,
};
use crate::render::{MvpMode, RenderContext, RenderMode, RenderParams, Scene};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelInfo {
    pub face: usize,
    pub bary: Vector3,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PixelMap {
    pub width: u32,
    pub height: u32,
    entries: Vec<Option<PixelInfo>>, // Row-major, image row 0 on top.
}

impl PixelMap {
    pub fn build(
        context: &mut RenderContext,
        mesh: &Mesh,
        width: u32,
        height: u32,
    ) -> Result<(PixelMap, RgbImage)> {
        let index_image = render_index_image(context, mesh, width, height)?;
        let map = PixelMap::from_index_image(mesh, &index_image)?;
        Ok((map, index_image))
    }

    // Reuses a previously saved index image of the expected atlas size.
    pub fn load<P: AsRef<Path>>(
        mesh: &Mesh,
        path: P,
        width: u32,
        height: u32,
    ) -> Result<(PixelMap, RgbImage)> {
        let path = path.as_ref();
        let index_image = load_image(path)?;
        if index_image.dimensions() != (width, height) {
            let desc = format!(
                "atlas index image '{}' is {}x{} instead of {}x{}",
                path.display(),
                index_image.width(),
                index_image.height(),
                width,
                height
            );
            return Err(Error::new(MalformedData, desc));
        }
        let map = PixelMap::from_index_image(mesh, &index_image)?;
        info!("  loaded atlas index image '{}'", path.display());
        Ok((map, index_image))
    }

    pub fn from_index_image(
        mesh: &Mesh,
        index_image: &RgbImage,
    ) -> Result<PixelMap> {
        let (width, height) = index_image.dimensions();
        let mut entries = vec![None; (width * height) as usize];

        entries
            .par_chunks_mut(width as usize)
            .enumerate()
            .try_for_each(|(y, row)| {
                for (x, entry) in row.iter_mut().enumerate() {
                    let (x, y) = (x as u32, y as u32);
                    let face = match decode_index(index_image.get_pixel(x, y))
                    {
                        Some(face) => face,
                        None => continue,
                    };
                    if face >= mesh.faces.len() {
                        let desc = format!(
                            "atlas texel ({}, {}) refers to missing face {}",
                            x, y, face
                        );
                        return Err(Error::new(MalformedData, desc));
                    }

                    let uv = texel_center_uv(x, y, width, height);
                    *entry = barycentric(&mesh.face_uvs(face), &uv)
                        .map(|bary| PixelInfo { face, bary });
                }
                Ok(())
            })?;

        let map = PixelMap {
            width,
            height,
            entries,
        };
        info!(
            "  mapped {} of {} atlas texels onto the mesh",
            map.num_mapped(),
            width * height
        );
        Ok(map)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<&PixelInfo> {
        self.entries[(y * self.width + x) as usize].as_ref()
    }

    pub fn row(&self, y: u32) -> &[Option<PixelInfo>] {
        let begin = (y * self.width) as usize;
        &self.entries[begin..begin + self.width as usize]
    }

    pub fn num_mapped(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    // Barycentric coordinates scaled to [0, 255] in the colour channels.
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut image = RgbImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                if let Some(info) = self.get(x, y) {
                    set_pixel_as_vector3(x, y, info.bary * 255.0, &mut image);
                }
            }
        }
        image
    }
}

pub fn render_index_image(
    context: &mut RenderContext,
    mesh: &Mesh,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    let shape = mesh.template_shape();
    let scene = Scene {
        mesh,
        shape: &shape,
        texture: None,
    };
    let params = RenderParams {
        width,
        height,
        mvp_mode: MvpMode::OrthoNormal,
        render_mode: RenderMode::Texture,
        multi_sampled: false,
    };
    context.render(&scene, &params)
}

// Signed area formulation, None for degenerate triangles.
pub fn barycentric(
    triangle: &[Vector2; 3],
    point: &Vector2,
) -> Option<Vector3> {
    let [a, b, c] = triangle;
    let area = (b - a).perp(&(c - a));
    if area.abs() < 1E-15 {
        return None;
    }
    Some(Vector3::new(
        (c - b).perp(&(point - b)) / area,
        (a - c).perp(&(point - c)) / area,
        (b - a).perp(&(point - a)) / area,
    ))
}
