// Second order spherical harmonics lighting estimated from normal, albedo
// and observed colour triples of one photograph.

use image::RgbImage;
use log::debug;
use nalgebra::{DMatrix, DVector, SVector};

use base::defs::{Error, ErrorKind::*, Result};

use crate::mesh::Mesh;
use crate::misc::{
    get_pixel_as_vector3, set_pixel_as_vector3, Vector3, VectorImage,
};
use crate::render::{RenderContext, RenderMode};
use crate::visibility::View;

pub const NUM_COEFFS: usize = 9;

pub type LightingCoeffs = SVector<f64, NUM_COEFFS>;

// Albedo vectors must be strictly longer than sqrt(3) * 32 / 255.
const ALBEDO_GATE: f64 = 32.0 / 255.0;
const ALBEDO_GATE_SQUARED: f64 = 3.0 * (ALBEDO_GATE * ALBEDO_GATE);

const RANK_EPS: f64 = 1E-10;
const SOLVE_EPS: f64 = 1E-12;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Constraint {
    pub normal: Vector3,
    pub albedo: Vector3, // In [0, 1].
    pub pixel: Vector3,  // In [0, 1].
}

pub fn render_normal_map(
    context: &mut RenderContext,
    mesh: &Mesh,
    view: &View,
) -> Result<(RgbImage, VectorImage)> {
    let image = view.render(context, mesh, RenderMode::Normal, None)?;
    let normals = decode_normals(&image);
    Ok((image, normals))
}

// Background pixels give zero vectors.
pub fn decode_normals(image: &RgbImage) -> VectorImage {
    VectorImage::from_rgb_image(image, |c| {
        c / 255.0 * 2.0 - Vector3::new(1.0, 1.0, 1.0)
    })
}

pub fn render_albedo_map(
    context: &mut RenderContext,
    mesh: &Mesh,
    view: &View,
    mean_texture: &RgbImage,
) -> Result<(RgbImage, VectorImage)> {
    let image = view.render(
        context,
        mesh,
        RenderMode::TexturedMesh,
        Some(mean_texture),
    )?;
    let albedos = VectorImage::from_rgb_image(&image, |c| c / 255.0);
    Ok((image, albedos))
}

pub fn select_constraints(
    normals: &VectorImage,
    albedos: &VectorImage,
    photo: &RgbImage,
) -> Result<Vec<Constraint>> {
    let dims = (normals.width, normals.height);
    if (albedos.width, albedos.height) != dims || photo.dimensions() != dims
    {
        let desc = format!(
            "mismatching normal map {}x{}, albedo map {}x{} and image {}x{}",
            normals.width,
            normals.height,
            albedos.width,
            albedos.height,
            photo.width(),
            photo.height()
        );
        return Err(Error::new(BadOperation, desc));
    }

    let mut constraints = vec![];
    for y in 0..normals.height {
        for x in 0..normals.width {
            let normal = normals.get(x, y);
            let albedo = albedos.get(x, y);
            if normal == Vector3::zeros()
                || albedo.norm_squared() <= ALBEDO_GATE_SQUARED
            {
                continue;
            }
            constraints.push(Constraint {
                normal,
                albedo,
                pixel: get_pixel_as_vector3(x, y, photo) / 255.0,
            });
        }
    }

    Ok(constraints)
}

pub fn sh_basis(n: &Vector3) -> LightingCoeffs {
    let (nx, ny, nz) = (n[0], n[1], n[2]);
    LightingCoeffs::from([
        1.0,
        nx,
        ny,
        nz,
        nx * ny,
        nx * nz,
        ny * nz,
        nx * nx - ny * ny,
        3.0 * nz * nz - 1.0,
    ])
}

// Least squares fit of the per channel model pixel = albedo * (l . Y(n)).
pub fn solve_lighting(constraints: &[Constraint]) -> Result<LightingCoeffs> {
    let n = constraints.len();
    if n < NUM_COEFFS {
        let desc = format!(
            "only {} lighting constraints while at least {} are required",
            n, NUM_COEFFS
        );
        return Err(Error::new(DegenerateGeometry, desc));
    }

    let mut a = DMatrix::<f64>::zeros(3 * n, NUM_COEFFS);
    let mut b = DVector::<f64>::zeros(3 * n);
    for (j, c) in constraints.iter().enumerate() {
        let basis = sh_basis(&c.normal);
        for channel in 0..3 {
            let row = channel * n + j;
            for k in 0..NUM_COEFFS {
                a[(row, k)] = basis[k] * c.albedo[channel];
            }
            b[row] = c.pixel[channel];
        }
    }

    let svd = a.svd(true, true);
    let max_sv = svd.singular_values.max();
    let rank = svd.rank(max_sv * RANK_EPS);
    if rank < NUM_COEFFS {
        let desc = format!(
            "lighting system of {} constraints has rank {} only",
            n, rank
        );
        return Err(Error::new(DegenerateGeometry, desc));
    }

    let x = svd.solve(&b, SOLVE_EPS).map_err(|err| {
        let desc = format!("failed to solve lighting system ({})", err);
        Error::new(NumericalFailure, desc)
    })?;
    debug!("lighting solved from {} constraints", n);

    Ok(LightingCoeffs::from_iterator(x.iter().cloned()))
}

// Predicted colour albedo * 255 * (l . Y(n)) for every surface pixel.
pub fn reconstruct_shading(
    normals: &VectorImage,
    albedos: &VectorImage,
    coeffs: &LightingCoeffs,
) -> RgbImage {
    let mut image = RgbImage::new(normals.width, normals.height);
    for y in 0..normals.height {
        for x in 0..normals.width {
            let normal = normals.get(x, y);
            if normal == Vector3::zeros() {
                continue;
            }
            let shading = coeffs.dot(&sh_basis(&normal));
            let color = albedos.get(x, y) * 255.0 * shading;
            set_pixel_as_vector3(x, y, color, &mut image);
        }
    }
    image
}
