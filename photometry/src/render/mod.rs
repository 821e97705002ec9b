// Offscreen mesh rasterizer.
//
// A `RenderContext` owns the sample buffers and is reused for every render
// of a batch run. Renders need exclusive access to it, so they can never
// overlap.

mod raster;

use image::RgbImage;
use log::debug;

use base::defs::{Error, ErrorKind::*, Result};

use crate::camera::{CameraParameters, Pose};
use crate::mesh::{Mesh, Shape};
use crate::misc::Vector3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MvpMode {
    // Rasterizes the texture layout of the mesh over the whole viewport.
    OrthoNormal,
    // Matches the pose and intrinsics of a photograph.
    CamPerspective {
        pose: Pose,
        camera: CameraParameters,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RenderMode {
    // Triangle index in colour (see `codec`).
    Texture,
    // Interpolated unit normal, mapped from [-1, 1] to [0, 255].
    Normal,
    // Triangle index in colour with back-face culling.
    Mesh,
    // Bound texture sampled at interpolated texture coordinates.
    TexturedMesh,
}

impl RenderMode {
    fn encodes_index(&self) -> bool {
        matches!(self, RenderMode::Texture | RenderMode::Mesh)
    }
}

pub struct Scene<'a> {
    pub mesh: &'a Mesh,
    pub shape: &'a Shape,
    pub texture: Option<&'a RgbImage>,
}

#[derive(Clone, Copy, Debug)]
pub struct RenderParams {
    pub width: u32,
    pub height: u32,
    pub mvp_mode: MvpMode,
    pub render_mode: RenderMode,
    pub multi_sampled: bool,
}

#[derive(Clone, Copy)]
struct Sample {
    color: Vector3,
    depth: f64,
    covered: bool,
}

impl Sample {
    fn empty() -> Sample {
        Sample {
            color: Vector3::zeros(),
            depth: 1.0,
            covered: false,
        }
    }
}

// Rotated grid pattern, offsets from the top left pixel corner.
const SINGLE_SAMPLE_OFFSETS: [[f64; 2]; 1] = [[0.5, 0.5]];
const MULTI_SAMPLE_OFFSETS: [[f64; 2]; 4] =
    [[0.375, 0.125], [0.875, 0.375], [0.125, 0.625], [0.625, 0.875]];

pub struct RenderContext {
    samples: Vec<Sample>,
    num_renders: usize,
}

impl RenderContext {
    pub fn new() -> RenderContext {
        debug!("render context acquired");
        RenderContext {
            samples: vec![],
            num_renders: 0,
        }
    }

    pub fn render(
        &mut self,
        scene: &Scene,
        params: &RenderParams,
    ) -> Result<RgbImage> {
        Ok(self.render_with_depth(scene, params)?.0)
    }

    pub fn render_with_depth(
        &mut self,
        scene: &Scene,
        params: &RenderParams,
    ) -> Result<(RgbImage, Vec<f32>)> {
        if params.width == 0 || params.height == 0 {
            let desc = format!(
                "bad render target size {}x{}",
                params.width, params.height
            );
            return Err(Error::new(BadOperation, desc));
        }
        if params.render_mode == RenderMode::TexturedMesh
            && scene.texture.is_none()
        {
            let desc = "textured mesh rendering without texture".to_string();
            return Err(Error::new(BadOperation, desc));
        }

        // Index encodings cannot be blended.
        let offsets: &[[f64; 2]] =
            if params.multi_sampled && !params.render_mode.encodes_index() {
                &MULTI_SAMPLE_OFFSETS
            } else {
                &SINGLE_SAMPLE_OFFSETS
            };

        let num_samples =
            params.width as usize * params.height as usize * offsets.len();
        self.samples.clear();
        self.samples.resize(num_samples, Sample::empty());

        let mut target = raster::Target {
            width: params.width,
            height: params.height,
            offsets,
            samples: &mut self.samples,
        };
        raster::draw(scene, params, &mut target)?;
        self.num_renders += 1;

        debug!(
            "rendered {:?} {}x{} with {} samples per pixel",
            params.render_mode,
            params.width,
            params.height,
            offsets.len()
        );

        Ok(self.resolve(params.width, params.height, offsets.len()))
    }

    fn resolve(
        &self,
        width: u32,
        height: u32,
        num_offsets: usize,
    ) -> (RgbImage, Vec<f32>) {
        let mut image = RgbImage::new(width, height);
        let mut depth = vec![1.0; (width * height) as usize];

        for (i, pixel) in self.samples.chunks(num_offsets).enumerate() {
            let (x, y) = (i as u32 % width, i as u32 / width);
            let color = pixel
                .iter()
                .filter(|s| s.covered)
                .map(|s| s.color)
                .sum::<Vector3>()
                / num_offsets as f64;
            crate::misc::set_pixel_as_vector3(x, y, color, &mut image);
            depth[i] = pixel
                .iter()
                .map(|s| s.depth as f32)
                .fold(1.0, f32::min);
        }

        (image, depth)
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        debug!("render context released after {} renders", self.num_renders);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::codec::decode_index;
    use crate::mesh::test_meshes::quad;
    use crate::misc::{get_pixel_as_vector3, is_background};

    fn perspective(width: u32, height: u32) -> MvpMode {
        MvpMode::CamPerspective {
            pose: Pose {
                rotation: [0.0; 3],
                translation: [0.0, 0.0, -4.0],
            },
            camera: CameraParameters::new(
                100.0,
                [width as f64 / 2.0, height as f64 / 2.0],
                [width, height],
            ),
        }
    }

    fn params(mvp_mode: MvpMode, render_mode: RenderMode) -> RenderParams {
        RenderParams {
            width: 64,
            height: 64,
            mvp_mode,
            render_mode,
            multi_sampled: false,
        }
    }

    #[test]
    fn test_render_bad_size() {
        let mesh = quad();
        let shape = mesh.template_shape();
        let scene = Scene {
            mesh: &mesh,
            shape: &shape,
            texture: None,
        };
        let mut p = params(MvpMode::OrthoNormal, RenderMode::Texture);
        p.width = 0;
        let err = RenderContext::new().render(&scene, &p).unwrap_err();
        assert_eq!(err.kind, BadOperation);
    }

    #[test]
    fn test_render_textured_without_texture() {
        let mesh = quad();
        let shape = mesh.template_shape();
        let scene = Scene {
            mesh: &mesh,
            shape: &shape,
            texture: None,
        };
        let p = params(MvpMode::OrthoNormal, RenderMode::TexturedMesh);
        let err = RenderContext::new().render(&scene, &p).unwrap_err();
        assert_eq!(err.kind, BadOperation);
        assert_eq!(
            &err.description,
            "textured mesh rendering without texture"
        );
    }

    #[test]
    fn test_render_ortho_covers_full_atlas() {
        let mesh = quad();
        let shape = mesh.template_shape();
        let scene = Scene {
            mesh: &mesh,
            shape: &shape,
            texture: None,
        };
        let p = params(MvpMode::OrthoNormal, RenderMode::Texture);
        let image = RenderContext::new().render(&scene, &p).unwrap();
        for pixel in image.pixels() {
            let face = decode_index(pixel).unwrap();
            assert!(face < 2);
        }
    }

    #[test]
    fn test_render_mesh_culls_back_faces() {
        let mesh = quad();
        let shape = mesh.template_shape();
        let scene = Scene {
            mesh: &mesh,
            shape: &shape,
            texture: None,
        };
        let mut context = RenderContext::new();

        let p = params(perspective(64, 64), RenderMode::Mesh);
        let image = context.render(&scene, &p).unwrap();
        assert!(!is_background(image.get_pixel(32, 32)));
        assert!(is_background(image.get_pixel(0, 0)));

        // Turned around the quad shows its back side only.
        let p = params(
            MvpMode::CamPerspective {
                pose: Pose {
                    rotation: [std::f64::consts::PI, 0.0, 0.0],
                    translation: [0.0, 0.0, -4.0],
                },
                camera: CameraParameters::new(100.0, [32.0, 32.0], [64, 64]),
            },
            RenderMode::Mesh,
        );
        let image = context.render(&scene, &p).unwrap();
        assert!(image.pixels().all(is_background));
    }

    #[test]
    fn test_render_normals_face_camera() {
        let mesh = quad();
        let shape = mesh.template_shape();
        let scene = Scene {
            mesh: &mesh,
            shape: &shape,
            texture: None,
        };
        let p = params(perspective(64, 64), RenderMode::Normal);
        let (image, depth) =
            RenderContext::new().render_with_depth(&scene, &p).unwrap();

        let n = get_pixel_as_vector3(32, 32, &image) / 255.0 * 2.0
            - Vector3::new(1.0, 1.0, 1.0);
        assert!((n - Vector3::new(0.0, 0.0, 1.0)).norm() < 0.01);
        assert!(depth[32 * 64 + 32] < 1.0);
        assert_eq!(depth[0], 1.0);
    }

    #[test]
    fn test_render_textured_multi_sampled() {
        let mesh = quad();
        let shape = mesh.template_shape();
        let texture = RgbImage::from_pixel(8, 8, image::Rgb([200, 100, 50]));
        let scene = Scene {
            mesh: &mesh,
            shape: &shape,
            texture: Some(&texture),
        };
        let mut p = params(perspective(64, 64), RenderMode::TexturedMesh);
        p.multi_sampled = true;
        let image = RenderContext::new().render(&scene, &p).unwrap();
        assert_eq!(image.get_pixel(32, 32).0, [200, 100, 50]);
        assert!(is_background(image.get_pixel(1, 1)));
    }
}
