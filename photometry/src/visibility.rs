use std::collections::BTreeSet;

use image::{Rgb, RgbImage};
use log::debug;

use base::defs::{Error, ErrorKind::*, Result};

use crate::bundle::ReconstructionResult;
use crate::camera::{project_point, CameraParameters, Pose};
use crate::codec::decode_index;
use crate::mesh::{Mesh, Shape};
use crate::misc::{window_to_pixel, Matrix4, Point3, ProjectedPoint, Vector2};
use crate::model::{deform, Model};
use crate::render::{MvpMode, RenderContext, RenderMode, RenderParams, Scene};

pub fn find_triangle_indices(image: &RgbImage) -> BTreeSet<usize> {
    image.pixels().filter_map(decode_index).collect()
}

// Posed geometry of the mesh as seen in one photograph.
pub struct View {
    pub shape: Shape,
    pub pose: Pose,
    pub mview: Matrix4,
    pub camera: CameraParameters,
    pub visible: BTreeSet<usize>,
    pub mesh_image: RgbImage, // Index encoded, back faces culled.
}

impl View {
    pub fn prepare(
        context: &mut RenderContext,
        model: &dyn Model,
        mesh: &Mesh,
        params: &ReconstructionResult,
    ) -> Result<View> {
        let shape = deform(
            model,
            mesh,
            &params.model.identity_weights,
            &params.model.expression_weights,
        )?;

        let [width, height] = params.camera.image_size;
        let scene = Scene {
            mesh,
            shape: &shape,
            texture: None,
        };
        let render_params = RenderParams {
            width,
            height,
            mvp_mode: MvpMode::CamPerspective {
                pose: params.model.pose,
                camera: params.camera,
            },
            render_mode: RenderMode::Mesh,
            multi_sampled: false,
        };
        let mesh_image = context.render(&scene, &render_params)?;

        let visible = find_triangle_indices(&mesh_image);
        if visible.is_empty() {
            let desc = "no triangle is visible from the camera".to_string();
            return Err(Error::new(DegenerateGeometry, desc));
        }
        debug!(
            "{} of {} triangles visible",
            visible.len(),
            mesh.faces.len()
        );

        Ok(View {
            shape,
            pose: params.model.pose,
            mview: params.model.pose.view_matrix(),
            camera: params.camera,
            visible,
            mesh_image,
        })
    }

    // Renders the posed mesh at the photograph resolution.
    pub fn render(
        &self,
        context: &mut RenderContext,
        mesh: &Mesh,
        render_mode: RenderMode,
        texture: Option<&RgbImage>,
    ) -> Result<RgbImage> {
        let scene = Scene {
            mesh,
            shape: &self.shape,
            texture,
        };
        let [width, height] = self.camera.image_size;
        let params = RenderParams {
            width,
            height,
            mvp_mode: MvpMode::CamPerspective {
                pose: self.pose,
                camera: self.camera,
            },
            render_mode,
            multi_sampled: render_mode == RenderMode::TexturedMesh,
        };
        context.render(&scene, &params)
    }

    pub fn is_visible(&self, face_idx: usize) -> bool {
        self.visible.contains(&face_idx)
    }

    pub fn project(&self, point: &Point3) -> ProjectedPoint {
        project_point(point, &self.mview, &self.camera)
    }

    // Continuous pixel coordinates, integers at pixel centers.
    pub fn project_to_pixel(&self, point: &Point3) -> Vector2 {
        let projected = self.project(point);
        window_to_pixel(projected.point, self.camera.image_size[1])
    }

    // Marks visible triangle corners white and landmarks red.
    pub fn draw_overlay(&self, mesh: &Mesh, landmarks: &[Vector2]) -> RgbImage {
        let mut image = self.mesh_image.clone();
        let mut plot = |p: Vector2, color: Rgb<u8>| {
            let (x, y) = (p[0].round(), p[1].round());
            if x >= 0.0
                && y >= 0.0
                && x < image.width() as f64
                && y < image.height() as f64
            {
                image.put_pixel(x as u32, y as u32, color);
            }
        };

        for &face_idx in self.visible.iter() {
            for p in mesh.face_points(&self.shape, face_idx).iter() {
                plot(self.project_to_pixel(p), Rgb([255, 255, 255]));
            }
        }
        for &p in landmarks {
            plot(p, Rgb([255, 0, 0]));
        }

        image
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use base::assert_eq_f64;

    use crate::bundle::ModelParameters;
    use crate::codec::encode_index;
    use crate::mesh::test_meshes::quad;
    use crate::model::TemplateModel;

    fn params(rotation: [f64; 3]) -> ReconstructionResult {
        ReconstructionResult {
            camera: CameraParameters::new(100.0, [32.0, 32.0], [64, 64]),
            model: ModelParameters {
                pose: Pose {
                    rotation,
                    translation: [0.0, 0.0, -4.0],
                },
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_find_triangle_indices() {
        let mut image = RgbImage::new(3, 2);
        image.put_pixel(0, 0, encode_index(5).unwrap());
        image.put_pixel(2, 0, encode_index(0).unwrap());
        image.put_pixel(1, 1, encode_index(5).unwrap());
        let indices: Vec<usize> =
            find_triangle_indices(&image).into_iter().collect();
        assert_eq!(indices, vec![0, 5]);
    }

    #[test]
    fn test_prepare_view_is_idempotent() {
        let mesh = quad();
        let model = TemplateModel::new(&mesh);
        let mut context = RenderContext::new();
        let params = params([0.0; 3]);

        let mut prepare = || {
            View::prepare(&mut context, &model, &mesh, &params).unwrap()
        };
        let view1 = prepare();
        let view2 = prepare();
        assert_eq!(view1.visible, view2.visible);
        assert_eq!(view1.mesh_image, view2.mesh_image);
        let image = view1
            .render(&mut context, &mesh, RenderMode::Mesh, None)
            .unwrap();
        assert_eq!(image, view1.mesh_image);
        assert!(view1.is_visible(0) && view1.is_visible(1));
    }

    #[test]
    fn test_prepare_view_facing_away() {
        let mesh = quad();
        let model = TemplateModel::new(&mesh);
        let mut context = RenderContext::new();
        let params = params([std::f64::consts::PI, 0.0, 0.0]);

        let res = View::prepare(&mut context, &model, &mesh, &params);
        let err = res.err().unwrap();
        assert_eq!(err.kind, DegenerateGeometry);
        assert!(err.is_per_view());
    }

    #[test]
    fn test_project_to_pixel() {
        let mesh = quad();
        let model = TemplateModel::new(&mesh);
        let mut context = RenderContext::new();
        let view =
            View::prepare(&mut context, &model, &mesh, &params([0.0; 3]))
                .unwrap();

        // The quad corner (1, 1) lands 25 pixels right and up of center.
        let p = view.project_to_pixel(&Point3::new(1.0, 1.0, 0.0));
        assert_eq_f64!(p[0], 32.0 + 25.0 - 0.5);
        assert_eq_f64!(p[1], 32.0 - 25.0 - 0.5);
    }

    #[test]
    fn test_draw_overlay() {
        let mesh = quad();
        let model = TemplateModel::new(&mesh);
        let mut context = RenderContext::new();
        let view =
            View::prepare(&mut context, &model, &mesh, &params([0.0; 3]))
                .unwrap();

        let landmarks = [Vector2::new(3.0, 60.0), Vector2::new(-5.0, 2.0)];
        let overlay = view.draw_overlay(&mesh, &landmarks);
        assert_eq!(overlay.get_pixel(3, 60).0, [255, 0, 0]);

        let corner = view.project_to_pixel(&Point3::new(-1.0, -1.0, 0.0));
        let (x, y) = (corner[0].round() as u32, corner[1].round() as u32);
        assert_eq!(overlay.get_pixel(x, y).0, [255, 255, 255]);
    }
}
