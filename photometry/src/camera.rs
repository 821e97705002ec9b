use nalgebra::Rotation3;
use serde::{Deserialize, Serialize};

use crate::misc::{
    Matrix4, Point3, ProjectedPoint, Vector2, Vector3, Vector4,
};

fn default_near() -> f64 {
    0.1
}

fn default_far() -> f64 {
    1E4
}

// Pinhole camera looking down the -Z axis of the eye space.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct CameraParameters {
    pub focal_length: f64,
    pub principal_point: [f64; 2], // Window coordinates, Y axis up.
    pub image_size: [u32; 2],
    #[serde(default = "default_near")]
    pub near: f64,
    #[serde(default = "default_far")]
    pub far: f64,
}

impl CameraParameters {
    pub fn new(
        focal_length: f64,
        principal_point: [f64; 2],
        image_size: [u32; 2],
    ) -> CameraParameters {
        CameraParameters {
            focal_length,
            principal_point,
            image_size,
            near: default_near(),
            far: default_far(),
        }
    }

    // OpenGL-style projection reproducing the camera intrinsics, so that
    // window x = cx + f * X / -Z and window y = cy + f * Y / -Z.
    pub fn projection_matrix(&self) -> Matrix4 {
        let (w, h) = (self.image_size[0] as f64, self.image_size[1] as f64);
        let [cx, cy] = self.principal_point;
        let f = self.focal_length;
        let (n, fr) = (self.near, self.far);
        Matrix4::new(
            2.0 * f / w,
            0.0,
            1.0 - 2.0 * cx / w,
            0.0,
            0.0,
            2.0 * f / h,
            1.0 - 2.0 * cy / h,
            0.0,
            0.0,
            0.0,
            -(fr + n) / (fr - n),
            -2.0 * fr * n / (fr - n),
            0.0,
            0.0,
            -1.0,
            0.0,
        )
    }
}

// Rigid transformation of the mesh into the camera eye space.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Pose {
    pub rotation: [f64; 3], // Euler angles, applied in Y-X-Z order.
    pub translation: [f64; 3],
}

impl Pose {
    pub fn rotation_matrix(&self) -> Matrix4 {
        let [y, x, z] = self.rotation;
        let rot = Rotation3::from_axis_angle(&Vector3::y_axis(), y)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), x)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), z);
        rot.to_homogeneous()
    }

    // Rotation first, then translation.
    pub fn view_matrix(&self) -> Matrix4 {
        let t = Vector3::from(self.translation);
        Matrix4::new_translation(&t) * self.rotation_matrix()
    }
}

// Maps clip space coordinates into window coordinates and depth.
pub fn clip_to_window(
    clip: Vector4,
    width: u32,
    height: u32,
) -> ProjectedPoint {
    let ndc = clip.xyz() / clip[3];
    ProjectedPoint {
        point: Vector2::new(
            (ndc[0] + 1.0) / 2.0 * width as f64,
            (ndc[1] + 1.0) / 2.0 * height as f64,
        ),
        depth: (ndc[2] + 1.0) / 2.0,
    }
}

pub fn project_point(
    point: &Point3,
    mview: &Matrix4,
    camera: &CameraParameters,
) -> ProjectedPoint {
    let clip = camera.projection_matrix() * mview * point.to_homogeneous();
    let [w, h] = camera.image_size;
    clip_to_window(clip, w, h)
}
