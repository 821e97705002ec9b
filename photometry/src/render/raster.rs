use image::RgbImage;

use base::defs::Result;

use super::{MvpMode, RenderMode, RenderParams, Sample, Scene};
use crate::codec::encode_index;
use crate::misc::{sample_bilinear, uv_to_pixel, Matrix4, Vector2, Vector3};

pub(super) struct Target<'a> {
    pub(super) width: u32,
    pub(super) height: u32,
    pub(super) offsets: &'a [[f64; 2]],
    pub(super) samples: &'a mut [Sample],
}

struct Vertex {
    point: Vector2, // Window coordinates.
    depth: f64,
    inv_w: f64,
    attr: Vector3,
}

enum Shading<'a> {
    Flat(Vector3),
    Normal(Vector3), // Fallback for degenerate interpolated normals.
    Texture(&'a RgbImage),
}

struct Transform {
    mvp: Matrix4,
    normal: Matrix4,
}

pub(super) fn draw(
    scene: &Scene,
    params: &RenderParams,
    target: &mut Target,
) -> Result<()> {
    let transform = match params.mvp_mode {
        MvpMode::OrthoNormal => None,
        MvpMode::CamPerspective { pose, camera } => Some(Transform {
            mvp: camera.projection_matrix() * pose.view_matrix(),
            normal: pose.rotation_matrix(),
        }),
    };

    for face_idx in 0..scene.mesh.faces.len() {
        let vertices = match project_face(scene, params, &transform, face_idx)
        {
            Some(vertices) => vertices,
            None => continue,
        };

        let [a, b, c] = [&vertices[0], &vertices[1], &vertices[2]];
        let area = orient(&a.point, &b.point, &c.point);
        // Clockwise triangles face away from the camera.
        let culled = params.render_mode == RenderMode::Mesh && area < 0.0;
        if area == 0.0 || culled {
            continue;
        }

        let shading = match params.render_mode {
            RenderMode::Texture | RenderMode::Mesh => {
                let [r, g, b] = encode_index(face_idx)?.0;
                Shading::Flat(Vector3::new(r as f64, g as f64, b as f64))
            }
            RenderMode::Normal => {
                let [p0, p1, p2] =
                    scene.mesh.face_points(scene.shape, face_idx);
                let n = (p1 - p0).cross(&(p2 - p0));
                Shading::Normal(rotate_normal(&transform, n))
            }
            RenderMode::TexturedMesh => match scene.texture {
                Some(texture) => Shading::Texture(texture),
                None => continue,
            },
        };

        fill_triangle(&vertices, area, &shading, target);
    }

    Ok(())
}

fn project_face(
    scene: &Scene,
    params: &RenderParams,
    transform: &Option<Transform>,
    face_idx: usize,
) -> Option<[Vertex; 3]> {
    let face = scene.mesh.faces[face_idx];
    let uvs = scene.mesh.face_uvs(face_idx);
    let (width, height) = (params.width, params.height);

    let mut vertices = vec![];
    for k in 0..3 {
        let attr = match params.render_mode {
            RenderMode::Normal => {
                rotate_normal(transform, scene.shape.normals[face[k]])
            }
            _ => Vector3::new(uvs[k][0], uvs[k][1], 0.0),
        };

        let vertex = match transform {
            None => Vertex {
                point: Vector2::new(
                    uvs[k][0] * width as f64,
                    uvs[k][1] * height as f64,
                ),
                depth: 0.0,
                inv_w: 1.0,
                attr,
            },
            Some(t) => {
                let p = scene.shape.vertices[face[k]].to_homogeneous();
                let clip = t.mvp * p;
                // Triangles reaching behind the eye are dropped whole.
                if clip[3] <= 0.0 {
                    return None;
                }
                let projected =
                    crate::camera::clip_to_window(clip, width, height);
                Vertex {
                    point: projected.point,
                    depth: projected.depth,
                    inv_w: 1.0 / clip[3],
                    attr,
                }
            }
        };
        vertices.push(vertex);
    }

    let mut iter = vertices.into_iter();
    Some([iter.next()?, iter.next()?, iter.next()?])
}

fn rotate_normal(transform: &Option<Transform>, n: Vector3) -> Vector3 {
    let n = match transform {
        None => n,
        Some(t) => (t.normal * n.to_homogeneous()).xyz(),
    };
    let norm = n.norm();
    if norm > 1E-12 {
        n / norm
    } else {
        n
    }
}

// Twice the signed area, positive for counter-clockwise triangles.
fn orient(a: &Vector2, b: &Vector2, c: &Vector2) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn pixel_range(min: f64, max: f64, len: u32) -> Option<(u32, u32)> {
    let first = (min.floor() as i64).max(0);
    let last = (max.ceil() as i64).min(len as i64 - 1);
    if first > last {
        None
    } else {
        Some((first as u32, last as u32))
    }
}

fn fill_triangle(
    vertices: &[Vertex; 3],
    area: f64,
    shading: &Shading,
    target: &mut Target,
) {
    let (width, height) = (target.width, target.height);
    let xs = vertices.iter().map(|v| v.point[0]);
    let ys = vertices.iter().map(|v| v.point[1]);
    let (min_x, max_x) = xs.fold((f64::MAX, f64::MIN), |(lo, hi), x| {
        (lo.min(x), hi.max(x))
    });
    let (min_y, max_y) = ys.fold((f64::MAX, f64::MIN), |(lo, hi), y| {
        (lo.min(y), hi.max(y))
    });

    let cols = pixel_range(min_x - 1.0, max_x, width);
    let h = height as f64;
    let rows = pixel_range(h - max_y - 1.0, h - min_y, height);
    let ((x0, x1), (y0, y1)) = match (cols, rows) {
        (Some(cols), Some(rows)) => (cols, rows),
        _ => return,
    };

    let num_offsets = target.offsets.len();
    for y in y0..=y1 {
        for x in x0..=x1 {
            for (k, offset) in target.offsets.iter().enumerate() {
                let p = Vector2::new(
                    x as f64 + offset[0],
                    height as f64 - (y as f64 + offset[1]),
                );
                let bary = Vector3::new(
                    orient(&vertices[1].point, &vertices[2].point, &p),
                    orient(&vertices[2].point, &vertices[0].point, &p),
                    orient(&vertices[0].point, &vertices[1].point, &p),
                ) / area;
                if bary.iter().any(|&b| b < 0.0) {
                    continue;
                }

                let depth = bary[0] * vertices[0].depth
                    + bary[1] * vertices[1].depth
                    + bary[2] * vertices[2].depth;
                let pixel_idx = y as usize * width as usize + x as usize;
                let sample_idx = pixel_idx * num_offsets + k;
                let sample = &mut target.samples[sample_idx];
                if depth < 0.0 || depth >= sample.depth {
                    continue;
                }

                sample.color = shade(vertices, bary, shading);
                sample.depth = depth;
                sample.covered = true;
            }
        }
    }
}

fn shade(
    vertices: &[Vertex; 3],
    bary: Vector3,
    shading: &Shading,
) -> Vector3 {
    let attr = || {
        let weights = Vector3::new(
            bary[0] * vertices[0].inv_w,
            bary[1] * vertices[1].inv_w,
            bary[2] * vertices[2].inv_w,
        );
        let weights = weights / weights.sum();
        weights[0] * vertices[0].attr
            + weights[1] * vertices[1].attr
            + weights[2] * vertices[2].attr
    };

    match shading {
        Shading::Flat(color) => *color,
        Shading::Normal(face_normal) => {
            let n = attr();
            let norm = n.norm();
            let n = if norm > 1E-6 { n / norm } else { *face_normal };
            (n + Vector3::new(1.0, 1.0, 1.0)) / 2.0 * 255.0
        }
        Shading::Texture(texture) => {
            let (w, h) = texture.dimensions();
            let uv = attr();
            let p = uv_to_pixel(Vector2::new(uv[0], uv[1]), w, h);
            sample_bilinear(texture, p[0], p[1])
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use base::assert_eq_f64;

    #[test]
    fn test_orient() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(2.0, 0.0);
        let c = Vector2::new(0.0, 2.0);
        assert_eq_f64!(orient(&a, &b, &c), 4.0);
        assert_eq_f64!(orient(&a, &c, &b), -4.0);
    }

    #[test]
    fn test_pixel_range() {
        assert_eq!(pixel_range(-3.5, 2.2, 10), Some((0, 3)));
        assert_eq!(pixel_range(8.5, 20.0, 10), Some((8, 9)));
        assert_eq!(pixel_range(11.0, 12.0, 10), None);
    }
}
