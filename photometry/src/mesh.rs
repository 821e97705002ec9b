use base::defs::{Error, ErrorKind::*, Result};

use crate::misc::{Point3, Vector2, Vector3};

// Static part of a mesh. The topology and texture layout never change
// after loading, while vertex positions come from a `Shape`.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Point3>, // Template positions.
    pub faces: Vec<[usize; 3]>,
    pub uv_coords: Vec<Vector2>,
    pub uv_faces: Vec<[usize; 3]>, // Parallel to `faces`.
}

// Per-view geometry of a mesh, produced fresh for every image bundle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shape {
    pub vertices: Vec<Point3>,
    pub normals: Vec<Vector3>,
}

impl Mesh {
    pub fn validate(&self) -> Result<()> {
        if self.faces.len() != self.uv_faces.len() {
            let desc = format!(
                "mesh has {} faces but {} texture faces",
                self.faces.len(),
                self.uv_faces.len()
            );
            return Err(Error::new(MalformedData, desc));
        }

        let check = |faces: &[[usize; 3]], len: usize, what: &str| {
            for (face_idx, face) in faces.iter().enumerate() {
                if face.iter().any(|&v| v >= len) {
                    let desc = format!(
                        "face {} refers to missing {} ({} available)",
                        face_idx, what, len
                    );
                    return Err(Error::new(MalformedData, desc));
                }
            }
            Ok(())
        };
        check(&self.faces, self.vertices.len(), "vertex")?;
        check(&self.uv_faces, self.uv_coords.len(), "texture coordinate")
    }

    pub fn template_shape(&self) -> Shape {
        Shape {
            normals: compute_normals(&self.vertices, &self.faces),
            vertices: self.vertices.clone(),
        }
    }

    pub fn shape_from(&self, vertices: Vec<Point3>) -> Result<Shape> {
        if vertices.len() != self.vertices.len() {
            let desc = format!(
                "deformed mesh has {} vertices instead of {}",
                vertices.len(),
                self.vertices.len()
            );
            return Err(Error::new(MalformedData, desc));
        }
        Ok(Shape {
            normals: compute_normals(&vertices, &self.faces),
            vertices,
        })
    }

    pub fn face_uvs(&self, face_idx: usize) -> [Vector2; 3] {
        let [t0, t1, t2] = self.uv_faces[face_idx];
        [self.uv_coords[t0], self.uv_coords[t1], self.uv_coords[t2]]
    }

    pub fn face_points(&self, shape: &Shape, face_idx: usize) -> [Point3; 3] {
        let [v0, v1, v2] = self.faces[face_idx];
        [shape.vertices[v0], shape.vertices[v1], shape.vertices[v2]]
    }

    pub fn interpolate(
        &self,
        shape: &Shape,
        face_idx: usize,
        bary: Vector3,
    ) -> Point3 {
        let [p0, p1, p2] = self.face_points(shape, face_idx);
        Point3::from(
            bary[0] * p0.coords + bary[1] * p1.coords + bary[2] * p2.coords,
        )
    }
}

// Area-weighted vertex normals; isolated vertices get a zero normal.
pub fn compute_normals(
    vertices: &[Point3],
    faces: &[[usize; 3]],
) -> Vec<Vector3> {
    let mut normals = vec![Vector3::zeros(); vertices.len()];

    for &[v0, v1, v2] in faces {
        let diff1 = vertices[v1] - vertices[v0];
        let diff2 = vertices[v2] - vertices[v0];
        let n = diff1.cross(&diff2);
        normals[v0] += n;
        normals[v1] += n;
        normals[v2] += n;
    }

    for n in normals.iter_mut() {
        let norm = n.norm();
        if norm > 1E-12 {
            *n /= norm;
        }
    }

    normals
}


#[cfg(test)]
mod test {
    use super::test_meshes::*;
    use super::*;

    use base::assert_eq_f64;

    #[test]
    fn test_icosahedron_normals_point_outwards() {
        let mesh = icosahedron();
        mesh.validate().unwrap();
        let shape = mesh.template_shape();
        for (v, n) in shape.vertices.iter().zip(shape.normals.iter()) {
            assert_eq_f64!(n.norm(), 1.0);
            assert_eq_f64!(n.dot(&v.coords.normalize()), 1.0);
        }
    }

    #[test]
    fn test_shape_from_wrong_vertex_count() {
        let mesh = quad();
        let err = mesh.shape_from(vec![Point3::origin()]).unwrap_err();
        assert_eq!(err.kind, MalformedData);
        assert_eq!(
            &err.description,
            "deformed mesh has 1 vertices instead of 4"
        );
    }

    #[test]
    fn test_validate_out_of_range_face() {
        let mut mesh = quad();
        mesh.uv_faces[1] = [0, 2, 4];
        let err = mesh.validate().unwrap_err();
        assert_eq!(err.kind, MalformedData);
        assert_eq!(
            &err.description,
            "face 1 refers to missing texture coordinate (4 available)"
        );
    }

    #[test]
    fn test_interpolate() {
        let mesh = quad();
        let shape = mesh.template_shape();
        let p = mesh.interpolate(&shape, 0, Vector3::new(0.5, 0.25, 0.25));
        assert_eq_f64!(p[0], -0.5 + 0.25 + 0.25);
        assert_eq_f64!(p[1], -0.5 - 0.25 + 0.25);
        assert_eq_f64!(p[2], 0.0);
    }
}
