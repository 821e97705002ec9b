use log::debug;

use base::defs::Result;

use crate::mesh::{Mesh, Shape};
use crate::misc::Point3;

// Deformable face model producing vertex positions from identity and
// expression weights. Positions must follow the template vertex order.
pub trait Model {
    fn apply_weights(
        &self,
        identity_weights: &[f64],
        expression_weights: &[f64],
    ) -> Result<Vec<Point3>>;
}

// Rigid model which always reproduces the template mesh.
pub struct TemplateModel {
    vertices: Vec<Point3>,
}

impl TemplateModel {
    pub fn new(mesh: &Mesh) -> TemplateModel {
        TemplateModel {
            vertices: mesh.vertices.clone(),
        }
    }
}

impl Model for TemplateModel {
    fn apply_weights(
        &self,
        identity_weights: &[f64],
        expression_weights: &[f64],
    ) -> Result<Vec<Point3>> {
        debug!(
            "ignoring {} identity and {} expression weights",
            identity_weights.len(),
            expression_weights.len()
        );
        Ok(self.vertices.clone())
    }
}

pub fn deform(
    model: &dyn Model,
    mesh: &Mesh,
    identity_weights: &[f64],
    expression_weights: &[f64],
) -> Result<Shape> {
    let vertices = model.apply_weights(identity_weights, expression_weights)?;
    mesh.shape_from(vertices)
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::mesh::test_meshes::quad;

    #[test]
    fn test_template_model_deform() {
        let mesh = quad();
        let model = TemplateModel::new(&mesh);
        let shape = deform(&model, &mesh, &[0.5], &[0.1, 0.2]).unwrap();
        assert_eq!(shape, mesh.template_shape());
    }
}
