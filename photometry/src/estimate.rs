use std::path::{Path, PathBuf};

use image::RgbImage;
use log::{info, warn};
use serde::Serialize;
use structopt::StructOpt;

use base::defs::Result;
use base::util::fs;

use crate::atlas::PixelMap;
use crate::build_atlas::AtlasParams;
use crate::bundle::{load_bundles, ImageBundle};
use crate::fusion::MeanTexture;
use crate::import_obj::load_mesh;
use crate::lighting::{
    reconstruct_shading, render_albedo_map, render_normal_map,
    select_constraints, solve_lighting, LightingCoeffs,
};
use crate::mesh::Mesh;
use crate::misc::save_image;
use crate::model::{Model, TemplateModel};
use crate::render::RenderContext;
use crate::visibility::View;

#[derive(StructOpt)]
#[structopt(about = "Estimate albedo, normals and lighting of posed images")]
pub struct EstimateParams {
    #[structopt(help = "Settings file listing image and points files")]
    settings_path: PathBuf,

    #[structopt(help = "Template mesh .obj file")]
    mesh_path: PathBuf,

    #[structopt(flatten)]
    atlas_params: AtlasParams,

    #[structopt(help = "Cached atlas triangle index image", long)]
    atlas_index: Option<PathBuf>,

    #[structopt(help = "Rebuild the cached atlas index image", long)]
    regenerate_atlas: bool,

    #[structopt(
        help = "Output directory for diagnostic images",
        long,
        short = "o",
        default_value = "."
    )]
    out_dir: PathBuf,
}

#[derive(Serialize)]
struct LightingRecord<'a> {
    image: &'a str,
    coefficients: Option<Vec<f64>>, // None if estimation failed.
}

pub fn estimate_with_params(params: &EstimateParams) -> Result<()> {
    fs::create_dir(&params.out_dir)?;
    let mesh = load_mesh(&params.mesh_path)?;
    let model = TemplateModel::new(&mesh);
    let bundles = load_bundles(&params.settings_path)?;

    let mut context = RenderContext::new();
    let atlas = prepare_atlas(
        &mut context,
        &mesh,
        params.atlas_params.atlas_size.0,
        params.atlas_index.as_deref(),
        params.regenerate_atlas,
        &params.out_dir,
    )?;

    estimate(
        &mut context,
        &model,
        &mesh,
        &atlas,
        &bundles,
        &params.out_dir,
    )?;
    Ok(())
}

// Loads the cached atlas index image unless asked to rebuild it.
pub fn prepare_atlas(
    context: &mut RenderContext,
    mesh: &Mesh,
    [width, height]: [u32; 2],
    cached_path: Option<&Path>,
    regenerate: bool,
    out_dir: &Path,
) -> Result<PixelMap> {
    info!("Preparing {}x{} texture atlas...", width, height);
    if let Some(path) = cached_path {
        if path.exists() && !regenerate {
            let (map, _) = PixelMap::load(mesh, path, width, height)?;
            return Ok(map);
        }
    }

    let (map, index_image) = PixelMap::build(context, mesh, width, height)?;
    let index_path = cached_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| out_dir.join("albedo_index.png"));
    save_image(&index_image, &index_path)?;
    save_image(&map.to_rgb_image(), out_dir.join("albedo_pixel.png"))?;
    info!("  saved atlas index image '{}'", index_path.display());
    Ok(map)
}

// Returns lighting coefficients per bundle, None for skipped views.
pub fn estimate(
    context: &mut RenderContext,
    model: &dyn Model,
    mesh: &Mesh,
    atlas: &PixelMap,
    bundles: &[ImageBundle],
    out_dir: &Path,
) -> Result<Vec<Option<LightingCoeffs>>> {
    info!("Fusing mean texture from {} images...", bundles.len());
    let mut mean_texture = MeanTexture::new(atlas.width, atlas.height);
    let mut views = vec![];

    for (i, bundle) in bundles.iter().enumerate() {
        let res = View::prepare(context, model, mesh, &bundle.params);
        let view = match skip_per_view(bundle, res)? {
            Some(view) => view,
            None => {
                views.push(None);
                continue;
            }
        };

        save_image(&view.mesh_image, out_dir.join(format!("mesh{}.png", i)))?;
        let overlay = view.draw_overlay(mesh, &bundle.points);
        let path = out_dir.join(format!("mesh_with_vertices{}.png", i));
        save_image(&overlay, path)?;

        let num_samples =
            mean_texture.accumulate(atlas, mesh, &view, &bundle.image)?;
        info!(
            "  image '{}': {} visible triangles, {} texel samples",
            bundle.name,
            view.visible.len(),
            num_samples
        );
        views.push(Some(view));
    }

    let mean_image = mean_texture.finalize();
    save_image(&mean_image, out_dir.join("mean_texture.png"))?;
    info!(
        "  mean texture covers {} of {} texels",
        mean_texture.num_observed(),
        atlas.width * atlas.height
    );

    info!("Estimating lighting of {} images...", bundles.len());
    let mut results = vec![];
    for (i, (bundle, view)) in bundles.iter().zip(views.iter()).enumerate() {
        let coeffs = match view {
            Some(view) => {
                let res = estimate_view_lighting(
                    context,
                    mesh,
                    view,
                    bundle,
                    &mean_image,
                    out_dir,
                    i,
                );
                skip_per_view(bundle, res)?
            }
            None => None,
        };
        results.push(coeffs);
    }

    let records: Vec<LightingRecord> = bundles
        .iter()
        .zip(results.iter())
        .map(|(bundle, coeffs)| LightingRecord {
            image: &bundle.name,
            coefficients: coeffs.as_ref().map(|c| c.iter().cloned().collect()),
        })
        .collect();
    fs::write_json(out_dir.join("lighting.json"), &records)?;

    let num_solved = results.iter().filter(|r| r.is_some()).count();
    info!("  estimated lighting of {} images", num_solved);
    Ok(results)
}

fn estimate_view_lighting(
    context: &mut RenderContext,
    mesh: &Mesh,
    view: &View,
    bundle: &ImageBundle,
    mean_texture: &RgbImage,
    out_dir: &Path,
    index: usize,
) -> Result<LightingCoeffs> {
    let (normal_image, normals) = render_normal_map(context, mesh, view)?;
    save_image(&normal_image, out_dir.join(format!("normal{}.png", index)))?;

    let (albedo_image, albedos) =
        render_albedo_map(context, mesh, view, mean_texture)?;
    save_image(&albedo_image, out_dir.join(format!("albedo{}.png", index)))?;

    let constraints = select_constraints(&normals, &albedos, &bundle.image)?;
    let coeffs = solve_lighting(&constraints)?;
    info!(
        "  image '{}': lighting from {} constraints: {:.4?}",
        bundle.name,
        constraints.len(),
        coeffs.as_slice()
    );

    let shading = reconstruct_shading(&normals, &albedos, &coeffs);
    save_image(&shading, out_dir.join(format!("lighting{}.png", index)))?;
    Ok(coeffs)
}

// Turns failures confined to a single view into a skipped view.
fn skip_per_view<T>(
    bundle: &ImageBundle,
    res: Result<T>,
) -> Result<Option<T>> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_per_view() => {
            warn!("  skipping image '{}': {}", bundle.name, err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::cell::RefCell;

    use image::Rgb;

    use base::defs::{Error, ErrorKind::*};
    use base::util::test::MethodMock;

    use crate::bundle::{ModelParameters, ReconstructionResult};
    use crate::camera::{CameraParameters, Pose};
    use crate::mesh::test_meshes::{icosahedron, quad};
    use crate::misc::{load_image, Point3, Vector2};

    type WeightsArgs = (Vec<f64>, Vec<f64>);

    #[derive(Default)]
    struct MockModel {
        apply_weights: RefCell<MethodMock<WeightsArgs, Result<Vec<Point3>>>>,
    }

    impl Model for MockModel {
        fn apply_weights(
            &self,
            identity_weights: &[f64],
            expression_weights: &[f64],
        ) -> Result<Vec<Point3>> {
            let args = (identity_weights.to_vec(), expression_weights.to_vec());
            self.apply_weights.borrow_mut().call(args)
        }
    }

    fn bundle(name: &str, translation: [f64; 3]) -> ImageBundle {
        ImageBundle {
            name: name.to_string(),
            image: RgbImage::from_pixel(64, 64, Rgb([128, 128, 128])),
            points: vec![Vector2::new(10.0, 20.0)],
            params: ReconstructionResult {
                camera: CameraParameters::new(80.0, [32.0, 32.0], [64, 64]),
                model: ModelParameters {
                    pose: Pose {
                        rotation: [0.3, 0.2, 0.0],
                        translation,
                    },
                    identity_weights: vec![0.5],
                    expression_weights: vec![0.1, 0.2],
                },
            },
        }
    }

    fn out_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        fs::create_dir(&dir).unwrap();
        dir
    }

    #[test]
    fn test_estimate_pipeline() {
        let mesh = icosahedron();
        let dir = out_dir("photometry_estimate_test");
        let mut context = RenderContext::new();
        let atlas =
            prepare_atlas(&mut context, &mesh, [100, 80], None, false, &dir)
                .unwrap();

        let model = MockModel::default();
        for _ in 0..2 {
            model
                .apply_weights
                .borrow_mut()
                .rets
                .push(Ok(mesh.vertices.clone()));
        }

        // The second bundle sees the mesh from behind the camera.
        let bundles = [
            bundle("front", [0.0, 0.0, -6.0]),
            bundle("behind", [0.0, 0.0, 6.0]),
        ];
        let results =
            estimate(&mut context, &model, &mesh, &atlas, &bundles, &dir)
                .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_none());

        let args: Vec<WeightsArgs> =
            model.apply_weights.borrow_mut().args.drain(..).collect();
        assert_eq!(args, vec![(vec![0.5], vec![0.1, 0.2]); 2]);

        for name in [
            "albedo_index.png",
            "albedo_pixel.png",
            "mesh0.png",
            "mesh_with_vertices0.png",
            "mean_texture.png",
            "normal0.png",
            "albedo0.png",
            "lighting.json",
        ] {
            assert!(dir.join(name).exists(), "missing {}", name);
        }
        assert!(!dir.join("mesh1.png").exists());

        let mean_texture = load_image(dir.join("mean_texture.png")).unwrap();
        assert!(mean_texture.pixels().any(|p| p.0 == [128, 128, 128]));

        let records: serde_json::Value =
            fs::read_json(dir.join("lighting.json")).unwrap();
        assert_eq!(records[0]["image"], "front");
        assert!(records[1]["coefficients"].is_null());
    }

    #[test]
    fn test_estimate_aborts_on_bad_model() {
        let mesh = quad();
        let dir = out_dir("photometry_estimate_abort_test");
        let mut context = RenderContext::new();
        let atlas =
            prepare_atlas(&mut context, &mesh, [8, 8], None, false, &dir)
                .unwrap();

        let model = MockModel::default();
        let desc = "weights mismatch".to_string();
        model
            .apply_weights
            .borrow_mut()
            .rets
            .push(Err(Error::new(MalformedData, desc)));

        let bundles = [bundle("front", [0.0, 0.0, -6.0])];
        let err = estimate(&mut context, &model, &mesh, &atlas, &bundles, &dir)
            .unwrap_err();
        assert_eq!(err.kind, MalformedData);
        model.apply_weights.borrow_mut().args.clear();
    }

    #[test]
    fn test_prepare_atlas_reuses_cache() {
        let mesh = quad();
        let dir = out_dir("photometry_estimate_atlas_test");
        let cached = dir.join("cached_index.png");
        let mut context = RenderContext::new();

        let built = prepare_atlas(
            &mut context,
            &mesh,
            [8, 8],
            Some(cached.as_path()),
            true,
            &dir,
        )
        .unwrap();
        assert!(cached.exists());

        let loaded = prepare_atlas(
            &mut context,
            &mesh,
            [8, 8],
            Some(cached.as_path()),
            false,
            &dir,
        )
        .unwrap();
        assert_eq!(loaded, built);

        let res = prepare_atlas(
            &mut context,
            &mesh,
            [4, 4],
            Some(cached.as_path()),
            false,
            &dir,
        );
        assert_eq!(res.unwrap_err().kind, MalformedData);
    }
}
