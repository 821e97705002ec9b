use std::path::{Path, PathBuf};

use log::info;
use structopt::StructOpt;

use base::defs::Result;
use base::util::cli::Array;

use crate::atlas::PixelMap;
use crate::import_obj::load_mesh;
use crate::misc::save_image;
use crate::render::RenderContext;

#[derive(Clone, Copy, StructOpt)]
pub struct AtlasParams {
    #[structopt(
        help = "Texture atlas width and height",
        long,
        default_value = "2048,2048"
    )]
    pub atlas_size: Array<u32, 2>,
}

#[derive(StructOpt)]
#[structopt(about = "Build texture atlas correspondence of a mesh")]
pub struct BuildAtlasParams {
    #[structopt(help = "Template mesh .obj file")]
    mesh_path: PathBuf,

    #[structopt(flatten)]
    atlas_params: AtlasParams,

    #[structopt(
        help = "Output atlas triangle index image",
        long,
        short = "i",
        default_value = "albedo_index.png"
    )]
    index_path: PathBuf,

    #[structopt(
        help = "Output atlas barycentric coordinates image",
        long,
        short = "p",
        default_value = "albedo_pixel.png"
    )]
    pixel_map_path: PathBuf,
}

pub fn build_atlas_with_params(params: &BuildAtlasParams) -> Result<()> {
    build_atlas(
        &params.mesh_path,
        params.atlas_params.atlas_size.0,
        &params.index_path,
        &params.pixel_map_path,
    )
}

pub fn build_atlas(
    mesh_path: &Path,
    [width, height]: [u32; 2],
    index_path: &Path,
    pixel_map_path: &Path,
) -> Result<()> {
    info!("Building {}x{} texture atlas...", width, height);
    let mesh = load_mesh(mesh_path)?;

    let mut context = RenderContext::new();
    let (map, index_image) =
        PixelMap::build(&mut context, &mesh, width, height)?;

    save_image(&index_image, index_path)?;
    save_image(&map.to_rgb_image(), pixel_map_path)?;
    info!(
        "  saved atlas images '{}' and '{}'",
        index_path.display(),
        pixel_map_path.display()
    );
    Ok(())
}
