// Typedefs and simple pixel functionality shared by all stages of the
// estimation pipeline.

use std::io::BufReader;
use std::path::Path;

use image::io::Reader as ImageReader;
use image::{Rgb, RgbImage};

use base::defs::{Error, ErrorKind::*, IntoResult, Result};
use base::util::fs;

pub type Vector2 = nalgebra::Vector2<f64>;
pub type Vector3 = nalgebra::Vector3<f64>;
pub type Vector4 = nalgebra::Vector4<f64>;
pub type Point3 = nalgebra::Point3<f64>;
pub type Matrix4 = nalgebra::Matrix4<f64>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectedPoint {
    pub point: Vector2, // Window coordinates, Y axis pointing up.
    pub depth: f64,     // Window depth in [0, 1] for visible points.
}

pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();
    let err_fn = || format!("failed to decode image '{}'", path.display());
    let img = ImageReader::new(BufReader::new(fs::open_file(path)?))
        .with_guessed_format()
        .res(err_fn)?
        .decode()
        .map_err(|e| {
            Error::new(MalformedData, format!("{} ({})", err_fn(), e))
        })?;
    Ok(img.into_rgb8())
}

pub fn save_image<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<()> {
    let path = path.as_ref();
    image
        .save(path)
        .res(|| format!("failed to save image '{}'", path.display()))
}

pub fn get_pixel_as_vector3(x: u32, y: u32, image: &RgbImage) -> Vector3 {
    let p = image.get_pixel(x, y);
    Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64)
}

pub fn set_pixel_as_vector3(
    x: u32,
    y: u32,
    color: Vector3,
    image: &mut RgbImage,
) {
    let to_u8 = |c: f64| c.clamp(0.0, 255.0).round() as u8;
    let [r, g, b] = [to_u8(color[0]), to_u8(color[1]), to_u8(color[2])];
    image.put_pixel(x, y, Rgb([r, g, b]));
}

pub fn is_background(pixel: &Rgb<u8>) -> bool {
    pixel.0 == [0, 0, 0]
}

// Samples an image at continuous pixel coordinates, where integer
// coordinates are pixel centers. Points outside of the image give zero.
pub fn sample_bilinear(image: &RgbImage, x: f64, y: f64) -> Vector3 {
    let (w, h) = image.dimensions();
    if w == 0
        || h == 0
        || !(-0.5..=w as f64 - 0.5).contains(&x)
        || !(-0.5..=h as f64 - 0.5).contains(&y)
    {
        return Vector3::zeros();
    }

    let (x, y) = (x.clamp(0.0, (w - 1) as f64), y.clamp(0.0, (h - 1) as f64));
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (dx, dy) = (x - x0 as f64, y - y0 as f64);

    let s00 = get_pixel_as_vector3(x0, y0, image);
    let s01 = get_pixel_as_vector3(x1, y0, image);
    let s10 = get_pixel_as_vector3(x0, y1, image);
    let s11 = get_pixel_as_vector3(x1, y1, image);
    let s0 = (1.0 - dx) * s00 + dx * s01;
    let s1 = (1.0 - dx) * s10 + dx * s11;
    (1.0 - dy) * s0 + dy * s1
}

// Beware that texture V axis points up while image rows go down.
pub fn texel_center_uv(x: u32, y: u32, width: u32, height: u32) -> Vector2 {
    Vector2::new(
        (x as f64 + 0.5) / width as f64,
        1.0 - (y as f64 + 0.5) / height as f64,
    )
}

pub fn uv_to_pixel(uv: Vector2, width: u32, height: u32) -> Vector2 {
    Vector2::new(
        uv[0] * width as f64 - 0.5,
        (1.0 - uv[1]) * height as f64 - 0.5,
    )
}

// Window coordinates have their origin at the bottom left image corner.
pub fn window_to_pixel(point: Vector2, height: u32) -> Vector2 {
    Vector2::new(point[0] - 0.5, height as f64 - point[1] - 0.5)
}

// Dense image of 3-component vectors, zero marks missing data.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<Vector3>,
}

impl VectorImage {
    pub fn new(width: u32, height: u32) -> VectorImage {
        VectorImage {
            width,
            height,
            data: vec![Vector3::zeros(); (width * height) as usize],
        }
    }

    pub fn from_rgb_image(
        image: &RgbImage,
        f: impl Fn(Vector3) -> Vector3,
    ) -> VectorImage {
        let (width, height) = image.dimensions();
        let data = image
            .pixels()
            .map(|p| {
                if is_background(p) {
                    Vector3::zeros()
                } else {
                    f(Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64))
                }
            })
            .collect();
        VectorImage {
            width,
            height,
            data,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Vector3 {
        self.data[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: Vector3) {
        self.data[(y * self.width + x) as usize] = value;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use base::assert_eq_f64;

    #[test]
    fn test_sample_bilinear() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([0, 100, 200]));
        image.put_pixel(1, 0, Rgb([100, 200, 0]));

        let s = sample_bilinear(&image, 0.5, 0.0);
        assert_eq_f64!(s[0], 50.0);
        assert_eq_f64!(s[1], 150.0);
        assert_eq_f64!(s[2], 100.0);

        let s = sample_bilinear(&image, 1.0, 0.2);
        assert_eq!(s, Vector3::new(100.0, 200.0, 0.0));

        assert_eq!(sample_bilinear(&image, -0.6, 0.0), Vector3::zeros());
        assert_eq!(sample_bilinear(&image, 0.0, 0.6), Vector3::zeros());
    }

    #[test]
    fn test_texel_center_uv_inverse() {
        let uv = texel_center_uv(3, 5, 8, 16);
        let p = uv_to_pixel(uv, 8, 16);
        assert_eq_f64!(p[0], 3.0);
        assert_eq_f64!(p[1], 5.0);
    }

    #[test]
    fn test_image_save_and_load() {
        let dir = std::env::temp_dir().join("photometry_misc_test");
        fs::create_dir(&dir).unwrap();
        let path = dir.join("image.png");

        let mut image = RgbImage::new(3, 2);
        image.put_pixel(2, 1, Rgb([10, 20, 30]));
        save_image(&image, &path).unwrap();
        assert_eq!(load_image(&path).unwrap(), image);

        let err = load_image(dir.join("missing.png")).unwrap_err();
        assert_eq!(err.kind, ResourceMissing);
    }

    #[test]
    fn test_vector_image_background() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(1, 0, Rgb([255, 255, 255]));
        let v = VectorImage::from_rgb_image(&image, |c| c / 255.0);
        assert_eq!(v.get(0, 0), Vector3::zeros());
        assert_eq!(v.get(1, 0), Vector3::new(1.0, 1.0, 1.0));
    }
}
