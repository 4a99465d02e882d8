use crate::codec::{decode_image, CodecError};
use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array, Ix4};
use thiserror::Error;

pub const INPUT_SIZE: u32 = 224;
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3];

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("unreadable image: {0}")]
    Unreadable(#[from] CodecError),
}

/// Turns a decoded image into a `[1, 224, 224, 3]` tensor scaled to `[0, 1]`.
///
/// Nearest-neighbour sampling matches the loader the classifier was trained with.
pub fn image_to_tensor(img: &DynamicImage) -> Array<f32, Ix4> {
    let rgb = img
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Nearest)
        .to_rgb8();

    Array::from_shape_fn(INPUT_SHAPE, |(_, y, x, c)| {
        rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.
    })
}

pub fn bytes_to_tensor(image_data: &[u8]) -> Result<Array<f32, Ix4>, PreprocessError> {
    let img = decode_image(image_data)?;
    Ok(image_to_tensor(&img))
}
