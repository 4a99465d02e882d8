use crate::model_service::{ModelError, ModelService};
use image::{ImageBuffer, ImageFormat, Rgb};
use ndarray::{Array, Ix4};
use std::io::Cursor;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

#[derive(Clone)]
pub struct ConstantModel(pub f32);

impl ModelService for ConstantModel {
    fn infer(&self, _input: &Array<f32, Ix4>) -> Result<f32, ModelError> {
        Ok(self.0)
    }
}

#[derive(Clone)]
pub struct CountingModel {
    probability: f32,
    calls: Arc<AtomicUsize>,
}

impl CountingModel {
    pub fn new(probability: f32) -> Self {
        Self {
            probability,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelService for CountingModel {
    fn infer(&self, _input: &Array<f32, Ix4>) -> Result<f32, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probability)
    }
}

#[derive(Clone)]
pub struct FailingModel;

impl ModelService for FailingModel {
    fn infer(&self, _input: &Array<f32, Ix4>) -> Result<f32, ModelError> {
        Err(ModelError::Runtime("simulated runtime failure".to_string()))
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encoded_bytes(width, height, ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encoded_bytes(width, height, ImageFormat::Jpeg)
}

fn encoded_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut image_data = Vec::new();
    img.write_to(&mut Cursor::new(&mut image_data), format)
        .unwrap();
    image_data
}
