use crate::{
    config::{ModelConfig, Validatable},
    model_service::{ModelError, ModelService},
    preprocess::INPUT_SHAPE,
};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    output_name: String,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, ModelError> {
        model_config.validate().map_err(ModelError::Load)?;

        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()
            .map_err(|e| ModelError::Load(e.to_string()))?;

        let output_name = {
            let session = sessions[0]
                .lock()
                .map_err(|e| ModelError::Load(format!("session mutex poisoned: {}", e)))?;
            resolve_output_name(&session, &model_config.output_name)?
        };

        tracing::info!(
            "Created {} ONNX sessions from {:?}, reading output `{}`",
            num_instances,
            model_config.get_path(),
            output_name
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            output_name,
        })
    }
}

fn resolve_output_name(session: &Session, configured: &str) -> Result<String, ModelError> {
    if session.outputs.iter().any(|output| output.name == configured) {
        return Ok(configured.to_string());
    }
    let first = session
        .outputs
        .first()
        .ok_or_else(|| ModelError::Load("model declares no outputs".to_string()))?;
    tracing::warn!(
        "Output `{}` not found in model, falling back to `{}`",
        configured,
        first.name
    );
    Ok(first.name.clone())
}

impl ModelService for OrtModelService {
    fn infer(&self, input: &Array<f32, Ix4>) -> Result<f32, ModelError> {
        if input.shape() != INPUT_SHAPE {
            return Err(ModelError::InputShape {
                expected: INPUT_SHAPE,
                got: input.shape().to_vec(),
            });
        }

        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::Runtime(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.as_standard_layout().to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)?;
        let outputs = session.run(ort::inputs![tensor_ref])?;

        let (_, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;

        checked_probability(data.first().copied())
    }
}

fn checked_probability(raw: Option<f32>) -> Result<f32, ModelError> {
    let probability = raw.ok_or(ModelError::EmptyOutput)?;
    if !probability.is_finite() {
        return Err(ModelError::NonFinite(probability));
    }
    Ok(probability.clamp(0.0, 1.0))
}
