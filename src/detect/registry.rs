use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::InitError;

use super::backend::Detector;
use super::backends::{MotionDetector, SyntheticDetector};

/// Everything a detector factory may need to load a network.
#[derive(Clone, Debug)]
pub struct NetworkSpec {
    pub network: String,
    pub model_dir: PathBuf,
    pub input_width: u32,
    pub input_height: u32,
}

type Factory = Box<dyn Fn(&NetworkSpec) -> Result<Box<dyn Detector>, InitError> + Send + Sync>;

/// Registry of detector factories keyed by network identifier.
///
/// Names not registered here fall back to an ONNX model lookup:
/// `<model_dir>/<network>.onnx`, or the identifier itself when it already
/// names a `.onnx` file.
pub struct DetectorRegistry {
    factories: HashMap<String, Factory>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in `synthetic` and `motion` networks.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("synthetic", |_| {
            Ok(Box::new(SyntheticDetector::default()) as Box<dyn Detector>)
        });
        registry.register("motion", |_| Ok(Box::new(MotionDetector::new()) as Box<dyn Detector>));
        registry
    }

    /// Register (or replace) a factory for a network identifier.
    pub fn register<F>(&mut self, network: &str, factory: F)
    where
        F: Fn(&NetworkSpec) -> Result<Box<dyn Detector>, InitError> + Send + Sync + 'static,
    {
        self.factories.insert(network.to_string(), Box::new(factory));
    }

    /// List registered network identifiers, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the detector for `spec.network`.
    pub fn load(&self, spec: &NetworkSpec) -> Result<Box<dyn Detector>, InitError> {
        if let Some(factory) = self.factories.get(&spec.network) {
            return factory(spec);
        }

        let model_path = resolve_model_path(&spec.network, &spec.model_dir);
        if !model_path.is_file() {
            return Err(InitError::UnknownNetwork(format!(
                "{} (no model at {}; built-in networks: {})",
                spec.network,
                model_path.display(),
                self.list().join(", ")
            )));
        }
        load_onnx(spec, &model_path)
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn resolve_model_path(network: &str, model_dir: &Path) -> PathBuf {
    if network.ends_with(".onnx") {
        PathBuf::from(network)
    } else {
        model_dir.join(format!("{}.onnx", network))
    }
}

#[cfg(feature = "backend-tract")]
fn load_onnx(spec: &NetworkSpec, model_path: &Path) -> Result<Box<dyn Detector>, InitError> {
    let detector = super::backends::TractDetector::load(
        &spec.network,
        model_path,
        spec.input_width,
        spec.input_height,
    )
    .map_err(|e| InitError::LoadNetwork {
        network: spec.network.clone(),
        reason: format!("{:#}", e),
    })?;
    log::info!(
        "loaded network {} from {} ({}x{})",
        spec.network,
        model_path.display(),
        spec.input_width,
        spec.input_height
    );
    Ok(Box::new(detector))
}

#[cfg(not(feature = "backend-tract"))]
fn load_onnx(spec: &NetworkSpec, model_path: &Path) -> Result<Box<dyn Detector>, InitError> {
    Err(InitError::LoadNetwork {
        network: spec.network.clone(),
        reason: format!(
            "{} requires the backend-tract feature",
            model_path.display()
        ),
    })
}
