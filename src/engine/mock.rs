//! Scripted engine backend for tests and demos

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::engine::{ModelLoader, Predictor};
use crate::error::DriftError;
use crate::types::FeatureVector;

/// Returns queued results in order, then repeats the fallback forever
#[derive(Debug)]
pub struct ScriptedPredictor {
    queue: Mutex<VecDeque<Result<f64, String>>>,
    fallback: f64,
}

impl ScriptedPredictor {
    pub fn new(script: Vec<Result<f64, String>>, fallback: f64) -> Self {
        Self {
            queue: Mutex::new(script.into()),
            fallback,
        }
    }
}

impl Predictor for ScriptedPredictor {
    fn version(&self) -> &str {
        "scripted"
    }

    fn predict(&self, _window: &[FeatureVector]) -> Result<f64, DriftError> {
        let next = match self.queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        match next {
            Some(Ok(score)) => Ok(score),
            Some(Err(msg)) => Err(DriftError::Prediction(msg)),
            None => Ok(self.fallback),
        }
    }
}

/// Loader producing a [`ScriptedPredictor`], or a scripted failure
#[derive(Debug, Clone)]
pub struct ScriptedLoader {
    script: Vec<Result<f64, String>>,
    fallback: f64,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl ScriptedLoader {
    /// Always scores `score`
    pub fn constant(score: f64) -> Self {
        Self {
            script: Vec::new(),
            fallback: score,
            failure: None,
            delay: None,
        }
    }

    /// Plays `script` once, then scores `fallback`
    pub fn sequence(script: Vec<Result<f64, String>>, fallback: f64) -> Self {
        Self {
            script,
            fallback,
            failure: None,
            delay: None,
        }
    }

    /// Loading fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::constant(0.0)
        }
    }

    /// Block the loading thread for `delay` first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl ModelLoader for ScriptedLoader {
    fn describe(&self) -> String {
        "scripted test backend".to_string()
    }

    fn load(&self) -> Result<Box<dyn Predictor>, DriftError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(msg) = &self.failure {
            return Err(DriftError::EngineLoadFailure(msg.clone()));
        }
        Ok(Box::new(ScriptedPredictor::new(self.script.clone(), self.fallback)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_then_fallback() {
        let loader = ScriptedLoader::sequence(vec![Ok(0.9), Err("boom".into())], 0.1);
        let predictor = loader.load().unwrap();
        let w = [FeatureVector::zeros()];

        assert_eq!(predictor.predict(&w).unwrap(), 0.9);
        assert!(predictor.predict(&w).is_err());
        assert_eq!(predictor.predict(&w).unwrap(), 0.1);
        assert_eq!(predictor.predict(&w).unwrap(), 0.1);
    }
}
