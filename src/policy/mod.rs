pub mod builtin;

use rand::RngCore;
use std::collections::HashMap;
use std::fmt;

/// Stand-in for ground-truth evaluation. No labels exist in this
/// simulation, so per-detection correctness and no-detection fallback
/// accuracy are drawn from a policy instead of measured. Swapping the
/// policy for a real evaluation source leaves the aggregation protocol
/// untouched.
pub trait AccuracyPolicy: Send + fmt::Debug {
    /// Whether a single detection counts as correct.
    fn detection_correct(&mut self, rng: &mut dyn RngCore) -> bool;

    /// Accuracy reported for a frame with no detections. Without this a
    /// faceless frame would report zero accuracy forever.
    fn fallback_accuracy(&mut self, rng: &mut dyn RngCore) -> f64;

    fn name(&self) -> &str;
    fn clone_box(&self) -> Box<dyn AccuracyPolicy>;
}

pub struct PolicyRegistry {
    policies: HashMap<String, Box<dyn Fn() -> Box<dyn AccuracyPolicy> + Send + Sync>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            policies: HashMap::new(),
        };
        registry.register_builtin();
        registry
    }

    fn register_builtin(&mut self) {
        self.register("bernoulli", || Box::new(builtin::Bernoulli::reference()));
        self.register("perfect", || Box::new(builtin::Perfect));
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn AccuracyPolicy> + Send + Sync + 'static,
    {
        self.policies.insert(name.to_lowercase(), Box::new(factory));
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn AccuracyPolicy>> {
        self.policies.get(&name.to_lowercase()).map(|factory| factory())
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.policies.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn global() -> &'static PolicyRegistry {
        use std::sync::OnceLock;
        static REGISTRY: OnceLock<PolicyRegistry> = OnceLock::new();
        REGISTRY.get_or_init(PolicyRegistry::new)
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
