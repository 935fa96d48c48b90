//! Decoder registry
//!
//! Maps each [`DecoderKind`] to a constructor supplied by the host. A kind
//! without a constructor is treated the same as an unknown extension.

use super::{Decoder, DecoderKind};
use crate::{PlayerError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Constructor for a fresh, unloaded decoder
pub type DecoderConstructor = Box<dyn Fn() -> Box<dyn Decoder> + Send + Sync>;

/// Registry of decoder constructors keyed by format
#[derive(Default)]
pub struct DecoderFactory {
    constructors: BTreeMap<DecoderKind, DecoderConstructor>,
}

impl DecoderFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for `kind`
    pub fn register<F>(mut self, kind: DecoderKind, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn Decoder> + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Box::new(constructor));
        self
    }

    /// Register one constructor for every kind it can handle
    pub fn register_all<F>(mut self, constructor: F) -> Self
    where
        F: Fn(DecoderKind) -> Box<dyn Decoder> + Send + Sync + Clone + 'static,
    {
        for kind in DecoderKind::ALL {
            let ctor = constructor.clone();
            self.constructors.insert(kind, Box::new(move || ctor(kind)));
        }
        self
    }

    /// True if a constructor is registered for `kind`
    pub fn supports(&self, kind: DecoderKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Kinds with a registered constructor
    pub fn registered_kinds(&self) -> Vec<DecoderKind> {
        self.constructors.keys().copied().collect()
    }

    /// Build a new decoder for `kind`
    pub fn create(&self, kind: DecoderKind) -> Result<Box<dyn Decoder>> {
        self.constructors
            .get(&kind)
            .map(|ctor| ctor())
            .ok_or_else(|| PlayerError::UnsupportedFormat(format!("no {kind} decoder registered")))
    }
}

impl fmt::Debug for DecoderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderFactory")
            .field("kinds", &self.registered_kinds())
            .finish()
    }
}
