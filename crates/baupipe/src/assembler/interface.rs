use crate::Conversion;
use core::fmt;
use std::sync::Arc;

/// A finished, serialized document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assembly {
    document: String,
}

impl Assembly {
    pub fn new(document: String) -> Self {
        Self { document }
    }

    pub fn as_str(&self) -> &str {
        &self.document
    }

    pub fn into_string(self) -> String {
        self.document
    }

    pub fn len(&self) -> usize {
        self.document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.document)
    }
}

/// Turns an ordered stream of conversions into a single document.
pub trait Assembler: Send {
    /// Assembles `conversions` in order. `estimated_size` is a hint for the
    /// output buffer, typically the summed body length.
    fn assemble(
        &self,
        conversions: &mut dyn Iterator<Item = Conversion>,
        estimated_size: usize,
    ) -> Assembly;
}

/// Creates the assembler a worker uses for one group.
pub trait AssemblerFactory: fmt::Debug + Send + Sync {
    fn create(&self) -> Box<dyn Assembler>;
}

impl<F: AssemblerFactory + ?Sized> AssemblerFactory for Arc<F> {
    fn create(&self) -> Box<dyn Assembler> {
        (**self).create()
    }
}
