use crate::{AssemblerError, AssemblerFactory, StreamingAssemblerFactory};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a factory from its configuration parameters.
pub type FactoryConstructor = fn(&[String]) -> Result<Arc<dyn AssemblerFactory>, AssemblerError>;

/// Name to constructor lookup for assembler factories.
///
/// Populated at startup; [`FactoryRegistry::default`] already knows the
/// format-agnostic `"streaming"` factory.
#[derive(Clone, Debug)]
pub struct FactoryRegistry {
    constructors: HashMap<String, FactoryConstructor>,
}

impl FactoryRegistry {
    /// A registry with no factories at all.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registers `constructor` under `name`, returning the one it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: FactoryConstructor,
    ) -> Option<FactoryConstructor> {
        self.constructors.insert(name.into(), constructor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Looks up `name` and builds its factory from comma separated `params`.
    ///
    /// # Errors
    /// - [`AssemblerError::UnknownFactory`] if nothing is registered as `name`.
    /// - whatever the constructor reports for bad parameters.
    pub fn create(
        &self,
        name: &str,
        params: &str,
    ) -> Result<Arc<dyn AssemblerFactory>, AssemblerError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| AssemblerError::UnknownFactory(name.to_owned()))?;
        constructor(&split_params(params))
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(
            StreamingAssemblerFactory::NAME,
            StreamingAssemblerFactory::from_params,
        );
        registry
    }
}

/// Splits a parameter string on commas, trimming whitespace around each one.
/// A blank string yields no parameters.
///
/// `\,` is a literal comma and `\\` a literal backslash, so a parameter may
/// itself contain a comma (e.g. `[,],\,`).
pub fn split_params(params: &str) -> Vec<String> {
    if params.trim().is_empty() {
        return Vec::new();
    }
    let mut split = Vec::new();
    let mut current = String::new();
    let mut chars = params.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ (',' | '\\')) => current.push(escaped),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            ',' => split.push(core::mem::take(&mut current).trim().to_owned()),
            _ => current.push(c),
        }
    }
    split.push(current.trim().to_owned());
    split
}
