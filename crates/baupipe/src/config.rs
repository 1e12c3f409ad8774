use crate::{
    BackoffConfig, ConcurrentDispatcher, FactoryRegistry, PoolConfig, Printer, Profiler, Result,
    StreamingAssemblerFactory, UniqueEncoder,
};
use std::sync::Arc;

/// Range of internal ids the [`UniqueEncoder`] hands out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EncoderBounds {
    /// `[0, i32::MAX]`.
    #[default]
    Unbounded,
    Bounded { min: i64, max: i64 },
}

impl EncoderBounds {
    /// # Errors
    /// Returns [`EncoderError::Boundary`](crate::EncoderError::Boundary) for
    /// an invalid bounded range.
    pub fn build(&self) -> Result<UniqueEncoder> {
        match *self {
            Self::Unbounded => Ok(UniqueEncoder::unbounded()),
            Self::Bounded { min, max } => Ok(UniqueEncoder::bounded(min, max)?),
        }
    }
}

/// Every tunable of a pipeline, in one value.
///
/// `assembler` names a factory in the [`FactoryRegistry`] passed to
/// [`build`](Self::build); `assembler_params` is the comma separated
/// parameter list handed to its constructor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    pub enabled: bool,
    pub num_workers: usize,
    pub encoder: EncoderBounds,
    pub backoff: BackoffConfig,
    pub verbose: bool,
    pub assembler: String,
    pub assembler_params: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            num_workers: PoolConfig::default().num_workers,
            encoder: EncoderBounds::default(),
            backoff: BackoffConfig::default(),
            verbose: false,
            assembler: StreamingAssemblerFactory::NAME.to_owned(),
            assembler_params: String::new(),
        }
    }
}

impl PipelineConfig {
    pub const fn pool(&self) -> PoolConfig {
        PoolConfig {
            num_workers: self.num_workers,
            backoff: self.backoff,
        }
    }

    /// Wires encoder, registry, pool and dispatcher into a [`Profiler`].
    /// A disabled configuration yields [`Profiler::disabled`] without
    /// validating anything else.
    ///
    /// # Errors
    /// Fails if the encoder bounds are invalid or the assembler factory is
    /// unknown or rejects its parameters.
    pub fn build(&self, registry: &FactoryRegistry, printer: Arc<dyn Printer>) -> Result<Profiler> {
        if !self.enabled {
            return Ok(Profiler::disabled());
        }
        let encoder = self.encoder.build()?;
        let factory = registry.create(&self.assembler, &self.assembler_params)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Building pipeline with {} workers and `{}` assembler",
            self.num_workers,
            self.assembler
        );
        let dispatcher = ConcurrentDispatcher::new(encoder, self.pool(), factory, printer);
        Ok(Profiler::new(dispatcher, self.verbose))
    }
}
