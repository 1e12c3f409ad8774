use baupipe::{
    Assembler, AssemblerError, AssemblerFactory, Brackets, FactoryRegistry, StreamingAssembler,
};
use std::sync::Arc;

/// Builds streaming assemblers that wrap every group in one JSON object.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonAssemblerFactory;

impl JsonAssemblerFactory {
    pub const NAME: &'static str = "json";

    /// Constructor registered under [`Self::NAME`]. The JSON convention is
    /// fixed, so any parameter is rejected.
    pub fn from_params(params: &[String]) -> Result<Arc<dyn AssemblerFactory>, AssemblerError> {
        if !params.is_empty() {
            return Err(AssemblerError::InvalidParams {
                factory: Self::NAME.to_owned(),
                reason: format!("takes no parameters, got {}", params.join(",")),
            });
        }
        Ok(Arc::new(Self))
    }
}

impl AssemblerFactory for JsonAssemblerFactory {
    fn create(&self) -> Box<dyn Assembler> {
        Box::new(StreamingAssembler::new(Brackets::new("{", "}", ",")))
    }
}

/// Makes the JSON factory available to [`FactoryRegistry::create`].
pub fn register(registry: &mut FactoryRegistry) {
    registry.register(JsonAssemblerFactory::NAME, JsonAssemblerFactory::from_params);
}
