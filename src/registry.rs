//! Explicit GUID-to-factory registry for tree functions.
//!
//! The registry is an ordinary value constructed once by the host and
//! passed by reference into the engine. Nothing here is process-global.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::function::{FuncGuid, TreeFunction};

type FunctionFactory = Box<dyn Fn() -> Arc<dyn TreeFunction> + Send + Sync>;

/// GUID-keyed factory lookup for tree functions.
#[derive(Default)]
pub struct FunctionRegistry {
    factories: HashMap<FuncGuid, FunctionFactory>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under the GUID of the functions it produces.
    ///
    /// The GUID is taken from a probe instance, so a factory cannot be
    /// registered under a mismatching key. Re-registering a GUID replaces
    /// the previous factory.
    pub fn register<F>(&mut self, factory: F)
    where
        F: Fn() -> Arc<dyn TreeFunction> + Send + Sync + 'static,
    {
        let guid = factory().guid();
        self.factories.insert(guid, Box::new(factory));
    }

    /// Instantiates the function registered under `guid`.
    pub fn resolve(&self, guid: FuncGuid) -> Result<Arc<dyn TreeFunction>, Error> {
        self.factories
            .get(&guid)
            .map(|factory| factory())
            .ok_or(Error::UnresolvedFunction { guid })
    }

    /// Whether a factory is registered under `guid`.
    pub fn contains(&self, guid: FuncGuid) -> bool {
        self.factories.contains_key(&guid)
    }

    /// GUIDs of all registered function types.
    pub fn guids(&self) -> impl Iterator<Item = FuncGuid> + '_ {
        self.factories.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ParamValue;

    struct Probe;

    const PROBE_GUID: FuncGuid = FuncGuid(0xdead_beef);

    impl TreeFunction for Probe {
        fn guid(&self) -> FuncGuid {
            PROBE_GUID
        }

        fn name(&self) -> &str {
            "probe"
        }

        fn execute(
            &self,
            _inputs: &[ParamValue],
            _outputs: &mut [ParamValue],
            _user_data: Option<&crate::function::UserData>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn resolve_registered_function() {
        let mut registry = FunctionRegistry::new();
        registry.register(|| Arc::new(Probe) as Arc<dyn TreeFunction>);
        assert!(registry.contains(PROBE_GUID));
        assert_eq!(registry.resolve(PROBE_GUID).unwrap().name(), "probe");
    }

    #[test]
    fn resolve_unknown_guid_is_an_error() {
        let registry = FunctionRegistry::new();
        assert!(matches!(
            registry.resolve(FuncGuid(1)),
            Err(Error::UnresolvedFunction { .. })
        ));
    }
}
