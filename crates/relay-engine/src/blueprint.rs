use crate::error::{Error, Result};
use crate::runtime::{MediaRuntime, NodeRole, NodeSpec, PropertyValue, RuntimeError};
use tracing::{trace, warn};

/// A node to instantiate together with the properties to set on it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBlueprint {
    pub spec: NodeSpec,
    pub properties: Vec<(String, PropertyValue)>,
}

impl NodeBlueprint {
    pub fn new(role: NodeRole, factory: &str, name: &str) -> Self {
        Self {
            spec: NodeSpec::new(role, factory, name),
            properties: Vec::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.push((key.to_string(), value.into()));
        self
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Creates the node, applies its properties and adds it to the graph.
    ///
    /// A property the runtime does not know is skipped with a warning, since
    /// plugin versions differ in what they expose; any other failure aborts.
    pub fn instantiate<R: MediaRuntime>(&self, runtime: &R) -> Result<R::Node> {
        let node = runtime
            .create_node(&self.spec)
            .map_err(|e| Error::node_creation(self.spec.role, &self.spec.factory, e))?;

        for (key, value) in &self.properties {
            match runtime.set_property(&node, key, value) {
                Ok(()) => trace!(node = %self.spec.name, %key, %value, "set property"),
                Err(RuntimeError::UnknownProperty { .. }) => {
                    warn!(node = %self.spec.name, %key, "node does not support property, skipping");
                }
                Err(e) => return Err(Error::node_creation(self.spec.role, &self.spec.factory, e)),
            }
        }

        runtime
            .add_node(&node)
            .map_err(|e| Error::node_creation(self.spec.role, &self.spec.factory, e))?;
        Ok(node)
    }
}
