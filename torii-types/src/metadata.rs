use crate::{FieldElement, Ty};
use serde::{Deserialize, Serialize};

/// Description of a deployed world and the models registered in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldMetadata {
    pub world_address: FieldElement,
    pub world_class_hash: FieldElement,
    pub models: Vec<ModelMetadata>,
}

impl WorldMetadata {
    /// Returns the metadata of the model with the given name.
    pub fn model(&self, name: &str) -> Option<&ModelMetadata> {
        self.models.iter().find(|m| m.name == name)
    }
}

/// Registration data of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub class_hash: FieldElement,
    pub packed_size: u32,
    pub unpacked_size: u32,
    pub schema: Ty,
}
