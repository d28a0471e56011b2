//! Models and the entities they are attached to.

use crate::{FieldElement, Member, Struct, Ty};
use serde::{Deserialize, Serialize};

/// One component of state for an entity.
///
/// The member layout is defined by the remote service's schema; this type
/// only carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub members: Vec<Member>,
}

impl Model {
    /// Looks up a member by name.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Iterates over the members that form the model's key.
    pub fn key_members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.key)
    }

    /// Views the model as a struct value.
    pub fn into_ty(self) -> Ty {
        Ty::Struct(Struct {
            name: self.name,
            children: self.members,
        })
    }
}

impl From<Struct> for Model {
    fn from(s: Struct) -> Self {
        Self {
            name: s.name,
            members: s.children,
        }
    }
}

/// An entity: a hashed key plus the models attached to it, in service order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub hashed_keys: FieldElement,
    pub models: Vec<Model>,
}

impl Entity {
    /// Returns the attached model with the given name.
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name == name)
    }
}
