use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::types::{checked_well_known, Type};

/// Source of message type information for the checker.
pub trait TypeProvider: Send + Sync {
    /// The type of the type-value named `name`, i.e. `type(name)`, if
    /// `name` is a known message.
    fn find_type(&self, name: &str) -> Option<Type>;

    fn find_field_type(&self, message: &str, field: &str) -> Option<Type>;

    fn has_message(&self, name: &str) -> bool;
}

/// In-memory message schemas, keyed by fully qualified name.
///
/// Protobuf well-known message names are always known, without fields.
#[derive(Clone, Debug, Default)]
pub struct MessageRegistry {
    messages: IndexMap<SmolStr, IndexMap<SmolStr, Type>>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a message and its fields.
    pub fn add_message<I, N>(&mut self, name: impl Into<SmolStr>, fields: I)
    where
        I: IntoIterator<Item = (N, Type)>,
        N: Into<SmolStr>,
    {
        let fields = fields.into_iter().map(|(n, t)| (n.into(), t)).collect();
        self.messages.insert(name.into(), fields);
    }

    pub fn message_names(&self) -> impl Iterator<Item = &SmolStr> {
        self.messages.keys()
    }
}

impl TypeProvider for MessageRegistry {
    fn find_type(&self, name: &str) -> Option<Type> {
        self.has_message(name)
            .then(|| Type::type_of(Type::message(name)))
    }

    fn find_field_type(&self, message: &str, field: &str) -> Option<Type> {
        self.messages.get(message)?.get(field).cloned()
    }

    fn has_message(&self, name: &str) -> bool {
        self.messages.contains_key(name) || checked_well_known(name).is_some()
    }
}
