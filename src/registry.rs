//! Type registry: built-in tags plus plugin-supplied descriptors.

use std::sync::Arc;

use crate::error::ConfigError;
use crate::plugin::{Plugin, TypeDescriptor, TypeHandle};
use crate::schema::{SchemaNode, TypeTag};
use crate::types::{is_builtin_type, Primitive};

/// What a type tag resolves to.
pub enum ResolvedType<'a> {
    Builtin(Primitive),
    ArrayOf(&'a SchemaNode),
    Custom(Arc<dyn TypeDescriptor>),
    /// Custom type nobody registered. Treated as valid.
    Unresolved,
}

#[derive(Clone)]
struct Registered {
    handle: TypeHandle,
    plugin: String,
}

/// Custom types registered for one session. Read-only once built.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Vec<Registered>,
}

impl Registry {
    /// Build a registry from plugins, checking the registration contract.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a plugin has no name, declares a type named
    /// like a built-in, or two plugins declare distinct types with the same
    /// name.
    pub fn register(plugins: &[Plugin]) -> Result<Self, ConfigError> {
        let mut entries: Vec<Registered> = Vec::new();

        for plugin in plugins {
            if plugin.name.trim().is_empty() {
                return Err(ConfigError::EmptyPluginName);
            }
            for handle in &plugin.types {
                let name = handle.name();
                if name.is_empty() {
                    return Err(ConfigError::EmptyTypeName {
                        plugin: plugin.name.clone(),
                    });
                }
                if is_builtin_type(name) {
                    return Err(ConfigError::ReservedTypeName {
                        plugin: plugin.name.clone(),
                        name: name.to_string(),
                    });
                }
                if let Some(existing) = entries.iter().find(|e| e.handle.name() == name) {
                    // The same descriptor shared between plugins is one type.
                    if existing.handle.same_identity(handle) {
                        continue;
                    }
                    return Err(ConfigError::DuplicateType {
                        name: name.to_string(),
                        first: existing.plugin.clone(),
                        second: plugin.name.clone(),
                    });
                }
                entries.push(Registered {
                    handle: handle.clone(),
                    plugin: plugin.name.clone(),
                });
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of registered custom types, in registration order.
    pub fn type_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.handle.name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.handle.name() == name)
    }

    pub fn resolve<'a>(&self, tag: &'a TypeTag) -> ResolvedType<'a> {
        match tag {
            TypeTag::Primitive(p) => ResolvedType::Builtin(*p),
            TypeTag::ArrayOf(item) => ResolvedType::ArrayOf(item),
            TypeTag::Custom(handle) => match self.resolve_custom(handle) {
                Some(descriptor) => ResolvedType::Custom(descriptor),
                None => ResolvedType::Unresolved,
            },
        }
    }

    /// Find the descriptor to invoke for a custom type reference.
    ///
    /// Matches by identity first, then by name. A concrete descriptor that
    /// matches by name is used as-is (it may carry its own arguments); a
    /// name-only reference binds to the registered descriptor.
    pub fn resolve_custom(&self, handle: &TypeHandle) -> Option<Arc<dyn TypeDescriptor>> {
        if let Some(entry) = self.entries.iter().find(|e| e.handle.same_identity(handle)) {
            return entry.handle.descriptor().cloned();
        }
        let entry = self
            .entries
            .iter()
            .find(|e| e.handle.name() == handle.name())?;
        handle
            .descriptor()
            .or_else(|| entry.handle.descriptor())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::any_plugin;
    use crate::types::TypeOutcome;

    fn slug() -> TypeHandle {
        TypeHandle::from_fn("slug", |_| TypeOutcome::Valid)
    }

    #[test]
    fn registers_plugin_types() {
        let registry = Registry::register(&[any_plugin(), Plugin::new("c").with_type(slug())])
            .unwrap();
        assert_eq!(registry.type_names(), vec!["any", "slug"]);
        assert!(registry.contains("slug"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn builtin_names_are_reserved() {
        let plugin = Plugin::new("bad").with_type(TypeHandle::from_fn("string", |_| true.into()));
        let err = Registry::register(&[plugin]).err().unwrap();
        assert!(matches!(err, ConfigError::ReservedTypeName { name, .. } if name == "string"));
    }

    #[test]
    fn empty_plugin_name_rejected() {
        let err = Registry::register(&[Plugin::new(" ")]).err().unwrap();
        assert!(matches!(err, ConfigError::EmptyPluginName));
    }

    #[test]
    fn duplicate_names_rejected_unless_same_descriptor() {
        let shared = slug();
        let ok = Registry::register(&[
            Plugin::new("a").with_type(shared.clone()),
            Plugin::new("b").with_type(shared),
        ]);
        assert_eq!(ok.unwrap().len(), 1);

        let err = Registry::register(&[
            Plugin::new("a").with_type(slug()),
            Plugin::new("b").with_type(slug()),
        ])
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::DuplicateType { first, second, .. }
            if first == "a" && second == "b"));
    }

    #[test]
    fn resolves_named_reference() {
        let registry = Registry::register(&[Plugin::new("c").with_type(slug())]).unwrap();
        assert!(registry.resolve_custom(&TypeHandle::named("slug")).is_some());
        assert!(registry.resolve_custom(&TypeHandle::named("email")).is_none());
    }

    #[test]
    fn unregistered_descriptor_is_unresolved() {
        let registry = Registry::register(&[]).unwrap();
        let tag = TypeTag::Custom(slug());
        assert!(matches!(registry.resolve(&tag), ResolvedType::Unresolved));
    }

    #[test]
    fn builtins_resolve_without_registration() {
        let registry = Registry::default();
        let tag = TypeTag::Primitive(Primitive::Date);
        assert!(matches!(
            registry.resolve(&tag),
            ResolvedType::Builtin(Primitive::Date)
        ));
    }
}
