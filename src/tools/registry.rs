//! Toolset registry: construction-time registration, read-only after.

use std::collections::BTreeMap;

use crate::error::RegistryError;
use crate::tools::tool::{ToolDescriptor, ToolListing};

/// A named group of operations sharing configuration.
#[derive(Debug)]
struct Toolset {
    tools: BTreeMap<String, ToolDescriptor>,
}

/// Per-toolset mapping from operation name to descriptor.
///
/// Built mutably during startup from a static registration list, then
/// shared immutably behind an `Arc` — there is no runtime registration
/// and therefore no lock to take on the lookup path.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    toolsets: BTreeMap<String, Toolset>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add descriptors under `toolset_id`. A name collision within the
    /// toolset is an error: a misconfigured toolset must fail startup,
    /// not silently drop tools.
    pub fn register(
        &mut self,
        toolset_id: impl Into<String>,
        descriptors: Vec<ToolDescriptor>,
    ) -> Result<(), RegistryError> {
        let toolset_id = toolset_id.into();
        let toolset = self
            .toolsets
            .entry(toolset_id.clone())
            .or_insert_with(|| Toolset {
                tools: BTreeMap::new(),
            });

        for descriptor in descriptors {
            descriptor.validate()?;
            if toolset.tools.contains_key(&descriptor.name) {
                return Err(RegistryError::DuplicateTool {
                    toolset: toolset_id,
                    name: descriptor.name,
                });
            }
            tracing::debug!(toolset = %toolset_id, tool = %descriptor.name, "Registered tool");
            toolset.tools.insert(descriptor.name.clone(), descriptor);
        }
        Ok(())
    }

    /// Look up one descriptor.
    pub fn resolve(
        &self,
        toolset_id: &str,
        tool_name: &str,
    ) -> Result<&ToolDescriptor, RegistryError> {
        let toolset = self
            .toolsets
            .get(toolset_id)
            .ok_or_else(|| RegistryError::UnknownToolset {
                id: toolset_id.to_string(),
            })?;
        toolset
            .tools
            .get(tool_name)
            .ok_or_else(|| RegistryError::UnknownTool {
                toolset: toolset_id.to_string(),
                name: tool_name.to_string(),
            })
    }

    /// Registered toolset ids, sorted.
    pub fn list_toolsets(&self) -> Vec<&str> {
        self.toolsets.keys().map(String::as_str).collect()
    }

    /// Discovery listings for one toolset (handlers excluded).
    pub fn list_tools(&self, toolset_id: &str) -> Result<Vec<ToolListing>, RegistryError> {
        let toolset = self
            .toolsets
            .get(toolset_id)
            .ok_or_else(|| RegistryError::UnknownToolset {
                id: toolset_id.to_string(),
            })?;
        Ok(toolset.tools.values().map(ToolDescriptor::listing).collect())
    }

    /// Every rate category declared by any registered tool, unique and
    /// sorted. The dispatcher checks these against the limiter's
    /// configuration at startup.
    pub fn declared_categories(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .toolsets
            .values()
            .flat_map(|ts| ts.tools.values())
            .filter_map(|d| d.rate_category.as_deref())
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool::{ParamType, ToolDescriptor, handler_fn};
    use serde_json::json;

    fn tool(name: &str, category: Option<&str>) -> ToolDescriptor {
        let builder = ToolDescriptor::builder(name, format!("{name} test tool"))
            .optional_param("q", ParamType::String, "query");
        let builder = match category {
            Some(key) => builder.rate_category(key),
            None => builder,
        };
        builder.handler(handler_fn(|_args, _ctx| async { Ok(json!("ok")) }))
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = ToolRegistry::new();
        registry
            .register("network", vec![tool("profile", None), tool("search", None)])
            .unwrap();

        assert!(registry.resolve("network", "profile").is_ok());
        assert_eq!(registry.list_toolsets(), vec!["network"]);
    }

    #[test]
    fn duplicate_tool_is_rejected() {
        let mut registry = ToolRegistry::new();
        let err = registry
            .register("network", vec![tool("profile", None), tool("profile", None)])
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool { .. }));
    }

    #[test]
    fn duplicate_across_registrations_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register("network", vec![tool("profile", None)])
            .unwrap();
        let err = registry
            .register("network", vec![tool("profile", None)])
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool { .. }));
    }

    #[test]
    fn same_name_in_different_toolsets_is_fine() {
        let mut registry = ToolRegistry::new();
        registry
            .register("network", vec![tool("status", None)])
            .unwrap();
        registry.register("mail", vec![tool("status", None)]).unwrap();
        assert_eq!(registry.list_toolsets(), vec!["mail", "network"]);
    }

    #[test]
    fn unknown_toolset_and_tool_are_distinct() {
        let mut registry = ToolRegistry::new();
        registry
            .register("network", vec![tool("profile", None)])
            .unwrap();

        assert!(matches!(
            registry.resolve("mail", "profile"),
            Err(RegistryError::UnknownToolset { .. })
        ));
        assert!(matches!(
            registry.resolve("network", "nope"),
            Err(RegistryError::UnknownTool { .. })
        ));
    }

    #[test]
    fn listings_are_sorted_and_handlerless() {
        let mut registry = ToolRegistry::new();
        registry
            .register("network", vec![tool("search", None), tool("profile", None)])
            .unwrap();

        let listings = registry.list_tools("network").unwrap();
        let names: Vec<_> = listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["profile", "search"]);
    }

    #[test]
    fn declared_categories_are_deduped() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                "network",
                vec![
                    tool("a", Some("search")),
                    tool("b", Some("search")),
                    tool("c", Some("profiles")),
                    tool("d", None),
                ],
            )
            .unwrap();
        assert_eq!(registry.declared_categories(), vec!["profiles", "search"]);
    }
}
