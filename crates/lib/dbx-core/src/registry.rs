use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::tool::{Tool, ToolSpec};

/// Tools contributed by one provider, in provider order.
#[derive(Clone)]
pub struct ToolGroup {
    name: String,
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolGroup {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    #[must_use]
    pub fn with_shared(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn push(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Read-only name to tool mapping built once at startup.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
    duplicates: Vec<String>,
}

impl ToolRegistry {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|position| &self.tools[*position])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Every spec, in registry order.
    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter().map(|tool| tool.spec())
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.specs().map(ToolSpec::name).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Names that were contributed more than once while building, sorted.
    #[must_use]
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }
}

/// Flattens provider groups into one registry.
///
/// Tools keep provider order then within-provider order. When a name appears
/// more than once the last occurrence wins, so later groups override earlier
/// ones, and the surviving tool takes the position of that last occurrence.
/// Duplicates are reported with a warning; they never abort startup.
#[must_use]
pub fn build_registry(groups: Vec<ToolGroup>) -> ToolRegistry {
    let flat: Vec<(String, Arc<dyn Tool>)> = groups
        .into_iter()
        .flat_map(|group| {
            debug!(group = %group.name, tools = group.tools.len(), "collecting tool group");
            group.tools
        })
        .map(|tool| (tool.spec().name().to_string(), tool))
        .collect();

    let mut last_position: HashMap<&str, usize> = HashMap::new();
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for (position, (name, _)) in flat.iter().enumerate() {
        if !seen.insert(name.as_str()) && !duplicates.contains(name) {
            duplicates.push(name.clone());
        }
        last_position.insert(name.as_str(), position);
    }
    duplicates.sort();

    if !duplicates.is_empty() {
        warn!(
            duplicates = ?duplicates,
            "duplicate tool names detected; keeping the last registered tool for each"
        );
    }

    let keep: HashSet<usize> = last_position.into_values().collect();
    let mut tools = Vec::with_capacity(keep.len());
    let mut index = HashMap::with_capacity(keep.len());
    for (position, (name, tool)) in flat.into_iter().enumerate() {
        if keep.contains(&position) {
            index.insert(name, tools.len());
            tools.push(tool);
        }
    }

    ToolRegistry {
        tools,
        index,
        duplicates,
    }
}
