//! Execution requests and the template/definition store collaborators.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::capability::CapabilitySet;
use crate::events::StoreError;
use crate::graph::{EdgeSpec, NodeSpec};
use crate::template::WorkflowTemplate;

/// A stored workflow definition: a concrete graph owned by a user.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<CapabilitySet>,
}

/// Where the graph for a request comes from.
#[derive(Clone, Debug)]
pub enum RequestSource {
    /// Compile a stored template with runtime parameters.
    Template {
        template_id: String,
        params: Map<String, Value>,
    },
    /// Load a stored definition.
    Definition {
        definition_id: String,
        params: Map<String, Value>,
    },
    /// Nodes and edges supplied inline.
    Inline {
        nodes: Vec<NodeSpec>,
        edges: Vec<EdgeSpec>,
        capabilities: Option<CapabilitySet>,
    },
}

/// One execution request.
#[derive(Clone, Debug)]
pub struct ExecutionRequest {
    pub source: RequestSource,
    /// Chat message seeding the conversation, if any.
    pub input_message: Option<String>,
    pub user_id: String,
    pub conversation_id: Option<String>,
}

impl ExecutionRequest {
    pub fn template(
        template_id: impl Into<String>,
        params: Map<String, Value>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            source: RequestSource::Template {
                template_id: template_id.into(),
                params,
            },
            input_message: None,
            user_id: user_id.into(),
            conversation_id: None,
        }
    }

    pub fn definition(
        definition_id: impl Into<String>,
        params: Map<String, Value>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            source: RequestSource::Definition {
                definition_id: definition_id.into(),
                params,
            },
            input_message: None,
            user_id: user_id.into(),
            conversation_id: None,
        }
    }

    pub fn inline(
        nodes: Vec<NodeSpec>,
        edges: Vec<EdgeSpec>,
        capabilities: Option<CapabilitySet>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            source: RequestSource::Inline {
                nodes,
                edges,
                capabilities,
            },
            input_message: None,
            user_id: user_id.into(),
            conversation_id: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.input_message = Some(message.into());
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Template or definition id, for the execution record.
    pub(crate) fn source_ids(&self) -> (Option<String>, Option<String>) {
        match &self.source {
            RequestSource::Template { template_id, .. } => (None, Some(template_id.clone())),
            RequestSource::Definition { definition_id, .. } => {
                (Some(definition_id.clone()), None)
            }
            RequestSource::Inline { .. } => (None, None),
        }
    }
}

/// Read-only template store collaborator.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, id: &str) -> Result<Option<WorkflowTemplate>, StoreError>;
}

/// Read-only definition store collaborator.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn get_definition(&self, id: &str) -> Result<Option<WorkflowDefinition>, StoreError>;

    /// Number of stored definitions; lets callers assert that template
    /// execution materializes nothing.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// In-memory template store for tests and embedded use.
#[derive(Default)]
pub struct InMemoryTemplateStore {
    templates: DashMap<String, WorkflowTemplate>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, template: WorkflowTemplate) {
        self.templates.insert(template.id.clone(), template);
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn get_template(&self, id: &str) -> Result<Option<WorkflowTemplate>, StoreError> {
        Ok(self.templates.get(id).map(|t| t.value().clone()))
    }
}

/// In-memory definition store for tests and embedded use.
#[derive(Default)]
pub struct InMemoryDefinitionStore {
    definitions: DashMap<String, WorkflowDefinition>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, definition: WorkflowDefinition) {
        self.definitions.insert(definition.id.clone(), definition);
    }
}

#[async_trait]
impl DefinitionStore for InMemoryDefinitionStore {
    async fn get_definition(&self, id: &str) -> Result<Option<WorkflowDefinition>, StoreError> {
        Ok(self.definitions.get(id).map(|d| d.value().clone()))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.definitions.len())
    }
}
