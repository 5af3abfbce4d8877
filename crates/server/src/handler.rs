//! MCP server handler implementation.
//!
//! This module defines the worker handler that routes tool calls from the
//! page shell to the counter, cache and sync implementations.
use crate::state::WorkerState;
use crate::tools::cache::{
    CacheActivateParams, CacheDeleteParams, CacheInstallParams, CacheMatchParams, activate_impl, delete_impl,
    install_impl, keys_impl, match_impl,
};
use crate::tools::counter::{increment_impl, read_impl};
use crate::tools::sync::{SyncParams, register_impl, run_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The MCP handler for the vidrec worker.
#[derive(Clone)]
pub struct WorkerServer {
    state: WorkerState,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl WorkerServer {
    pub fn new(state: WorkerState) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    #[tool(description = "Read the recordings counter, creating it at zero if absent.")]
    async fn counter_read(&self) -> Result<CallToolResult, McpError> {
        read_impl(&self.state).await
    }

    /// Called by the capture UI after each saved recording.
    #[tool(description = "Increment the recordings counter by one and schedule a counter-sync run.")]
    async fn counter_increment(&self) -> Result<CallToolResult, McpError> {
        increment_impl(&self.state).await
    }

    #[tool(
        description = "Fetch every manifest URL into a new cache generation. All-or-nothing: any failed fetch leaves no partial generation and the active one keeps serving."
    )]
    async fn cache_install(&self, params: Parameters<CacheInstallParams>) -> Result<CallToolResult, McpError> {
        install_impl(&self.state, params.0).await
    }

    #[tool(
        description = "Make a cache generation active and delete every generation not in the retain set or the activated one."
    )]
    async fn cache_activate(&self, params: Parameters<CacheActivateParams>) -> Result<CallToolResult, McpError> {
        activate_impl(&self.state, params.0).await
    }

    #[tool(
        description = "Answer a request cache-first from the active generation. Returns the cached response, a bypass marker, or applies the miss policy."
    )]
    async fn cache_match(&self, params: Parameters<CacheMatchParams>) -> Result<CallToolResult, McpError> {
        match_impl(&self.state, params.0).await
    }

    #[tool(description = "List stored cache generations with their state and entry counts.")]
    async fn cache_keys(&self) -> Result<CallToolResult, McpError> {
        keys_impl(&self.state).await
    }

    #[tool(description = "Delete an inactive cache generation by name.")]
    async fn cache_delete(&self, params: Parameters<CacheDeleteParams>) -> Result<CallToolResult, McpError> {
        delete_impl(&self.state, params.0).await
    }

    #[tool(description = "Register a background sync tag. Reports registered=false when scheduling is unsupported.")]
    async fn sync_register(&self, params: Parameters<SyncParams>) -> Result<CallToolResult, McpError> {
        register_impl(&self.state, params.0).await
    }

    #[tool(description = "Run a sync tag once, now. Read-only: reports the counter without changing it.")]
    async fn sync_run(&self, params: Parameters<SyncParams>) -> Result<CallToolResult, McpError> {
        run_impl(&self.state, params.0).await
    }
}

impl ServerHandler for WorkerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "vidrec-worker".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
