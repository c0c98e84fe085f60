//! Tool catalog: the gateway exposed as named, schema-described calls
//!
//! Text-generating workers see the gateway as a set of tools. Each tool has a
//! JSON-schema request type; [`dispatch`] decodes arguments, runs the matching
//! gateway operation, and renders the outcome as plain text:
//!
//! ```text
//! add_task            -> "task_3"
//! set_conclusion      -> "OK"
//! add_answer (again)  -> "OK: answer for task_1 replaced the previous answer by W1"
//! add_belief_set      -> "FUNC_ERROR[validation]: unsupported logic type ..."
//! get_snapshot        -> {"raw_text": ..., ...}
//! ```
//!
//! Unknown tool names and undecodable arguments are reported as
//! `validation` errors; dispatch never fails.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::result::{GatewayError, RenderForWorker};
use super::LedgerGateway;
use crate::ledger::{LedgerStore, SnapshotView};

// ============================================================================
// Request Types
// ============================================================================

/// Request for add_task tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddTaskRequest {
    #[schemars(description = "What the analysis task should establish")]
    pub description: String,
}

/// Request for add_argument tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddArgumentRequest {
    #[schemars(description = "The argument as found in the text, in your own words")]
    pub description: String,
}

/// Request for add_fallacy tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddFallacyRequest {
    /// Fallacy name, e.g. "ad_hominem"
    #[serde(alias = "type")]
    #[schemars(description = "Fallacy name, e.g. ad_hominem or strawman")]
    pub fallacy_type: String,

    #[schemars(description = "Why the passage commits this fallacy")]
    pub justification: String,

    #[serde(default)]
    #[schemars(description = "Id of the argument the fallacy applies to (arg_N)")]
    pub target_argument_id: Option<String>,
}

/// Request for add_belief_set tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddBeliefSetRequest {
    #[schemars(description = "Logic of the belief set; only propositional is supported")]
    pub logic_type: String,

    #[schemars(description = "Belief set formulas in the logic's syntax")]
    pub content: String,
}

/// Request for log_query tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LogQueryRequest {
    #[schemars(description = "Id of the queried belief set (bs_N)")]
    pub belief_set_id: String,

    #[schemars(description = "The query formula")]
    pub query: String,

    #[schemars(description = "Raw result returned by the reasoner")]
    pub raw_result: String,
}

/// Request for add_answer tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddAnswerRequest {
    #[schemars(description = "Id of the task being answered (task_N)")]
    pub task_id: String,

    #[schemars(description = "Name of the answering worker")]
    pub author: String,

    #[schemars(description = "The answer")]
    pub text: String,

    #[serde(default)]
    #[schemars(description = "Ledger ids the answer relies on")]
    pub source_ids: Vec<String>,
}

/// Request for set_conclusion tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetConclusionRequest {
    #[schemars(description = "Final conclusion of the analysis; ends the session")]
    pub text: String,
}

/// Request for designate_next_speaker tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DesignateNextSpeakerRequest {
    #[schemars(description = "Name of the worker that must act next")]
    pub name: String,
}

/// Request for get_snapshot tool
#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct GetSnapshotRequest {
    /// Summary view unless explicitly false (default: true)
    #[serde(default)]
    #[schemars(description = "Return counts and ids only (default true)")]
    pub summarized: Option<bool>,
}

// ============================================================================
// Catalog
// ============================================================================

/// Every tool the gateway exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayTool {
    AddTask,
    AddArgument,
    AddFallacy,
    AddBeliefSet,
    LogQuery,
    AddAnswer,
    SetConclusion,
    DesignateNextSpeaker,
    GetSnapshot,
}

impl GatewayTool {
    pub fn all() -> &'static [GatewayTool] {
        &[
            Self::AddTask,
            Self::AddArgument,
            Self::AddFallacy,
            Self::AddBeliefSet,
            Self::LogQuery,
            Self::AddAnswer,
            Self::SetConclusion,
            Self::DesignateNextSpeaker,
            Self::GetSnapshot,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AddTask => "add_task",
            Self::AddArgument => "add_argument",
            Self::AddFallacy => "add_fallacy",
            Self::AddBeliefSet => "add_belief_set",
            Self::LogQuery => "log_query",
            Self::AddAnswer => "add_answer",
            Self::SetConclusion => "set_conclusion",
            Self::DesignateNextSpeaker => "designate_next_speaker",
            Self::GetSnapshot => "get_snapshot",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::all().iter().copied().find(|tool| tool.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::AddTask => "Register an analysis task. Returns its id (task_N).",
            Self::AddArgument => "Record an argument found in the text. Returns its id (arg_N).",
            Self::AddFallacy => "Record a fallacy. Returns its id (fallacy_N).",
            Self::AddBeliefSet => "Store a formal belief set. Returns its id (bs_N).",
            Self::LogQuery => "Log a query run against a belief set. Returns its id (query_N).",
            Self::AddAnswer => "Record the answer to an analysis task.",
            Self::SetConclusion => "Record the final conclusion. The session stops afterwards.",
            Self::DesignateNextSpeaker => "Name the worker that must speak on the next turn.",
            Self::GetSnapshot => "Read the current ledger state as JSON.",
        }
    }

    fn parameters(&self) -> Value {
        let schema = match self {
            Self::AddTask => schemars::schema_for!(AddTaskRequest),
            Self::AddArgument => schemars::schema_for!(AddArgumentRequest),
            Self::AddFallacy => schemars::schema_for!(AddFallacyRequest),
            Self::AddBeliefSet => schemars::schema_for!(AddBeliefSetRequest),
            Self::LogQuery => schemars::schema_for!(LogQueryRequest),
            Self::AddAnswer => schemars::schema_for!(AddAnswerRequest),
            Self::SetConclusion => schemars::schema_for!(SetConclusionRequest),
            Self::DesignateNextSpeaker => schemars::schema_for!(DesignateNextSpeakerRequest),
            Self::GetSnapshot => schemars::schema_for!(GetSnapshotRequest),
        };
        serde_json::to_value(schema).unwrap_or_default()
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

impl std::fmt::Display for GatewayTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Name, description and JSON schema of one tool, as advertised to workers.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Definitions for the whole catalog
pub fn tool_definitions() -> Vec<ToolDefinition> {
    GatewayTool::all().iter().map(GatewayTool::definition).collect()
}

// ============================================================================
// Dispatch
// ============================================================================

fn decode<T: serde::de::DeserializeOwned>(tool: GatewayTool, args: Value) -> Result<T, String> {
    // Workers sometimes send no arguments at all for optional-only tools
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| {
        GatewayError::validation(tool.name(), format!("invalid arguments for {tool}: {e}"))
            .to_string()
    })
}

/// Run a named tool against the gateway and render the outcome as text.
pub fn dispatch<S: LedgerStore>(gateway: &LedgerGateway<S>, tool_name: &str, args: Value) -> String {
    let Some(tool) = GatewayTool::from_name(tool_name) else {
        tracing::warn!(tool = tool_name, "Unknown gateway tool requested");
        return GatewayError::validation(tool_name, format!("unknown tool '{tool_name}'"))
            .to_string();
    };

    let rendered = match tool {
        GatewayTool::AddTask => decode::<AddTaskRequest>(tool, args)
            .map(|req| gateway.add_task(&req.description).render()),
        GatewayTool::AddArgument => decode::<AddArgumentRequest>(tool, args)
            .map(|req| gateway.add_argument(&req.description).render()),
        GatewayTool::AddFallacy => decode::<AddFallacyRequest>(tool, args).map(|req| {
            gateway
                .add_fallacy(
                    &req.fallacy_type,
                    &req.justification,
                    req.target_argument_id.as_deref(),
                )
                .render()
        }),
        GatewayTool::AddBeliefSet => decode::<AddBeliefSetRequest>(tool, args)
            .map(|req| gateway.add_belief_set(&req.logic_type, &req.content).render()),
        GatewayTool::LogQuery => decode::<LogQueryRequest>(tool, args).map(|req| {
            gateway
                .log_query(&req.belief_set_id, &req.query, &req.raw_result)
                .render()
        }),
        GatewayTool::AddAnswer => decode::<AddAnswerRequest>(tool, args).map(|req| {
            gateway
                .add_answer(&req.task_id, &req.author, &req.text, &req.source_ids)
                .render()
        }),
        GatewayTool::SetConclusion => decode::<SetConclusionRequest>(tool, args)
            .map(|req| gateway.set_conclusion(&req.text).render()),
        GatewayTool::DesignateNextSpeaker => decode::<DesignateNextSpeakerRequest>(tool, args)
            .map(|req| gateway.designate_next_speaker(&req.name).render()),
        GatewayTool::GetSnapshot => decode::<GetSnapshotRequest>(tool, args).map(|req| {
            let view = SnapshotView::from_summarized(req.summarized.unwrap_or(true));
            gateway.get_snapshot(view).to_json_text()
        }),
    };

    rendered.unwrap_or_else(|message| message)
}
