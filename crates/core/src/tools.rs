//! Coaching Tools
//!
//! The tools the live agent calls to push structured coaching data: dashboard
//! updates, logged objections, coaching tips, prospect research and the final
//! call summary. They are served over MCP so a runtime can discover their
//! schemas and invoke them without knowing anything about sales coaching.

use crate::objections;
use async_trait::async_trait;
use chrono::Utc;
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{CallToolRequestParam, RawContent, ServerCapabilities, ServerInfo},
    service::{RoleClient, RunningService},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to start tool service: {0}")]
    Start(String),
    #[error("tool service error: {0}")]
    Service(String),
}

/// A tool as advertised to the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the argument object.
    pub parameters: Value,
}

/// A set of tools a runtime can list and invoke for one session.
#[async_trait]
pub trait Toolbox: Send + Sync {
    async fn declarations(&self) -> Result<Vec<ToolDeclaration>, ToolError>;

    /// Invokes a tool. Never fails: errors come back as
    /// `{"status": "error", "message": ...}` so they can be handed to the agent.
    async fn invoke(&self, name: &str, args: Map<String, Value>) -> Value;
}

/// Opens a fresh [`Toolbox`] per live session.
#[async_trait]
pub trait ToolboxProvider: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn Toolbox>, ToolError>;
}

fn timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

// --- CRM Webhook ---

/// Fire-and-forget delivery of finished call summaries.
#[derive(Debug, Clone)]
pub struct CrmWebhook {
    url: String,
    client: reqwest::Client,
}

impl CrmWebhook {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Posts `payload` in the background. Failures are logged and dropped.
    pub fn fire(&self, payload: Value) {
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            let result = client
                .post(&url)
                .timeout(WEBHOOK_TIMEOUT)
                .json(&payload)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    info!(%url, "Call summary delivered to CRM webhook");
                }
                Ok(resp) => warn!(%url, status = %resp.status(), "CRM webhook rejected call summary"),
                Err(e) => warn!(%url, error = %e, "CRM webhook delivery failed"),
            }
        });
    }
}

// --- Data Structures for Tools ---

#[derive(Deserialize, JsonSchema, Debug, Default)]
pub struct UpdateDashboardArgs {
    /// The coaching advice to display: an exact phrase the rep can say word-for-word, or a tactical instruction.
    pub coaching_tip: String,
    /// Current prospect sentiment: "positive", "neutral" or "negative". Only include when it changes significantly.
    pub sentiment: Option<String>,
    /// How well the rep is qualifying (0-100).
    pub discovery_score: Option<i64>,
    /// Trust and connection score (0-100).
    pub rapport_score: Option<i64>,
    /// How well objections are handled (0-100).
    pub objection_score: Option<i64>,
    /// Clarity of action items (0-100).
    pub next_steps_score: Option<i64>,
    /// Percentage of time the rep is talking (0-100).
    pub rep_talk_pct: Option<i64>,
    /// Description of a notable moment in the call.
    pub key_moment: Option<String>,
    /// Type of key moment: "positive", "warning" or "objection".
    pub key_moment_type: Option<String>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct LogObjectionArgs {
    /// One of: price, timing, authority, need, trust, competitor, contract, custom.
    pub objection_type: String,
    /// What the prospect actually said, quoted verbatim.
    pub objection_text: String,
    /// 2-3 exact sentences following "acknowledge > reframe > question".
    pub suggested_response: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct SearchProspectArgs {
    /// Search query about the prospect or their company.
    pub query: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct CoachingTipArgs {
    /// Brief description of what's happening in the call.
    pub situation: String,
    /// One of: objection, discovery, rapport, closing, general.
    pub tip_type: Option<String>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct CallSummaryArgs {
    /// A 2-3 sentence overview of how the call went.
    pub summary: String,
    /// Overall call performance score (0-100).
    pub overall_score: i64,
    /// One of: meeting_booked, follow_up, no_interest, needs_info.
    pub outcome: String,
    /// Objection types encountered during the call.
    #[serde(default)]
    pub objections_faced: Vec<String>,
    /// Notable moments, one sentence each.
    #[serde(default)]
    pub key_moments: Vec<String>,
    /// Specific action items for the rep.
    #[serde(default)]
    pub next_steps: Vec<String>,
    /// Final percentage of time the rep spoke (0-100).
    pub rep_talk_pct: i64,
    /// Final percentage of time the prospect spoke (0-100).
    pub prospect_talk_pct: i64,
}

fn coaching_framework(tip_type: &str) -> (&'static str, &'static str) {
    match tip_type {
        "objection" => (
            "Acknowledge > Reframe > Question (Sandler)",
            "1. Acknowledge: \"I completely understand that concern...\"\n\
             2. Reframe: \"What we're actually seeing with companies like yours...\"\n\
             3. Question: \"What would it mean for your team if...?\"",
        ),
        "discovery" => (
            "SPIN Selling (Situation > Problem > Implication > Need-Payoff)",
            "Ask about their SITUATION first, then dig into the PROBLEM.\n\
             Try: \"Walk me through how your team currently handles [X]?\"\n\
             Then: \"What happens when [problem] occurs?\"",
        ),
        "rapport" => (
            "Challenger Sale (Teach > Tailor > Take Control)",
            "Share an insight they don't know about their own industry.\n\
             Try: \"Most [industry] companies we talk to are surprised to learn...\"\n\
             Then connect it to their specific situation.",
        ),
        "closing" => (
            "MEDDIC (Metrics > Economic Buyer > Decision Criteria)",
            "Establish clear next steps with a specific date and time.\n\
             Try: \"Based on what we discussed, I think a 30-minute deep dive would be valuable. \
             Does Thursday at 2pm work?\"\n\
             Always get a commitment, even if it's small.",
        ),
        _ => (
            "Tactical Sales Coaching",
            "Lead with value, not features.\n\
             Ask more questions than you make statements.\n\
             Mirror the prospect's energy and pace.",
        ),
    }
}

// --- Service and Handler Implementation ---

/// MCP service exposing the coaching tools.
pub struct CoachingService {
    crm: Option<CrmWebhook>,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for CoachingService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl CoachingService {
    pub fn new(crm: Option<CrmWebhook>) -> Self {
        Self {
            crm,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Push real-time coaching data (tip, sentiment, scores, talk ratio, key moments) to the salesperson's dashboard."
    )]
    pub async fn update_dashboard(
        &self,
        args: Parameters<UpdateDashboardArgs>,
    ) -> Result<String, String> {
        let args = args.0;
        let mut update = Map::new();
        update.insert("type".into(), json!("dashboard_update"));
        update.insert("timestamp".into(), json!(timestamp()));
        update.insert("coaching_tip".into(), json!(args.coaching_tip));

        if let Some(sentiment) = args.sentiment.filter(|s| !s.is_empty()) {
            update.insert("sentiment".into(), json!(sentiment));
        }
        let scores = [
            ("discovery_score", args.discovery_score),
            ("rapport_score", args.rapport_score),
            ("objection_score", args.objection_score),
            ("next_steps_score", args.next_steps_score),
        ];
        for (key, score) in scores {
            if let Some(score) = score.filter(|s| *s >= 0) {
                update.insert(key.into(), json!(score));
            }
        }
        if let Some(rep) = args.rep_talk_pct.filter(|p| *p >= 0) {
            update.insert("rep_talk_pct".into(), json!(rep));
            update.insert("prospect_talk_pct".into(), json!(100 - rep));
        }
        if let Some(moment) = args.key_moment.filter(|m| !m.is_empty()) {
            let kind = args
                .key_moment_type
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| "positive".to_string());
            update.insert(
                "key_moment".into(),
                json!({ "text": moment, "type": kind, "timestamp": timestamp() }),
            );
        }

        info!(tip = %preview(&args.coaching_tip, 50), "Executing tool 'update_dashboard'");
        Ok(json!({
            "status": "success",
            "message": format!("Dashboard updated with tip: {}...", preview(&args.coaching_tip, 50)),
            "data": update,
        })
        .to_string())
    }

    #[tool(
        description = "Log a detected objection (price, timing, authority, need, trust, competitor, contract, custom) with a suggested response."
    )]
    pub async fn log_objection(&self, args: Parameters<LogObjectionArgs>) -> Result<String, String> {
        let args = args.0;
        let category = match objections::category(&args.objection_type) {
            Some(c) if c.id != objections::CUSTOM => c.id,
            _ => objections::detect(&args.objection_text),
        };
        info!(objection_type = %category, "Executing tool 'log_objection'");
        Ok(json!({
            "status": "success",
            "message": format!(
                "Objection logged: {} - '{}...'",
                category,
                preview(&args.objection_text, 50)
            ),
            "data": {
                "type": "objection_logged",
                "timestamp": timestamp(),
                "objection_type": category,
                "objection_text": args.objection_text,
                "suggested_response": args.suggested_response,
                "framework": objections::framework(category),
            },
        })
        .to_string())
    }

    #[tool(
        description = "Search for information about a prospect or their company seen on screen or mentioned in the call."
    )]
    pub async fn search_prospect_info(
        &self,
        args: Parameters<SearchProspectArgs>,
    ) -> Result<String, String> {
        info!(query = %args.0.query, "Executing tool 'search_prospect_info'");
        Ok(json!({
            "status": "success",
            "message": format!("Searched for: {}", args.0.query),
            "instruction": "Use any information you found from the visual input (website, LinkedIn) \
                combined with this search to provide contextual coaching tips. \
                Tell the rep specific facts about the prospect's company they can reference.",
        })
        .to_string())
    }

    #[tool(
        description = "Get a curated coaching tip (objection, discovery, rapport, closing, general) for the current situation."
    )]
    pub async fn get_coaching_tip(&self, args: Parameters<CoachingTipArgs>) -> Result<String, String> {
        let args = args.0;
        let (method, template) = coaching_framework(args.tip_type.as_deref().unwrap_or("general"));
        info!(situation = %preview(&args.situation, 50), "Executing tool 'get_coaching_tip'");
        Ok(json!({
            "status": "success",
            "situation": args.situation,
            "framework": method,
            "coaching_tip": template,
            "message": format!("Coaching tip generated for: {}", preview(&args.situation, 50)),
        })
        .to_string())
    }

    #[tool(
        description = "Save the complete post-call analysis once the call has ended. Provide a comprehensive summary of the entire call."
    )]
    pub async fn save_call_summary(&self, args: Parameters<CallSummaryArgs>) -> Result<String, String> {
        let args = args.0;
        let call_data = json!({
            "type": "call_summary",
            "timestamp": timestamp(),
            "summary": args.summary,
            "overall_score": args.overall_score,
            "outcome": args.outcome,
            "scores": { "overall": args.overall_score },
            "objections_faced": args.objections_faced,
            "objection_count": args.objections_faced.len(),
            "key_moments": args.key_moments,
            "next_steps": args.next_steps,
            "talk_ratio": { "rep": args.rep_talk_pct, "prospect": args.prospect_talk_pct },
        });

        if let Some(crm) = &self.crm {
            crm.fire(call_data.clone());
        }

        info!(score = args.overall_score, outcome = %args.outcome, "Executing tool 'save_call_summary'");
        Ok(json!({
            "status": "success",
            "message": format!(
                "Call summary saved. Score: {}/100. Outcome: {}.",
                args.overall_score, args.outcome
            ),
            "data": call_data,
        })
        .to_string())
    }
}

// --- In-process MCP toolbox ---

/// Runs a [`CoachingService`] in-process and talks to it as an MCP client.
pub struct McpToolbox {
    client: RunningService<RoleClient, ()>,
    server: JoinHandle<()>,
}

impl McpToolbox {
    pub async fn start(service: CoachingService) -> Result<Self, ToolError> {
        let (server_transport, client_transport) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            if let Ok(running) = service.serve(server_transport).await {
                let _ = running.waiting().await;
            }
        });
        let client = ()
            .serve(client_transport)
            .await
            .map_err(|e| ToolError::Start(e.to_string()))?;
        Ok(Self { client, server })
    }
}

impl Drop for McpToolbox {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn error_payload(message: impl Into<String>) -> Value {
    json!({ "status": "error", "message": message.into() })
}

#[async_trait]
impl Toolbox for McpToolbox {
    async fn declarations(&self) -> Result<Vec<ToolDeclaration>, ToolError> {
        let tools = self
            .client
            .list_all_tools()
            .await
            .map_err(|e| ToolError::Service(e.to_string()))?;
        tools
            .into_iter()
            .map(|t| {
                Ok(ToolDeclaration {
                    name: t.name.to_string(),
                    description: t.description.map(|d| d.to_string()).unwrap_or_default(),
                    parameters: serde_json::to_value(&*t.input_schema)
                        .map_err(|e| ToolError::Service(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn invoke(&self, name: &str, args: Map<String, Value>) -> Value {
        let result = self
            .client
            .peer()
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(args),
            })
            .await;
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                return error_payload(e.to_string());
            }
        };

        let failed = result.is_error == Some(true);
        let text = result
            .content
            .and_then(|mut content| content.pop())
            .and_then(|annotated| match annotated.raw {
                RawContent::Text(text_content) => Some(text_content.text),
                _ => None,
            });
        match text {
            Some(text) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => value,
                Err(_) if failed => error_payload(text),
                Err(_) => Value::String(text),
            },
            None => error_payload("Unexpected content type from tool"),
        }
    }
}

/// Opens an [`McpToolbox`] backed by the coaching tools for each session.
#[derive(Debug, Clone, Default)]
pub struct CoachingToolboxProvider {
    crm: Option<CrmWebhook>,
}

impl CoachingToolboxProvider {
    pub fn new(crm: Option<CrmWebhook>) -> Self {
        Self { crm }
    }
}

#[async_trait]
impl ToolboxProvider for CoachingToolboxProvider {
    async fn open(&self) -> Result<Arc<dyn Toolbox>, ToolError> {
        let toolbox = McpToolbox::start(CoachingService::new(self.crm.clone())).await?;
        Ok(Arc::new(toolbox))
    }
}
