//! Role-conditioned prompt construction and LLM response parsing (C3).
//!
//! Every template instructs the model to return a single JSON object,
//! either bare or inside a fenced code block. [`parse_llm_response`] accepts
//! both and degrades gracefully on a parse failure rather than erroring —
//! prompt/parse faults are recoverable, never task-fatal.

use aiorg_shared::database::{Node, Task};
use serde_json::{json, Value};

const SYSTEM_PREAMBLE: &str = "You are an AI assistant operating as part of an AI organization, \
a tree of roles where each role is backed by a human who can review and override your output. \
Always respond with a single JSON object as instructed, and nothing else.";

#[derive(Debug, Clone, Copy)]
pub struct SubordinateSummary<'a> {
    pub role_name: &'a str,
    pub role_type: &'a str,
    pub description: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    fn role_system_prompt(&self, node: &Node) -> String {
        let role_desc = match node.role_type {
            aiorg_shared::database::NodeType::Executive => "a senior executive who sets direction and synthesizes input from subordinates",
            aiorg_shared::database::NodeType::Manager => "a manager who breaks work into assignments and reviews subordinate output",
            aiorg_shared::database::NodeType::Analyst => "an analyst who performs focused, detailed work and reports findings",
            aiorg_shared::database::NodeType::Coordinator => "a coordinator who routes work between roles and tracks progress",
        };
        let extra = node.description.as_deref().unwrap_or("");
        format!(
            "{SYSTEM_PREAMBLE}\n\nYour role: {role_name} ({role_type}), {role_desc}.\n{extra}",
            role_name = node.role_name,
            role_type = role_desc_tag(node.role_type),
        )
    }

    /// Analyze phase: decide whether to delegate and, if so, produce a plan.
    pub fn analyze(&self, task: &Task, node: &Node, subordinates: &[SubordinateSummary<'_>]) -> (String, String) {
        let system = self.role_system_prompt(node);
        let sub_list = if subordinates.is_empty() {
            "You have no subordinates; you must handle this task directly.".to_string()
        } else {
            subordinates
                .iter()
                .map(|s| format!("- {} ({}): {}", s.role_name, s.role_type, s.description.unwrap_or("")))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = format!(
            "Task: {title}\nDescription: {description}\nInput: {input}\n\n\
             Subordinates available for delegation:\n{sub_list}\n\n\
             Decide whether this task should be delegated to subordinates or handled directly. \
             Respond with a JSON object with keys: needs_delegation (bool), reasoning (string), \
             delegation_plan (object with strategy: \"parallel\" or \"sequential\", subtasks: array of \
             {{title, description, assigned_to, priority, instructions}}, summary_instructions), \
             direct_response (used only when needs_delegation is false).",
            title = task.title,
            description = task.description,
            input = task.input_data,
        );
        (prompt, system)
    }

    /// Execute phase: direct execution of a task with no delegation.
    pub fn execute(&self, task: &Task, node: &Node) -> (String, String) {
        let system = self.role_system_prompt(node);
        let prompt = format!(
            "Task: {title}\nDescription: {description}\nInput: {input}\n\n\
             Perform this task directly and respond with a JSON object with keys: \
             findings, analysis, recommendations, summary, confidence_level.",
            title = task.title,
            description = task.description,
            input = task.input_data,
        );
        (prompt, system)
    }

    /// Aggregate phase: synthesize subordinate responses into one outcome.
    pub fn aggregate(&self, task: &Task, node: &Node, subordinate_responses: &[(String, Value)]) -> (String, String) {
        let system = self.role_system_prompt(node);
        let responses = subordinate_responses
            .iter()
            .map(|(label, content)| format!("- {label}: {content}"))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Task: {title}\nDescription: {description}\n\n\
             Subordinate responses to synthesize:\n{responses}\n\n\
             Produce a JSON object with keys: executive_summary, key_findings, synthesis, \
             consolidated_recommendations, risk_assessment, next_steps, summary.",
            title = task.title,
            description = task.description,
        );
        (prompt, system)
    }

    /// Supplementary display-only template for a HITL review card: not part
    /// of the LLM call path, used to render queue items for a human
    /// reviewer (drawn from the same prompt family as the three call
    /// templates above).
    pub fn hitl_review(&self, task: &Task, node: &Node, ai_response: &Value, review_type: &str) -> String {
        format!(
            "HITL review requested ({review_type}) for task \"{title}\" assigned to {role}.\n\
             Candidate content:\n{content}",
            title = task.title,
            role = node.role_name,
            content = ai_response,
        )
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn role_desc_tag(role_type: aiorg_shared::database::NodeType) -> &'static str {
    match role_type {
        aiorg_shared::database::NodeType::Executive => "executive",
        aiorg_shared::database::NodeType::Manager => "manager",
        aiorg_shared::database::NodeType::Analyst => "analyst",
        aiorg_shared::database::NodeType::Coordinator => "coordinator",
    }
}

/// Parsed outcome of an LLM call against the analyze template. Other
/// templates are consumed as raw [`Value`] since their shape only matters to
/// the Task Engine at the specific call site, not generically.
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub needs_delegation: bool,
    pub reasoning: Option<String>,
    pub delegation_plan: Option<Value>,
    pub direct_response: Option<Value>,
}

/// Accepts a fenced ```json ... ``` block or a bare JSON object. On parse
/// failure, degrades to `{text_response: <raw>, needs_delegation: false}`
/// rather than erroring — the caller treats this as "no delegation" with
/// the raw text as the outcome.
pub fn parse_llm_response(raw: &str) -> Value {
    let candidate = extract_json_block(raw).unwrap_or(raw);
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(value) if value.is_object() => value,
        _ => json!({ "text_response": raw, "needs_delegation": false }),
    }
}

pub fn parse_analyze_response(raw: &str) -> AnalyzeOutcome {
    let value = parse_llm_response(raw);
    AnalyzeOutcome {
        needs_delegation: value.get("needs_delegation").and_then(Value::as_bool).unwrap_or(false),
        reasoning: value.get("reasoning").and_then(Value::as_str).map(str::to_string),
        delegation_plan: value.get("delegation_plan").cloned(),
        direct_response: value.get("direct_response").cloned(),
    }
}

fn extract_json_block(raw: &str) -> Option<&str> {
    let start_marker = "```json";
    let start = raw.find(start_marker).map(|i| i + start_marker.len())
        .or_else(|| raw.find("```").map(|i| i + 3))?;
    let rest = &raw[start..];
    let end = rest.find("```")?;
    Some(&rest[..end])
}
