// Shared prompt fragments used by more than one agent.
// Agent-specific instructions live in pipeline/prompts.rs.

/// Appended to every agent whose output is deserialized into a schema.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT include explanations or apologies.";

/// User turn sent to agents that work purely from session state.
/// Their inputs are already rendered into the instruction.
pub const STATE_ONLY_TASK: &str =
    "Process the data provided in your instructions and return your output now.";
