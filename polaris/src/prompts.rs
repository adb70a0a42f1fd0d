use crate::store::{MessageRecord, MessageRole};

/// Placeholder title assigned at conversation creation, replaced at most
/// once by the auto-generated title.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New conversation";

/// Answer persisted when a run converges without the model ever producing
/// final text.
pub const FALLBACK_ASSISTANT_RESPONSE: &str =
    "I processed your request. Let me know if you need anything else!";

/// Answer persisted by the failure handler so no message stays stuck in
/// processing.
pub const FAILURE_ASSISTANT_RESPONSE: &str = "My apologies, I encountered an error while \
     processing your request. Let me know if you need anything else!";

pub const CODING_AGENT_SYSTEM_PROMPT: &str = "\
You are Polaris, an expert AI coding assistant. You build and modify web \
projects stored as a virtual file tree of files and folders.

Rules:
- Always call listFiles before touching the project so you work from real \
file IDs. Tools take IDs, never names or paths.
- Read a file with readFiles before rewriting it with updateFile; updateFile \
replaces the whole content.
- createFile and createFolder take an optional parentId. Pass the ID of an \
existing folder, or an empty string for the project root.
- If a tool reports an error about an ID, call listFiles again and retry \
with a valid ID instead of guessing.
- When the user references an external URL, fetch it with scrapeUrls before \
relying on its contents.
- When the work is done, reply with a short plain-text summary of what you \
changed. Do not paste file contents into the final answer.";

pub const TITLE_GENERATOR_SYSTEM_PROMPT: &str = "\
Generate a short title for a coding conversation based on the user's first \
message. Reply with the title only: at most 50 characters, no quotes, no \
trailing punctuation.";

/// Base instructions plus a transcript of recent context, when any.
///
/// `history` is oldest-first and already filtered (no in-flight message, no
/// empty content).
pub fn build_system_prompt(history: &[MessageRecord]) -> String {
    let mut prompt = CODING_AGENT_SYSTEM_PROMPT.to_string();
    if history.is_empty() {
        return prompt;
    }

    let transcript: Vec<String> = history
        .iter()
        .map(|message| {
            let role = match message.role {
                MessageRole::User => "USER",
                MessageRole::Assistant => "ASSISTANT",
            };
            format!("{role}: {}", message.content)
        })
        .collect();

    prompt.push_str(
        "\n\n## Previous Conversation (for context only - do NOT repeat these responses):\n",
    );
    prompt.push_str(&transcript.join("\n\n"));
    prompt.push_str(
        "\n\n## Current Request:\nRespond ONLY to the user's new message below. Do not repeat \
         or reference your previous responses.",
    );
    prompt
}
