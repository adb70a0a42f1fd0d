use crate::model::ModelTurn;

/// Decision after a completed model turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouterDecision {
    /// Issue another model turn (first turn, or tool results to feed back).
    Continue,
    /// The model produced a final textual answer.
    Stop,
}

/// Termination policy over the turns of one run.
///
/// Pure over the turn history so it can be tested without standing up an
/// execution engine. The iteration cap is enforced by the network loop, not
/// here. Single-agent today; generalizing to multiple agents means turning
/// this into a dispatch over turn content.
pub fn route(turns: &[ModelTurn]) -> RouterDecision {
    match turns.last() {
        None => RouterDecision::Continue,
        Some(last) if last.has_tool_calls() => RouterDecision::Continue,
        Some(_) => RouterDecision::Stop,
    }
}

/// The final textual answer, if any turn ever produced one. Later turns win.
pub fn final_text(turns: &[ModelTurn]) -> Option<String> {
    turns.iter().rev().find_map(|turn| turn.text())
}
