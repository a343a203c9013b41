use intellidocs_core::error::AppError;

use crate::answer::prompts::NOT_AVAILABLE_ANSWER;

/// Refuse to send a grounding prompt that lacks the explicit fallback instruction.
pub fn enforce_grounding_prompt(prompt: &str) -> Result<(), AppError> {
    if !prompt.contains(NOT_AVAILABLE_ANSWER) {
        return Err(AppError::new(
            "AI_PROMPT_INVALID",
            "Grounding prompt must include the fallback instruction",
        ));
    }
    Ok(())
}

/// Words a model may put before the fallback sentence, as in "I'm sorry, but the answer...".
const MAX_LEAD_IN_WORDS: usize = 6;

/// True when the model answered with the fallback statement instead of content. The statement
/// must make up the first sentence, allowing a short lead-in.
pub fn is_unsupported_answer(answer: &str) -> bool {
    let fallback = NOT_AVAILABLE_ANSWER.trim_end_matches('.').to_lowercase();
    let answer = answer
        .trim_start_matches(|c: char| c.is_whitespace() || c == '"' || c == '*')
        .to_lowercase();
    let first_sentence = answer.split(['.', '!', '?']).next().unwrap_or_default();
    match first_sentence.find(&fallback) {
        Some(at) => first_sentence[..at].split_whitespace().count() <= MAX_LEAD_IN_WORDS,
        None => false,
    }
}
