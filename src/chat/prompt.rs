const PERSONA: &str = "You are an AI expert on Formula 1.";

const INSTRUCTIONS: &str = "\
- Answer the user naturally, as a well-informed human.
- If the context doesn't answer it, rely on your own knowledge.
- Don't mention sources or context explicitly.
- Use Markdown formatting.
- Never return images or audio.";

/// Render the system prompt that frames every answer.
///
/// The `Context:` section is always present, even when `context` is empty.
#[inline]
pub fn system_prompt(context: &str, question: &str) -> String {
    format!(
        "{PERSONA}\n\nContext:\n{context}\n\nInstructions:\n{INSTRUCTIONS}\n\nQuestion:\n{question}"
    )
}
