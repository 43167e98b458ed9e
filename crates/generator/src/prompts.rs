/// Substituted for the context block when retrieval produced nothing.
pub const NO_CONTEXT_PLACEHOLDER: &str = "(No relevant context found.)";

pub const SYSTEM_PROMPT: &str = "You are an e-commerce assistant.\n\
Goals: be correct, concise, and sales-oriented.\n\
Rules:\n\
- Use ONLY the provided context for factual claims.\n\
- If context is insufficient, ask 1 short clarifying question.\n\
- When recommending, provide 2-3 options and include links if available.\n\
- Do not invent prices, stock, delivery promises, or policies.\n\
- When a product is mentioned and its URL is in the context, include the URL.\n";

/// User turn sent alongside [`SYSTEM_PROMPT`].
pub fn build_user_prompt(query: &str, intent: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        NO_CONTEXT_PLACEHOLDER
    } else {
        context
    };
    format!("User query: {query}\nDetected intent: {intent}\n\nContext:\n{context}\n")
}
