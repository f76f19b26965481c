//! Prompts sent to the generation model.

/// Prompt for a query with retrieved context.
#[must_use]
pub fn with_context(query: &str, context: &str) -> String {
    format!(
        "You are a helpful assistant answering questions from the provided context.\n\
         \n\
         ### Context:\n\
         {context}\n\
         \n\
         ### Question:\n\
         {query}\n\
         \n\
         ### Instructions:\n\
         - Answer using the information in the context above.\n\
         - If the context does not fully answer the question, say which part is missing.\n\
         - Be concise and accurate.\n\
         \n\
         ### Answer:\n"
    )
}

/// Prompt for a query when nothing relevant was retrieved.
#[must_use]
pub fn without_context(query: &str) -> String {
    format!(
        "You are a helpful assistant. No relevant documents were found for this question.\n\
         \n\
         ### Question:\n\
         {query}\n\
         \n\
         ### Instructions:\n\
         - Answer from general knowledge.\n\
         - Clearly flag anything you are unsure about.\n\
         - Suggest what additional context would help.\n\
         \n\
         ### Answer:\n"
    )
}
