//! Prompt assembly for retrieval-augmented answers.

/// Builds the completion prompt from the retrieved context and the question.
/// Context blocks are numbered from 1 and separated by blank lines; with no
/// context the template still stands and the model is told to say so.
pub fn augment(query: &str, context_chunks: &[String]) -> String {
    let context = context_chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("Context {}:\n{}", i + 1, chunk))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful assistant. Use the following context to answer the user's question. If the context doesn't contain relevant information, say so.\n\n{}\n\nUser Question: {}\n\nAnswer:",
        context, query
    )
}
