//! Prompt template for answering questions over retrieved chunks.
//!
//! The template asks the model to answer in detail, to say so when the
//! context does not contain the answer, and to finish by naming the
//! document(s) and page(s) it used. Page provenance is only available to the
//! model through the `--- Page N of document NAME ---` marker lines embedded in
//! the chunk text; the pipeline itself does not verify citations.
//!
//! Callers can override the template via
//! [`crate::config::PdfChatConfig::prompt_template`]; any override must keep
//! both placeholders.

use crate::error::PdfChatError;

/// Placeholder replaced with the retrieved chunks.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Placeholder replaced with the user's question.
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// Default question-answering prompt.
pub const QA_PROMPT_TEMPLATE: &str = r#"Using the provided context and your general knowledge, answer the question in a detailed and expressive way.
Make sure to include every relevant detail from the context, and complement it with your own knowledge when needed.
If the answer is not in the context, say that it is not available, but offer related information if possible.
At the end of your answer, state specifically which document(s) and page(s) contain the information you used.

Context:
{context}

Question: {question}

Detailed answer:
"#;

/// Separator placed between retrieved chunks inside `{context}`.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Substitute the context and question into `template`.
///
/// The template is scanned once, left to right, and the first occurrence of
/// each placeholder is replaced. Substituted text is never rescanned, so a
/// chunk or question containing a literal `{question}` stays as written.
pub fn render_qa_prompt(template: &str, chunks: &[&str], question: &str) -> String {
    let context = chunks.join(CONTEXT_SEPARATOR);
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;
    let mut context_done = false;
    let mut question_done = false;

    loop {
        let next_context = if context_done { None } else { rest.find(CONTEXT_PLACEHOLDER) };
        let next_question = if question_done { None } else { rest.find(QUESTION_PLACEHOLDER) };
        let (pos, is_context) = match (next_context, next_question) {
            (Some(c), Some(q)) if c < q => (c, true),
            (_, Some(q)) => (q, false),
            (Some(c), None) => (c, true),
            (None, None) => break,
        };

        out.push_str(&rest[..pos]);
        if is_context {
            out.push_str(&context);
            rest = &rest[pos + CONTEXT_PLACEHOLDER.len()..];
            context_done = true;
        } else {
            out.push_str(question);
            rest = &rest[pos + QUESTION_PLACEHOLDER.len()..];
            question_done = true;
        }
    }

    out.push_str(rest);
    out
}

/// Check that a custom template carries both placeholders.
pub fn validate_template(template: &str) -> Result<(), PdfChatError> {
    for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
        if !template.contains(placeholder) {
            return Err(PdfChatError::InvalidConfig(format!(
                "prompt template must contain {placeholder}"
            )));
        }
    }
    Ok(())
}
