//! Prompt builders for file summaries, commit summaries, and answers.

use std::fmt::Write;

use crate::models::FileReference;

/// Bounded prefix of a file submitted for summarization, to control cost
/// and latency on large sources.
const MAX_SUMMARY_INPUT_CHARS: usize = 10_000;

/// Bounded prefix of a commit diff submitted for summarization.
const MAX_DIFF_INPUT_CHARS: usize = 20_000;

/// Bounded per-file source excerpt inside an answer context block.
const MAX_CONTEXT_SOURCE_CHARS: usize = 10_000;

/// Truncate to at most `max` bytes, backing up to a UTF-8 char boundary.
pub fn truncate_to_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Prompt for a ~100-word summary of one source file, aimed at onboarding a
/// newcomer to the codebase.
pub fn summarize_file(path: &str, content: &str) -> String {
    let excerpt = truncate_to_char_boundary(content, MAX_SUMMARY_INPUT_CHARS);
    format!(
        "You are a senior software engineer onboarding a junior engineer onto a codebase.\n\
         Explain the purpose of the file below in no more than 100 words, focusing on what\n\
         it does and how it fits into the project. Do not quote the code back.\n\n\
         File: {path}\n\
         ---\n\
         {excerpt}\n\
         ---\n\
         Summary:"
    )
}

/// Deterministic placeholder used when the model returns an empty summary.
pub fn fallback_summary(path: &str) -> String {
    format!("Source file {path}")
}

/// Prompt for a structured summary of a commit diff: affected files, what
/// changed, and the apparent purpose.
pub fn commit_summary(diff: &str) -> String {
    let excerpt = truncate_to_char_boundary(diff, MAX_DIFF_INPUT_CHARS);
    format!(
        "You are reviewing a Git commit. The unified diff below marks additions with `+`,\n\
         deletions with `-`, and groups related changes into hunks starting with `@@`.\n\
         Summarize the commit using exactly this structure:\n\
         - **Files Changed**: list the affected files.\n\
         - **Summary of Changes**: briefly describe what was added, removed, or modified.\n\
         - **Purpose or Context**: if the changes imply a clear goal (bug fix, feature,\n\
           refactor), state it; otherwise omit this section.\n\
         Be concise and factual; do not speculate beyond the diff.\n\n\
         ### Diff\n\
         {excerpt}"
    )
}

/// Concatenate retrieved files into the context block fed to the answer
/// prompt. Each file contributes its path, a bounded source excerpt, and
/// its stored summary.
pub fn build_context_block(references: &[FileReference]) -> String {
    if references.is_empty() {
        return "(No relevant files were found for this question.)\n".to_string();
    }

    let mut block = String::new();
    for r in references {
        let source = truncate_to_char_boundary(&r.source_code, MAX_CONTEXT_SOURCE_CHARS);
        write!(
            block,
            "source: {}\ncode content: {}\nsummary of file: {}\n\n",
            r.file_path, source, r.summary
        )
        .unwrap();
    }
    block
}

/// Prompt for answering a question strictly from the supplied context.
pub fn answer_question(context_block: &str, question: &str) -> String {
    format!(
        "You are an AI code assistant answering questions about a codebase for a technical\n\
         audience. Answer only from the context block below; never use outside knowledge\n\
         and never invent information. If the context does not contain the answer, say:\n\
         \"I'm sorry, but I don't have the answer to that question.\"\n\
         Answer in markdown, with code snippets where they help, giving step-by-step\n\
         detail when the question is about specific code.\n\n\
         START CONTEXT BLOCK\n\
         {context_block}\
         END OF CONTEXT BLOCK\n\n\
         START QUESTION\n\
         {question}\n\
         END OF QUESTION"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(path: &str, source: &str, summary: &str) -> FileReference {
        FileReference {
            file_path: path.to_string(),
            source_code: source.to_string(),
            summary: summary.to_string(),
            similarity: 0.9,
        }
    }

    #[test]
    fn test_truncate_short_input_unchanged() {
        assert_eq!(truncate_to_char_boundary("hello", 100), "hello");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 🌍 is 4 bytes; cutting at 8 would land mid-char
        let s = "Hello 🌍 world";
        let out = truncate_to_char_boundary(s, 8);
        assert!(out.is_char_boundary(out.len()));
        assert!(out.len() <= 8);
    }

    #[test]
    fn test_summarize_prompt_bounds_large_files() {
        let big = "x".repeat(50_000);
        let prompt = summarize_file("src/big.rs", &big);
        assert!(prompt.len() < 12_000);
        assert!(prompt.contains("src/big.rs"));
    }

    #[test]
    fn test_fallback_summary_is_deterministic() {
        assert_eq!(fallback_summary("a/b.rs"), fallback_summary("a/b.rs"));
        assert!(fallback_summary("a/b.rs").contains("a/b.rs"));
    }

    #[test]
    fn test_commit_prompt_names_all_sections() {
        let prompt = commit_summary("--- a/x.rs\n+++ b/x.rs\n@@ -1 +1 @@\n-old\n+new\n");
        assert!(prompt.contains("Files Changed"));
        assert!(prompt.contains("Summary of Changes"));
        assert!(prompt.contains("Purpose or Context"));
    }

    #[test]
    fn test_context_block_lists_every_reference() {
        let refs = vec![
            reference("src/a.rs", "fn a() {}", "does a"),
            reference("src/b.rs", "fn b() {}", "does b"),
        ];
        let block = build_context_block(&refs);
        assert!(block.contains("source: src/a.rs"));
        assert!(block.contains("source: src/b.rs"));
        assert!(block.contains("summary of file: does b"));
    }

    #[test]
    fn test_context_block_empty_has_placeholder() {
        let block = build_context_block(&[]);
        assert!(block.contains("No relevant files"));
    }

    #[test]
    fn test_answer_prompt_embeds_context_and_question() {
        let prompt = answer_question("ctx here\n", "How does auth work?");
        assert!(prompt.contains("ctx here"));
        assert!(prompt.contains("How does auth work?"));
        assert!(prompt.contains("START CONTEXT BLOCK"));
    }
}
