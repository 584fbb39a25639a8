use crate::models::{Chunk, GenerationMode, Retrieval};
use regex::Regex;
use std::sync::OnceLock;

/// Joins the text of the first `sample_chunks` chunks and caps it at `max_chars` characters.
pub fn sample_text(chunks: &[Chunk], sample_chunks: usize, max_chars: usize) -> String {
    let joined = chunks
        .iter()
        .take(sample_chunks)
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    truncate_chars(&joined, max_chars)
}

/// Plain prefix truncation on character boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => text[..byte_offset].to_string(),
        None => text.to_string(),
    }
}

pub fn qa_prompt(sample: &str) -> String {
    format!(
        "Generate 10 question and answer pairs strictly from the following text.
Do NOT invent anything beyond this text.

Text:
{sample}

Respond ONLY in this format:
Q1: ...
A1: ...
Q2: ...
A2: ...
...
Q10: ...
A10: ..."
    )
}

pub fn mcq_prompt(sample: &str) -> String {
    format!(
        "Generate 10 multiple choice questions (MCQs) strictly from the following text.
Each question should have 4 options (A-D).
Only one option must be correct.
Mark the correct answer clearly with (Correct).

Text:
{sample}

Respond ONLY in this format:
Q1: ...
A) ...
B) ...
C) ...
D) ...
Answer: (Correct: X)

Q2: ...
A) ...
B) ...
C) ...
D) ...
Answer: (Correct: Y)

...
Q10: ...
A) ...
B) ...
C) ...
D) ...
Answer: (Correct: Z)"
    )
}

pub fn content_prompt(mode: GenerationMode, sample: &str) -> String {
    match mode {
        GenerationMode::Qa => qa_prompt(sample),
        GenerationMode::Mcq => mcq_prompt(sample),
    }
}

/// Builds a prompt that restricts the answer to the retrieved passages.
pub fn answer_prompt(question: &str, retrievals: &[Retrieval]) -> String {
    let context = retrievals
        .iter()
        .map(|retrieval| format!("[p{}] {}", retrieval.chunk.page, retrieval.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Based only on the retrieved context below, answer the question.
You are a RAG assistant.
Do not add extra details beyond the context.

Context:
{context}

Question: {question}

Answer:"
    )
}

fn marker_regex() -> Option<&'static Regex> {
    static MARKER: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"([QA])\d+:")).as_ref().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    SeekingQuestion,
    AwaitingAnswer { start: usize },
    InAnswer { start: usize },
}

/// Keeps only the `Q<n>: ... A<n>: ...` blocks of a model response.
///
/// A block opens at a question marker, needs an answer marker, and runs up to
/// the next question marker or the end of the text. If nothing matches, the
/// trimmed input is returned as is.
pub fn clean_qa_output(raw: &str) -> String {
    let Some(markers) = marker_regex() else {
        return raw.trim().to_string();
    };
    let mut blocks: Vec<&str> = Vec::new();
    let mut state = ParseState::SeekingQuestion;

    for capture in markers.captures_iter(raw) {
        let (Some(whole), Some(kind)) = (capture.get(0), capture.get(1)) else {
            continue;
        };
        let is_question = kind.as_str() == "Q";

        state = match (state, is_question) {
            (ParseState::SeekingQuestion, true) => ParseState::AwaitingAnswer {
                start: whole.start(),
            },
            (ParseState::SeekingQuestion, false) => ParseState::SeekingQuestion,
            (ParseState::AwaitingAnswer { start }, false) => ParseState::InAnswer { start },
            (awaiting @ ParseState::AwaitingAnswer { .. }, true) => awaiting,
            (ParseState::InAnswer { start }, true) => {
                blocks.push(raw[start..whole.start()].trim());
                ParseState::AwaitingAnswer {
                    start: whole.start(),
                }
            }
            (in_answer @ ParseState::InAnswer { .. }, false) => in_answer,
        };
    }

    if let ParseState::InAnswer { start } = state {
        blocks.push(raw[start..].trim());
    }

    if blocks.is_empty() {
        return raw.trim().to_string();
    }
    blocks.join("\n\n")
}
