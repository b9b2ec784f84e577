//! services/api/src/adapters/prompt.rs
//!
//! Renders a `GenerationRequest` into the instruction text sent to the model.

use rc_practice_core::domain::{GenerationRequest, QUESTIONS_PER_PASSAGE};

const OUTPUT_CONTRACT: &str = r#"OUTPUT JSON format ONLY:
{
    "passage_title": "A short, abstract title",
    "extracted_text": "The full passage text, paragraphs separated by blank lines",
    "questions": [
        {
            "id": 1,
            "question_text": "...",
            "options": ["Option A", "Option B", "Option C", "Option D"],
            "correct_option_index": 0,
            "explanation": "Why the correct option is correct."
        }
    ]
}"#;

const EXTRACT_INSTRUCTION: &str = "FIRST, analyze the provided raw text (which may contain noise, ads, or other news) and EXTRACT ONLY the main editorial or opinion piece. If there are several, pick the most abstract one.";

const VERBATIM_INSTRUCTION: &str = "Use the provided text exactly as is.";

const DEFAULT_TOPICS: &str = "Philosophy, Economics, Art History, or Sociology";

pub fn render_prompt(request: &GenerationRequest) -> String {
    let question_mix = format!(
        "Generate {} questions with tricky, closely-worded options: Main Idea, Inference, Critical Reasoning (which statement weakens the argument), and Tone/Structure. Every question has exactly 4 options.",
        QUESTIONS_PER_PASSAGE
    );

    match request.source_text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => {
            let input = if request.auto_extract {
                EXTRACT_INSTRUCTION
            } else {
                VERBATIM_INSTRUCTION
            };
            format!(
                "Act as a strict reading-comprehension exam setter.\nINPUT CONTEXT: {input}\nTASK: Build a reading comprehension set on that passage. {question_mix}\n{OUTPUT_CONTRACT}\nRAW INPUT TEXT:\n{text}"
            )
        }
        _ => {
            let style = match request.style_source.as_deref() {
                Some(source) => format!(
                    "Write the passage mimicking the editorial style, vocabulary, complexity and tone of \"{}\".",
                    source
                ),
                None => "Write the passage in the style of a serious newspaper editorial.".to_string(),
            };
            format!(
                "Act as a strict reading-comprehension exam setter.\nTASK: Write an original passage of 400-500 words on a complex topic ({DEFAULT_TOPICS}). {style}\nTHEN: {question_mix}\n{OUTPUT_CONTRACT}"
            )
        }
    }
}
