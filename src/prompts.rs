//! Prompts for LLM-based slide enhancement.
//!
//! Every prompt lives here so wording changes never touch retry or
//! error-handling code, and so tests can inspect prompts without a provider.
//!
//! Callers can override the system prompt via
//! [`crate::config::ConversionConfig::system_prompt`]; the per-slide user
//! prompt is always built by [`slide_prompt`].

use crate::pipeline::llm::EnhanceRequest;

/// Default system prompt for turning one slide into an eBook section.
///
/// The chapter heading and slide title are placed by the assembler, so the
/// model is told not to repeat them.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an experienced technical writer turning presentation slides into a readable eBook.

For each slide you receive, write the section of the book that covers it.

Follow these rules precisely:

1. CONTENT
   - Expand bullet points into full, coherent paragraphs
   - Add context, explanations and smooth transitions between ideas
   - Keep every fact from the slide; do not invent data, names or numbers
   - Do not repeat the same information multiple times

2. STRUCTURE
   - Do NOT write the chapter heading or the slide title; they are added for you
   - Use ### for sub-sections and #### for minor headings, only when the material needs them
   - Use - for lists that must stay lists; prefer prose otherwise

3. TONE
   - Professional and educational, written for a reader without the slides
   - When the slide has images, refer to them naturally ("as the figure shows")

4. OUTPUT FORMAT
   - Output ONLY the section text in Markdown
   - Do NOT wrap the output in ```markdown fences
   - Do NOT start with "Here is", "Of course" or any other preamble
   - Start directly with the content"#;

/// Build the per-slide user message.
pub fn slide_prompt(req: &EnhanceRequest<'_>) -> String {
    let mut prompt = format!(
        "Book: {}\nChapter {} (slide {} of {} in this chapter)\n",
        req.deck_title, req.chapter_number, req.position, req.chapter_len
    );
    if !req.slide_title.trim().is_empty() {
        prompt.push_str(&format!("Slide title: {}\n", req.slide_title.trim()));
    }
    prompt.push_str("\nSlide content:\n");
    if req.text.trim().is_empty() {
        prompt.push_str("(no body text; write a short section introducing the title)\n");
    } else {
        prompt.push_str(req.text.trim());
        prompt.push('\n');
    }
    if req.image_count > 0 {
        prompt.push_str(&format!(
            "\nThis slide has {} image(s) that will appear right after your text.\n",
            req.image_count
        ));
    }
    prompt
}
