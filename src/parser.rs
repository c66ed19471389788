//! Splits a model reply into a reasoning segment and an answer segment.
//!
//! The system instruction below asks the model to wrap its deliberation in
//! `<thinking>` and its reply in `<conversation>`. The parser and the prompt
//! are a matched pair: changing a tag name in one means changing the other.

use crate::models::ParsedResponse;
use once_cell::sync::Lazy;
use regex::Regex;

pub const REASONING_TAG: &str = "thinking";
pub const ANSWER_TAG: &str = "conversation";

static REASONING_RE: Lazy<Regex> = Lazy::new(|| tag_pattern(REASONING_TAG));
static ANSWER_RE: Lazy<Regex> = Lazy::new(|| tag_pattern(ANSWER_TAG));

// Case-insensitive, `.` spans newlines, lazy body so the first close tag wins.
fn tag_pattern(tag: &str) -> Regex {
    let pattern = format!(r"(?is)<{tag}>(.*?)</{tag}>", tag = regex::escape(tag));
    Regex::new(&pattern).expect("invalid tag pattern")
}

fn extract(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Parses the full reply text. Missing reasoning yields an empty string;
/// a missing answer region makes the entire input the answer, unmodified.
pub fn parse_response(text: &str) -> ParsedResponse {
    let reasoning = extract(&REASONING_RE, text).unwrap_or_default();
    match extract(&ANSWER_RE, text) {
        Some(answer) => ParsedResponse {
            reasoning,
            answer,
            used_fallback: false,
        },
        None => {
            log::debug!("No <{}> section in model reply, using the whole text", ANSWER_TAG);
            ParsedResponse {
                reasoning,
                answer: text.to_string(),
                used_fallback: true,
            }
        }
    }
}

pub const SYSTEM_PROMPT: &str = r#"
You are an empathetic and supportive therapeutic companion. Speak directly to the person as if you're having a warm, caring conversation. Your approach should be:

<thinking>
- Listen carefully to what they're sharing
- Understand their emotions and experiences
- Consider how best to support them
- Keep responses warm and understanding
- Show genuine care and validation
- Offer gentle suggestions when appropriate
</thinking>

<conversation>
Structure your response with clear bullet points and spacing:

• Start with a warm, personal greeting...

• Share your understanding of their situation
  - Validate their feelings
  - Show empathy for their experience

• Offer gentle suggestions or ideas:
  1. First supportive idea
  2. Second supportive idea

• Add words of encouragement

• End with an open invitation to continue talking

Remember to:
- Add a blank line after each main bullet point
- Keep the tone warm and personal
- Use "you" and "I" to make it conversational
- Be genuine and compassionate
- Format numbered lists with clear spacing
</conversation>
"#;

/// Concatenates the system instruction, optional context, and the user's
/// input, always in that order.
pub fn build_prompt(user_prompt: &str, context_info: Option<&str>) -> String {
    match context_info.filter(|ctx| !ctx.trim().is_empty()) {
        Some(ctx) => format!(
            "{}\n\nContext information: {}\n\nUser question: {}",
            SYSTEM_PROMPT, ctx, user_prompt
        ),
        None => format!("{}\n\nUser question: {}", SYSTEM_PROMPT, user_prompt),
    }
}
