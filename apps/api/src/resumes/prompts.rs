// Resume parsing prompt. Static template; the resume text is sent as the user message.

use crate::llm_client::Prompt;
use crate::resumes::models::TARGET_FIELDS;

pub const RESUME_PARSE_INSTRUCTIONS: &str = r#"You are a resume parser. Extract the following information from the given resume text:
- Full Name (First Name and Last Name)
- Email
- Phone (include country code if available, default to +91)
- Location
- Years of Experience

Return only a valid JSON object.
Do not include any extra text, explanation, or markdown."#;

/// Instructions followed by the expected object shape, one key per target field.
pub fn system_prompt() -> String {
    let shape = TARGET_FIELDS
        .iter()
        .map(|field| format!("  \"{field}\": \"...\""))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("{RESUME_PARSE_INSTRUCTIONS}\n\nRespond with:\n{{\n{shape}\n}}")
}

/// Builds the parse request for one resume.
pub fn build_prompt(resume_text: &str) -> Prompt {
    Prompt {
        system: system_prompt(),
        user: resume_text.to_string(),
    }
}
