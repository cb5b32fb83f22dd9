// Resume parsing: prompt, response repair, retrying pipeline and HTTP handlers.
// All LLM calls go through llm_client; nothing here talks to the provider directly.

pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod repair;
