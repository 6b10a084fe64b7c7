use std::fs;
use std::path::Path;
use log::info;
use thiserror::Error;

pub const DEFAULT_SYSTEM_PROMPT: &str = "
You are a helpful ticket booking assistant that helps users book tickets for various events and appointments.
You can handle bookings for:
1. Doctor appointments
2. Amusement park tickets
3. Movie tickets
4. Concert tickets
5. Sports events
6. And other similar bookings

For each booking request:
1. Collect all necessary information (date, time, number of tickets, preferences, etc.)
2. Confirm the details with the user
3. Process the booking and provide a confirmation number

If the user doesn't specify what type of booking they want, ask them politely.
Always be helpful, friendly, and concise in your responses.

When a booking is confirmed, generate a fake confirmation number in the format: BOOK-XXXX-XXXX where X is an alphanumeric character.
";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt file IO error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Prompt file '{0}' is empty")]
    Empty(String),
}

/// Returns the system instruction, read from `path` when one is given.
pub fn load_system_prompt(path: Option<&str>) -> Result<String, PromptError> {
    let Some(path) = path else {
        return Ok(DEFAULT_SYSTEM_PROMPT.to_string());
    };

    let text = fs::read_to_string(Path::new(path)).map_err(|source| PromptError::Io {
        path: path.to_string(),
        source,
    })?;
    if text.trim().is_empty() {
        return Err(PromptError::Empty(path.to_string()));
    }

    info!("Loaded system prompt from '{}' ({} bytes)", path, text.len());
    Ok(text)
}
