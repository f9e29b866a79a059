pub mod error;
pub mod gemini;
pub mod openai;
pub mod util;

pub use error::{AiError, Result};
pub use gemini::{Gemini, GEMINI_FLASH_MODEL};
pub use openai::{OpenAi, DEEPSEEK_API_URL, DEEPSEEK_CHAT_MODEL};
pub use util::{extract_json_object, strip_code_blocks, truncate_to_char_boundary};
