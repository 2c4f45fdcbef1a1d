pub mod parse;
pub mod prompt;
pub mod window;

pub use parse::{extract_answer, extract_json_value, parse_json_array, parse_json_object};
pub use prompt::{data_uri, Prompt, PromptBlock, TokenBudget, IMAGE_MIME};
pub use window::{quoted_list, shared_range, SensorWindow, TaskMetadata};
