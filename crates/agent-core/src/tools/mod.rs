//! Built-in Capabilities

mod calculator;
mod current_time;
mod final_answer;
mod web_search;

pub use calculator::CalculatorTool;
pub use current_time::CurrentTimeTool;
pub use final_answer::{FINAL_ANSWER_ARGUMENT, FINAL_ANSWER_TOOL, FinalAnswerTool};
pub use web_search::WebSearchTool;
