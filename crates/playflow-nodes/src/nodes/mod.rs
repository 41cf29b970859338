pub mod chatgpt;
pub mod condition;
pub mod data;
pub mod integrations;
pub mod io;
pub mod javascript;
pub mod loops;
pub mod text;

pub use chatgpt::{ChatGptChatCompletionNode, ChatGptMessageNode};
pub use condition::{ConditionNode, JsonataConditionNode};
pub use data::JsonataDataBuilderNode;
pub use integrations::{ElevenLabsNode, HuggingFaceInferenceNode};
pub use io::{InputNode, OutputNode};
pub use javascript::JavaScriptFunctionNode;
pub use loops::{LoopFinishNode, LoopNode, LoopStartNode};
pub use text::{ConcatNode, TextTemplateNode};
