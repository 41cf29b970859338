pub mod elevenlabs;
pub mod huggingface;
pub mod openai;

pub use elevenlabs::ElevenLabsClient;
pub use huggingface::HuggingFaceClient;
pub use openai::OpenAiClient;
