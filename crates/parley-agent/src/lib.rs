pub mod accumulator;
pub mod backends;
pub mod config;
pub mod framing;
pub mod llm;
pub mod runner;
pub mod stream;

pub use accumulator::{collect_turn, AssistantTurn, NoopObserver, TurnAccumulator, TurnObserver};
pub use backends::{ChatRequest, LlmBackend, ProtocolAdapter};
pub use config::{LlmProvider, ModelConfig, UnknownToolPolicy, WireFormat};
pub use framing::{decode_stream, LineBuffer, MalformedFrame, StreamDecoder};
pub use llm::LlmClient;
pub use runner::ConversationRunner;
pub use stream::{FinishReason, StreamEvent};
pub use tokio_util::sync::CancellationToken;
