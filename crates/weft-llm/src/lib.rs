pub mod limiter;
pub mod providers;

use weft_core::config::ModelConfig;
use weft_core::traits::LlmClient;

pub use limiter::RateLimiter;
pub use providers::azure::AzureClient;
pub use providers::openai::OpenAiClient;

/// Create an LLM client based on the provider name.
pub fn create_client(config: &ModelConfig) -> Box<dyn LlmClient> {
    match config.provider.as_str() {
        "azure" => Box::new(AzureClient::new()),
        // Everything else uses the OpenAI-compatible client
        _ => Box::new(OpenAiClient::new()),
    }
}
