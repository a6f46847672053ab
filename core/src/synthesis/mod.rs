// Speech synthesis: provider client and request orchestration

pub mod client;
pub mod orchestrator;

pub use client::{
    AudioByteStream, OpenAiSpeechClient, SpeechAudio, SpeechRequest, SpeechSynthesizer,
    SynthesisError,
};
pub use orchestrator::{
    OrchestratorConfig, SynthesisOrchestrator, SynthesisOutcome, SynthesisRequest,
};
