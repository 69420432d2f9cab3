pub mod cleanup;
pub mod http;
pub mod probe;
pub mod speech;

pub use cleanup::clean_for_speech;
pub use http::{SpeechHttpClient, WhisperHttpClient};
pub use speech::{
    AudioTurnAdapter, SpeechToText, SynthesizedAudio, TextToSpeech, Transcript,
};
