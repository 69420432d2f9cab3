use std::time::Duration;

use serde_json::json;
use studybot_common::Error;
use studybot_media::{SpeechHttpClient, SpeechToText, TextToSpeech, WhisperHttpClient};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn transcribe_parses_text_and_language() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "  what is a kubernetes pod  ",
            "language": "en"
        })))
        .mount(&mock_server)
        .await;

    let client = WhisperHttpClient::new(mock_server.uri(), Duration::from_secs(5));
    let transcript = client.transcribe(b"fake-audio").await.unwrap();

    assert_eq!(transcript.text, "what is a kubernetes pod");
    assert_eq!(transcript.language.as_deref(), Some("en"));
}

#[tokio::test]
async fn transcribe_backend_failure_is_transcription_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&mock_server)
        .await;

    let client = WhisperHttpClient::new(mock_server.uri(), Duration::from_secs(5));
    let err = client.transcribe(b"fake-audio").await.expect_err("should fail");

    match err {
        Error::Transcription(message) => assert!(message.contains("model not loaded")),
        other => panic!("expected Transcription, got {other}"),
    }
}

#[tokio::test]
async fn transcribe_timeout_is_transcription_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({"text": "late"})),
        )
        .mount(&mock_server)
        .await;

    let client = WhisperHttpClient::new(mock_server.uri(), Duration::from_millis(100));
    let err = client.transcribe(b"fake-audio").await.expect_err("should fail");
    assert!(matches!(err, Error::Transcription(_)));
}

#[tokio::test]
async fn synthesize_returns_audio_bytes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/synthesize"))
        .and(body_partial_json(json!({"text": "hello there"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "audio/mpeg")
                .set_body_bytes(vec![0xFF, 0xFB, 0x90, 0x00]),
        )
        .mount(&mock_server)
        .await;

    let client = SpeechHttpClient::new(mock_server.uri(), Duration::from_secs(5));
    let audio = client.synthesize("hello there").await.unwrap();

    assert_eq!(audio.bytes, vec![0xFF, 0xFB, 0x90, 0x00]);
    assert_eq!(audio.format, "mpeg");
}

#[tokio::test]
async fn synthesize_backend_failure_is_synthesis_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/synthesize"))
        .respond_with(ResponseTemplate::new(502).set_body_string("voice unavailable"))
        .mount(&mock_server)
        .await;

    let client = SpeechHttpClient::new(mock_server.uri(), Duration::from_secs(5));
    let err = client.synthesize("hello").await.expect_err("should fail");

    match err {
        Error::Synthesis(message) => assert!(message.contains("voice unavailable")),
        other => panic!("expected Synthesis, got {other}"),
    }
}

#[tokio::test]
async fn synthesize_empty_body_is_synthesis_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/synthesize"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(Vec::<u8>::new()))
        .mount(&mock_server)
        .await;

    let client = SpeechHttpClient::new(mock_server.uri(), Duration::from_secs(5));
    let err = client.synthesize("hello").await.expect_err("should fail");
    assert!(matches!(err, Error::Synthesis(_)));
}
