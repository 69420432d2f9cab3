use std::sync::Arc;

use serde_json::json;
use studybot_agents::{Orchestrator, TurnOutcome};
use studybot_common::TurnRole;
use studybot_config::AppConfig;
use studybot_db::ContextStore;
use tokio::sync::Mutex;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(completion: &MockServer, tools: &MockServer, audio: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.completion.base_url = completion.uri();
    config.completion.model = "llama3".to_string();
    config.tools.base_url = tools.uri();
    config.audio.stt_url = audio.uri();
    config.audio.tts_url = audio.uri();
    config
}

fn tool_call_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "model": "llama3",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "search",
                        "arguments": "{\"query\": \"kubernetes pod definition\"}"
                    }
                }]
            },
            "finish_reason": "tool_calls"
        }]
    }))
}

fn final_answer_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-2",
        "model": "llama3",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    }))
}

#[tokio::test]
async fn text_turn_round_trips_through_real_http_boundaries() {
    let completion_server = MockServer::start().await;
    let tool_server = MockServer::start().await;
    let audio_server = MockServer::start().await;

    // First completion call requests the search tool, the second answers.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(tool_call_response())
        .up_to_n_times(1)
        .mount(&completion_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(final_answer_response(
            "A pod is the smallest deployable unit in Kubernetes.",
        ))
        .mount(&completion_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/tools/call"))
        .and(body_partial_json(json!({"name": "search"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"question": "What is a Kubernetes pod?",
             "answer": "The smallest deployable unit.",
             "score": 0.93}
        ])))
        .mount(&tool_server)
        .await;

    let config = config_for(&completion_server, &tool_server, &audio_server);
    let store = Arc::new(Mutex::new(ContextStore::in_memory().unwrap()));
    let session_id = {
        let store = store.lock().await;
        let user = store.create_user("e2e").unwrap();
        store.create_session(&user.user_id, None).unwrap().session_id
    };

    let orchestrator = Orchestrator::from_config(&config, store.clone());
    let reply = orchestrator
        .process_turn(&session_id, "What is a Kubernetes pod?")
        .await
        .unwrap();

    assert_eq!(reply.outcome, TurnOutcome::Completed);
    assert!(reply.text.contains("smallest deployable unit"));

    let window = store.lock().await.read_window(&session_id, 100).unwrap();
    assert_eq!(window.len(), 3);
    assert_eq!(window[0].role, TurnRole::User);
    assert_eq!(window[1].role, TurnRole::ToolInvocation);
    assert!(window[1].is_paired());
    assert_eq!(window[2].role, TurnRole::Assistant);
}

#[tokio::test]
async fn audio_turn_transcribes_processes_and_synthesizes() {
    let completion_server = MockServer::start().await;
    let tool_server = MockServer::start().await;
    let audio_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(final_answer_response("Ownership is Rust's memory model."))
        .mount(&completion_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "explain ownership",
            "language": "en"
        })))
        .mount(&audio_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/synthesize"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "audio/mpeg")
                .set_body_bytes(vec![0xFF, 0xFB, 0x00, 0x11]),
        )
        .mount(&audio_server)
        .await;

    let config = config_for(&completion_server, &tool_server, &audio_server);
    let store = Arc::new(Mutex::new(ContextStore::in_memory().unwrap()));
    let session_id = {
        let store = store.lock().await;
        let user = store.create_user("e2e-audio").unwrap();
        store.create_session(&user.user_id, None).unwrap().session_id
    };

    // A short WAV clip; content does not matter, the STT backend is mocked.
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..8_000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    let audio = cursor.into_inner();

    let orchestrator = Orchestrator::from_config(&config, store.clone());
    let reply = orchestrator
        .process_audio_turn(&session_id, &audio, true)
        .await
        .unwrap();

    assert_eq!(reply.transcript, "explain ownership");
    assert!(reply.reply.text.contains("Ownership"));
    let synthesized = reply.audio.expect("synthesized reply requested");
    assert_eq!(synthesized.bytes, vec![0xFF, 0xFB, 0x00, 0x11]);

    // The persisted transcript is the text exchange.
    let window = store.lock().await.read_window(&session_id, 100).unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(window[0].content, "explain ownership");
}
