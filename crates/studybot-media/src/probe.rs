use std::io::Cursor;

/// Duration of a WAV input in seconds, or `None` when the input is not
/// parseable WAV. Non-WAV formats fall back to the byte-size ceiling in
/// the adapter.
pub fn wav_duration_secs(bytes: &[u8]) -> Option<f64> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    // duration() counts inter-channel samples.
    Some(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

/// Cheap signature check for the formats the transcription backends
/// accept: WAV, MP3, OGG, FLAC, and WebM.
pub fn looks_like_audio(bytes: &[u8]) -> bool {
    if bytes.len() < 4 {
        return false;
    }
    if bytes.starts_with(b"RIFF") && bytes.len() >= 12 && &bytes[8..12] == b"WAVE" {
        return true;
    }
    if bytes.starts_with(b"ID3") {
        return true;
    }
    // Bare MP3 frame sync: eleven set bits.
    if bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0 {
        return true;
    }
    if bytes.starts_with(b"OggS") || bytes.starts_with(b"fLaC") {
        return true;
    }
    // EBML header (WebM/Matroska).
    bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3])
}
