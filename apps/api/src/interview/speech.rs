//! Speech contract for one turn.
//!
//! Recognition and synthesis run in the browser. The server keeps the state
//! that has to survive reloads: which audio channel is active and the
//! transcript the user is building for the current question.

use serde::{Deserialize, Serialize};

/// Playback and capture never run at the same time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioChannel {
    #[default]
    Idle,
    Speaking,
    Listening,
}

/// How answer text is being captured after a capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Speech,
    Manual,
}

/// One result delivered by the recognizer. Interim results are replaced by
/// later ones; final results are committed.
#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionSegment {
    pub text: String,
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptBuffer {
    committed: String,
    interim: String,
}

impl TranscriptBuffer {
    /// Final text is appended to the committed buffer. Interim text only ever
    /// replaces the previous interim text.
    pub fn apply(&mut self, segment: &RecognitionSegment) {
        if segment.is_final {
            let text = segment.text.trim();
            if !text.is_empty() {
                if !self.committed.is_empty() && !self.committed.ends_with(char::is_whitespace) {
                    self.committed.push(' ');
                }
                self.committed.push_str(text);
            }
            self.interim.clear();
        } else {
            self.interim = segment.text.clone();
        }
    }

    /// A manual edit replaces everything, including pending interim text.
    pub fn replace(&mut self, text: String) {
        self.committed = text;
        self.interim.clear();
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    pub fn interim(&self) -> &str {
        &self.interim
    }

    /// What the answer box shows: committed text followed by the live guess.
    pub fn display(&self) -> String {
        match (self.committed.is_empty(), self.interim.trim().is_empty()) {
            (_, true) => self.committed.clone(),
            (true, false) => self.interim.trim().to_string(),
            (false, false) => format!("{} {}", self.committed.trim_end(), self.interim.trim()),
        }
    }

    /// Returns the committed answer and empties the buffer for the next turn.
    pub fn take(&mut self) -> String {
        self.interim.clear();
        std::mem::take(&mut self.committed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechState {
    /// Reported by the client when the session is created.
    pub recognition_supported: bool,
    pub channel: AudioChannel,
    pub transcript: TranscriptBuffer,
}

impl SpeechState {
    pub fn new(recognition_supported: bool) -> Self {
        Self {
            recognition_supported,
            ..Default::default()
        }
    }

    /// Starting playback cancels any capture in progress.
    pub fn start_playback(&mut self) {
        self.channel = AudioChannel::Speaking;
    }

    pub fn stop_playback(&mut self) {
        if self.channel == AudioChannel::Speaking {
            self.channel = AudioChannel::Idle;
        }
    }

    /// Starting capture cancels playback. Without recognition support the
    /// turn falls back to typing and the channel stays idle.
    pub fn start_capture(&mut self) -> CaptureMode {
        if !self.recognition_supported {
            if self.channel == AudioChannel::Speaking {
                self.channel = AudioChannel::Idle;
            }
            return CaptureMode::Manual;
        }
        self.channel = AudioChannel::Listening;
        CaptureMode::Speech
    }

    /// Stopping capture keeps committed text and drops the unfinished guess.
    pub fn stop_capture(&mut self) {
        if self.channel == AudioChannel::Listening {
            self.channel = AudioChannel::Idle;
        }
        self.transcript.interim.clear();
    }

    /// Returns how many segments were accepted. Results that arrive after
    /// capture stopped are stale and ignored.
    pub fn record(&mut self, segments: &[RecognitionSegment]) -> usize {
        if self.channel != AudioChannel::Listening {
            return 0;
        }
        for segment in segments {
            self.transcript.apply(segment);
        }
        segments.len()
    }

    /// Silences both channels and hands back the committed answer.
    pub fn finish_turn(&mut self) -> String {
        self.channel = AudioChannel::Idle;
        self.transcript.take()
    }
}
