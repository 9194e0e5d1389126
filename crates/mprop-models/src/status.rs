//! Worker status protocol.
//!
//! The worker reports on its combined output stream, one event per line:
//!
//! ```text
//! STAGE:<free text>
//! PROGRESS:<integer 0-100>
//! OUTPUT_PATH:<path>
//! ERROR:<text>
//! ```
//!
//! Any other line is diagnostic text. A recognized prefix followed by a payload
//! that does not parse is also diagnostic, never an error.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const STAGE_PREFIX: &str = "STAGE:";
pub const PROGRESS_PREFIX: &str = "PROGRESS:";
pub const OUTPUT_PATH_PREFIX: &str = "OUTPUT_PATH:";
pub const ERROR_PREFIX: &str = "ERROR:";

/// One decoded line of the worker's output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// Human-readable phase label, relayed verbatim
    Stage(String),
    /// Coarse completion percentage (0-100)
    Progress(u8),
    /// Resolved output location of the written masks
    OutputPath(PathBuf),
    /// Cause of a failure detected by the worker itself
    Fatal(String),
    /// Any uninterpreted line
    Diagnostic(String),
}

impl WorkerEvent {
    /// Classify one line of worker output.
    pub fn decode(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(text) = line.strip_prefix(STAGE_PREFIX) {
            return WorkerEvent::Stage(text.to_string());
        }

        if let Some(value) = line.strip_prefix(PROGRESS_PREFIX) {
            return match value.trim().parse::<u8>() {
                Ok(percent) if percent <= 100 => WorkerEvent::Progress(percent),
                _ => WorkerEvent::Diagnostic(line.to_string()),
            };
        }

        if let Some(path) = line.strip_prefix(OUTPUT_PATH_PREFIX) {
            let path = path.trim();
            if path.is_empty() {
                return WorkerEvent::Diagnostic(line.to_string());
            }
            return WorkerEvent::OutputPath(PathBuf::from(path));
        }

        if let Some(text) = line.strip_prefix(ERROR_PREFIX) {
            return WorkerEvent::Fatal(text.trim().to_string());
        }

        WorkerEvent::Diagnostic(line.to_string())
    }

    /// Encode as a single protocol line (no trailing newline).
    ///
    /// Embedded line breaks are flattened so one event stays one line.
    pub fn encode(&self) -> String {
        match self {
            WorkerEvent::Stage(text) => format!("{}{}", STAGE_PREFIX, single_line(text)),
            WorkerEvent::Progress(percent) => format!("{}{}", PROGRESS_PREFIX, (*percent).min(100)),
            WorkerEvent::OutputPath(path) => {
                format!("{}{}", OUTPUT_PATH_PREFIX, single_line(&path.to_string_lossy()))
            }
            WorkerEvent::Fatal(text) => format!("{}{}", ERROR_PREFIX, single_line(text)),
            WorkerEvent::Diagnostic(text) => single_line(text),
        }
    }

    /// Whether the line carried a protocol event rather than diagnostic text.
    pub fn is_protocol(&self) -> bool {
        !matches!(self, WorkerEvent::Diagnostic(_))
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_prefixes() {
        assert_eq!(
            WorkerEvent::decode("STAGE:Loading Model..."),
            WorkerEvent::Stage("Loading Model...".to_string())
        );
        assert_eq!(WorkerEvent::decode("PROGRESS:42\n"), WorkerEvent::Progress(42));
        assert_eq!(
            WorkerEvent::decode("OUTPUT_PATH:/out/mask.%04d.png\r\n"),
            WorkerEvent::OutputPath(PathBuf::from("/out/mask.%04d.png"))
        );
        assert_eq!(
            WorkerEvent::decode("ERROR: No parameters provided"),
            WorkerEvent::Fatal("No parameters provided".to_string())
        );
    }

    #[test]
    fn test_stage_text_is_verbatim() {
        assert_eq!(
            WorkerEvent::decode("STAGE: Frame 3/10 (30%) "),
            WorkerEvent::Stage(" Frame 3/10 (30%) ".to_string())
        );
    }

    #[test]
    fn test_malformed_payloads_are_diagnostic() {
        for line in ["PROGRESS:abc", "PROGRESS:101", "PROGRESS:-1", "OUTPUT_PATH:  "] {
            assert_eq!(
                WorkerEvent::decode(line),
                WorkerEvent::Diagnostic(line.to_string()),
                "line {:?}",
                line
            );
        }
    }

    #[test]
    fn test_other_lines_are_diagnostic() {
        let line = "[worker] torch 2.4.0, CUDA: True";
        assert_eq!(WorkerEvent::decode(line), WorkerEvent::Diagnostic(line.to_string()));
        // Prefixes are case sensitive and anchored at the line start.
        assert!(!WorkerEvent::decode("stage:lower").is_protocol());
        assert!(!WorkerEvent::decode(" STAGE:indented").is_protocol());
    }

    #[test]
    fn test_encode_matches_decode() {
        let events = [
            WorkerEvent::Stage("Propagating Masks...".to_string()),
            WorkerEvent::Progress(100),
            WorkerEvent::OutputPath(PathBuf::from("/out/m.%04d.png")),
            WorkerEvent::Fatal("boom".to_string()),
        ];
        for event in events {
            assert_eq!(WorkerEvent::decode(&event.encode()), event);
        }
    }

    #[test]
    fn test_encode_flattens_newlines() {
        let line = WorkerEvent::Fatal("first\nsecond".to_string()).encode();
        assert_eq!(line, "ERROR:first second");
    }
}
