use serde::Serialize;

/// One record of the NDJSON stream protocol spoken to the client.
///
/// A well-formed stream is zero or more `Chunk` lines followed by exactly one
/// terminal line, either `End` or `Error`. Nothing follows a terminal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A non-empty text fragment produced by the upstream model.
    Chunk(String),
    /// Natural end of the stream.
    End,
    /// The stream failed after the response had already started.
    Error(String),
}

// Wire shape: {"type": ..., "data": ...}. The data key is always present,
// null for the end record.
#[derive(Serialize)]
struct WireEvent<'a> {
    r#type: &'a str,
    data: Option<&'a str>,
}

impl StreamEvent {
    /// Serialize to a single newline-terminated NDJSON line.
    pub fn to_line(&self) -> String {
        let wire = match self {
            StreamEvent::Chunk(text) => WireEvent {
                r#type: "chunk",
                data: Some(text),
            },
            StreamEvent::End => WireEvent {
                r#type: "end",
                data: None,
            },
            StreamEvent::Error(message) => WireEvent {
                r#type: "error",
                data: Some(message),
            },
        };

        // WireEvent serialization cannot fail (strings only), but avoid
        // panicking in the response path regardless.
        let mut line = serde_json::to_string(&wire)
            .unwrap_or_else(|_| r#"{"type":"error","data":"event serialization failed"}"#.into());
        line.push('\n');
        line
    }
}
