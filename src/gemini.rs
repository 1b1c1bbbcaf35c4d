use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conversation payload accepted on /api/chat
///
/// `contents` is forwarded to the provider as-is; the provider owns its own
/// schema validation. `systemInstruction` is optional and omitted from the
/// upstream request entirely when absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub contents: Vec<Value>,
    #[serde(default)]
    pub system_instruction: Option<String>,
}

/// Gemini generateContent request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One streamed generateContent frame
#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

/// Build the upstream request from the client payload. The system
/// instruction, when present, is wrapped in the parts envelope Gemini
/// expects: { "parts": [{ "text": ... }] }.
pub fn build_upstream_request(req: ChatRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: req.contents,
        system_instruction: req.system_instruction.map(|text| SystemInstruction {
            parts: vec![Part { text }],
        }),
    }
}

/// Extract the text fragment carried by one streamed frame.
///
/// Returns None for frames with no candidate text (safety blocks,
/// usage-metadata-only frames); those produce no chunk downstream.
pub fn fragment_text(resp: &GenerateContentResponse) -> Option<String> {
    let content = resp.candidates.first()?.content.as_ref()?;
    let text: String = content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// SSE streaming endpoint for a model.
pub fn stream_url(api_base: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
        api_base.trim_end_matches('/'),
        model
    )
}
