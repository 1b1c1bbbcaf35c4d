use axum::{
    body::Body,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};

use crate::state::RelayState;

/// Multipart field name carrying the optional file attachment.
pub const FILE_FIELD: &str = "file-attachment";

/// Form relay failure. The caller-visible body stays generic; the detail goes
/// to the server log only.
#[derive(Debug)]
pub struct FormError {
    status: StatusCode,
}

impl FormError {
    fn internal(detail: impl AsRef<str>) -> Self {
        error!("❌ submit-quote failed: {}", detail.as_ref());
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn too_large(size: usize, cap: usize) -> Self {
        warn!("⚠️  submit-quote attachment rejected: {} bytes exceeds cap of {}", size, cap);
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        let body = self
            .status
            .canonical_reason()
            .unwrap_or("Internal Server Error");
        (self.status, body.to_string()).into_response()
    }
}

/// POST /api/submit-quote — rebuild the inbound multipart form and forward it
/// verbatim to the configured form handler, relaying its status and body.
pub async fn submit_quote_handler(
    State(state): State<RelayState>,
    mut multipart: Multipart,
) -> Result<Response, FormError> {
    let endpoint = state
        .config
        .form_endpoint
        .as_deref()
        .ok_or_else(|| FormError::internal("WORDPRESS_API_ENDPOINT is not configured"))?
        .to_string();

    let mut form = reqwest::multipart::Form::new();
    let mut field_count = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FormError::internal(format!("failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        field_count += 1;

        if name == FILE_FIELD {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| FormError::internal(format!("failed to read attachment: {}", e)))?;

            let cap = state.config.max_upload_bytes;
            if data.len() > cap {
                return Err(FormError::too_large(data.len(), cap));
            }

            info!(
                "📎 forwarding attachment {:?} ({} bytes)",
                file_name.as_deref().unwrap_or("unnamed"),
                data.len()
            );

            let mut part = reqwest::multipart::Part::bytes(data.to_vec());
            if let Some(file_name) = file_name {
                part = part.file_name(file_name);
            }
            if let Some(content_type) = content_type {
                part = part
                    .mime_str(&content_type)
                    .map_err(|e| FormError::internal(format!("invalid attachment content type: {}", e)))?;
            }
            form = form.part(name, part);
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| FormError::internal(format!("failed to read field '{}': {}", name, e)))?;
            form = form.text(name, value);
        }
    }

    info!("📨 forwarding quote submission ({} field(s))", field_count);

    let response = state
        .client
        .post(&endpoint)
        .multipart(form)
        .send()
        .await
        .map_err(|e| FormError::internal(format!("upstream request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| FormError::internal(format!("failed to read upstream response: {}", e)))?;

    info!("📬 form handler responded: {}", status);

    // Relay status and body unchanged.
    Response::builder()
        .status(status)
        .body(Body::from(body))
        .map_err(|e| FormError::internal(format!("failed to build response: {}", e)))
}
