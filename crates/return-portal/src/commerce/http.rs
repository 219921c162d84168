//! Response checks shared by every commerce API call.

use crate::workflows::returns::gateway::GatewayError;

const DEFAULT_RETRY_AFTER_SECS: u64 = 2;
const MAX_ERROR_BODY: usize = 512;

/// Map 429 and other non-success statuses onto [`GatewayError`].
pub(crate) async fn check_response(
    resp: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GatewayError::RateLimited {
            retry_after_secs: parse_retry_after(&resp),
        });
    }
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let mut message = resp.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        return Err(GatewayError::Api { status, message });
    }
    Ok(resp)
}

/// Seconds from `Retry-After`; the Admin API sends fractional values like "2.0".
fn parse_retry_after(resp: &reqwest::Response) -> u64 {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.ceil() as u64)
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

pub(crate) fn transport(err: reqwest::Error) -> GatewayError {
    GatewayError::Transport(err.to_string())
}

pub(crate) fn malformed(err: reqwest::Error) -> GatewayError {
    GatewayError::Malformed(err.to_string())
}
