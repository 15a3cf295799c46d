//! WebSocket handler for real-time job updates.
//!
//! Authenticates before upgrading so bad credentials get a proper HTTP 401
//! instead of an open socket. Browsers cannot set headers on WebSocket
//! requests, so a `?token=` query parameter is accepted alongside the usual
//! Authorization header. Each session only receives events for the
//! authenticated user's jobs.

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::Message;
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::verify_access_token;
use crate::config::Config;
use crate::error::ErrorResponse;
use crate::services::EventBroadcaster;

/// Ping interval for keeping connections alive.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Timeout for receiving pong response.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

fn query_token(req: &HttpRequest) -> Option<String> {
    req.query_string().split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "token" && !value.is_empty() {
            urlencoding::decode(value).ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

/// Upgrade to a WebSocket and stream the caller's job events.
pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    broadcaster: web::Data<EventBroadcaster>,
    config: web::Data<Config>,
) -> Result<HttpResponse, actix_web::Error> {
    let token = bearer_token(&req).or_else(|| query_token(&req));
    let claims = token.and_then(|t| verify_access_token(&t, &config.jwt).ok());

    let user_id = match claims {
        Some(claims) => claims.user_id,
        None => {
            warn!(
                client = %req.connection_info().realip_remote_addr().unwrap_or("unknown"),
                "WebSocket authentication failed"
            );
            return Ok(HttpResponse::Unauthorized().json(ErrorResponse {
                error: "UNAUTHORIZED".to_string(),
                message: "Invalid or expired token".to_string(),
            }));
        }
    };

    let client_addr = req
        .connection_info()
        .realip_remote_addr()
        .map(String::from)
        .unwrap_or_else(|| "unknown".to_string());

    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;

    info!(client = %client_addr, user_id = %user_id, "WebSocket connection established");

    actix_web::rt::spawn(handle_websocket_connection(
        session,
        msg_stream,
        broadcaster.get_ref().clone(),
        user_id,
        client_addr,
    ));

    Ok(response)
}

/// Drive one WebSocket connection until it closes.
async fn handle_websocket_connection(
    mut session: actix_ws::Session,
    mut msg_stream: actix_ws::MessageStream,
    broadcaster: EventBroadcaster,
    user_id: Uuid,
    client_addr: String,
) {
    let mut rx = broadcaster.subscribe();

    let mut last_pong = Instant::now();
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);

    loop {
        tokio::select! {
            Some(msg_result) = msg_stream.next() => {
                match msg_result {
                    Ok(msg) => {
                        match msg {
                            Message::Ping(bytes) => {
                                if session.pong(&bytes).await.is_err() {
                                    break;
                                }
                            }
                            Message::Pong(_) => {
                                last_pong = Instant::now();
                            }
                            Message::Text(text) => {
                                debug!(client = %client_addr, message = %text, "Received text message");
                            }
                            Message::Close(reason) => {
                                info!(client = %client_addr, reason = ?reason, "Client requested close");
                                break;
                            }
                            _ => {}
                        }
                    }
                    Err(e) => {
                        warn!(client = %client_addr, error = %e, "WebSocket message error");
                        break;
                    }
                }
            }

            event_result = rx.recv() => {
                match event_result {
                    Ok(message) => {
                        if message.event.user_id() != user_id {
                            continue;
                        }
                        match serde_json::to_string(&message) {
                            Ok(json) => {
                                if session.text(json).await.is_err() {
                                    warn!(client = %client_addr, "Failed to send event, closing connection");
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize event");
                            }
                        }
                    }
                    Err(RecvError::Lagged(count)) => {
                        warn!(client = %client_addr, missed = count, "Client lagged, missed events");
                        // Keep going, the client still gets future events.
                    }
                    Err(RecvError::Closed) => {
                        info!(client = %client_addr, "Broadcast channel closed");
                        break;
                    }
                }
            }

            _ = ping_interval.tick() => {
                if last_pong.elapsed() > PING_INTERVAL + PONG_TIMEOUT {
                    warn!(client = %client_addr, "Pong timeout, closing connection");
                    break;
                }
                if session.ping(b"").await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = session.close(None).await;
    info!(client = %client_addr, "WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn query_token_parses_url_encoded_values() {
        let req = TestRequest::get()
            .uri("/api/jobs/ws?token=abc%2Edef&other=1")
            .to_http_request();
        assert_eq!(query_token(&req).as_deref(), Some("abc.def"));
    }

    #[test]
    fn query_token_ignores_other_params() {
        let req = TestRequest::get()
            .uri("/api/jobs/ws?foo=bar")
            .to_http_request();
        assert_eq!(query_token(&req), None);

        let req = TestRequest::get().uri("/api/jobs/ws").to_http_request();
        assert_eq!(query_token(&req), None);
    }

    #[test]
    fn bearer_token_requires_prefix() {
        let req = TestRequest::get()
            .insert_header(("Authorization", "Bearer abc"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc"));

        let req = TestRequest::get()
            .insert_header(("Authorization", "Basic abc"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);
    }
}
