//! OCSP over HTTP: `GET /{base64 request}` and `POST /` with a DER body.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};
use webca_crypto::ocsp::{error_response, OcspResponseStatus, RESPONSE_CONTENT_TYPE};

use super::OcspResponder;
use crate::{Result, ServiceError};

/// Routes of the responder
pub fn router(responder: Arc<OcspResponder>) -> Router {
    Router::new()
        .route("/", get(get_empty).post(post_request))
        .route("/*request", get(get_request))
        .with_state(responder)
}

/// Bind `addr` and answer OCSP requests until the task is dropped
pub async fn serve(addr: SocketAddr, responder: Arc<OcspResponder>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::Server(format!("TCP bind {addr}: {e}")))?;
    info!(addr = %addr, issuer = %responder.issuer().serial(), "OCSP responder running");
    axum::serve(listener, router(responder))
        .await
        .map_err(|e| ServiceError::Server(format!("OCSP server error: {e}")))
}

fn ocsp_body(der: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, RESPONSE_CONTENT_TYPE)], der).into_response()
}

/// Decode a request path segment; clients use either base64 alphabet
fn decode_path(encoded: &str) -> Option<Vec<u8>> {
    let encoded = encoded.trim_matches('/');
    if encoded.is_empty() {
        return None;
    }
    STANDARD
        .decode(encoded)
        .or_else(|_| URL_SAFE.decode(encoded))
        .or_else(|_| URL_SAFE_NO_PAD.decode(encoded))
        .ok()
}

async fn get_empty() -> Response {
    ocsp_body(error_response(OcspResponseStatus::MalformedRequest))
}

async fn get_request(
    State(responder): State<Arc<OcspResponder>>,
    Path(encoded): Path<String>,
) -> Response {
    let Some(der) = decode_path(&encoded) else {
        debug!(path = %encoded, "undecodable OCSP GET request");
        return ocsp_body(error_response(OcspResponseStatus::MalformedRequest));
    };
    ocsp_body(responder.handle(&der).await)
}

async fn post_request(State(responder): State<Arc<OcspResponder>>, body: Bytes) -> Response {
    ocsp_body(responder.handle(&body).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{bootstrap_ca, CaSetup};
    use crate::certstore::{MemoryStore, StoreRegistry};
    use crate::repository::MemoryRepository;
    use webca_crypto::ocsp::{CertId, OcspRequest};
    use webca_crypto::Serial;

    async fn responder() -> Arc<OcspResponder> {
        let repo = Arc::new(MemoryRepository::new());
        let store = Arc::new(MemoryStore::new());
        bootstrap_ca(&*repo, &*store, &CaSetup::default())
            .await
            .unwrap();
        let stores = StoreRegistry::new().with_store(store);
        Arc::new(OcspResponder::from_config(repo, &stores).await.unwrap())
    }

    async fn body(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_decode_path_alphabets() {
        let der = [0xfb, 0xff, 0x3e];
        assert_eq!(decode_path("+/8+"), Some(der.to_vec()));
        assert_eq!(decode_path("-_8-"), Some(der.to_vec()));
        assert_eq!(decode_path("MAA"), Some(vec![0x30, 0x00]));
        assert_eq!(decode_path(""), None);
        assert_eq!(decode_path("***"), None);
    }

    #[tokio::test]
    async fn test_get_and_post_agree_on_status() {
        let responder = responder().await;
        let request = OcspRequest::new(vec![CertId::new(responder.issuer(), &Serial::generate())]);
        let der = request.to_der();
        let internal = error_response(OcspResponseStatus::InternalError);

        let response = post_request(State(responder.clone()), Bytes::from(der.clone())).await;
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            RESPONSE_CONTENT_TYPE
        );
        assert_eq!(body(response).await, internal);

        let encoded = URL_SAFE.encode(&der);
        let response = get_request(State(responder), Path(encoded)).await;
        assert_eq!(body(response).await, internal);
    }

    #[tokio::test]
    async fn test_bad_get_is_malformed() {
        let responder = responder().await;
        let response = get_request(State(responder), Path(String::from("%%%"))).await;
        assert_eq!(
            body(response).await,
            error_response(OcspResponseStatus::MalformedRequest)
        );
        assert_eq!(
            body(get_empty().await).await,
            error_response(OcspResponseStatus::MalformedRequest)
        );
    }
}
