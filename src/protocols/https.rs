use std::time::Duration;

use color_eyre::Result as EyreResult;
use eyre::eyre;
use hyper::{Body, Request, Uri};
use serde::{Deserialize, Serialize};
use tokio_rustls::rustls;

use crate::{
    error::{Error, Result},
    settings::Settings,
};

pub type HyperHttpsClient =
    hyper::Client<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>;

fn mk_tls_config(ca_cert: &str) -> EyreResult<rustls::ClientConfig> {
    let mut reader = std::io::BufReader::new(ca_cert.as_bytes());
    let certs = rustls_pemfile::certs(&mut reader)?;

    let mut roots = rustls::RootCertStore::empty();
    let (added, _ignored) = roots.add_parsable_certificates(&certs);

    if added == 0 {
        return Err(eyre!(
            "No usable certificate found in ca_cert. Check your backend config."
        ));
    }

    let config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(config)
}

/// Builds a client that speaks both plain http (a local proxy) and https.
pub fn mk_hyper_https_client(settings: &Settings) -> EyreResult<HyperHttpsClient> {
    let builder = hyper_rustls::HttpsConnectorBuilder::new();

    let is_https = settings.backend.base_url.starts_with("https://");

    let builder = match (&settings.backend.ca_cert, is_https) {
        // Allow trusting a private CA for proxies with self signed certs
        (Some(ca_cert), _) => builder.with_tls_config(mk_tls_config(ca_cert)?),
        (None, true) => builder.with_native_roots(),
        // Plain http proxy, TLS is never negotiated
        (None, false) => builder.with_tls_config(
            rustls::ClientConfig::builder()
                .with_safe_defaults()
                .with_root_certificates(rustls::RootCertStore::empty())
                .with_no_client_auth(),
        ),
    };

    let https = builder.https_or_http().enable_http1().build();

    Ok(hyper::Client::builder().build(https))
}

pub fn mk_uri(settings: &Settings, method: &'static str, path: &str) -> Result<Uri> {
    let uri = format!(
        "{}{}",
        settings.backend.base_url.trim_end_matches('/'),
        path
    );

    uri.parse()
        .map_err(|e| Error::transport(method, path, None, format!("invalid uri {uri}: {e}")))
}

async fn send<T: for<'a> Deserialize<'a>>(
    client: &HyperHttpsClient,
    settings: &Settings,
    method: &'static str,
    path: &str,
    request: Request<Body>,
) -> Result<T> {
    let timeout = Duration::from_secs(settings.backend.request_timeout_seconds);

    let response = tokio::time::timeout(timeout, client.request(request))
        .await
        .map_err(|_| Error::transport(method, path, None, "request timed out"))?
        .map_err(|e| Error::transport(method, path, None, e))?;

    let status = response.status();
    let body_bytes = hyper::body::to_bytes(response.into_body())
        .await
        .map_err(|e| Error::transport(method, path, Some(status.as_u16()), e))?;

    if !status.is_success() {
        let reason = String::from_utf8_lossy(&body_bytes).into_owned();
        let reason = if reason.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        } else {
            reason
        };
        return Err(Error::transport(method, path, Some(status.as_u16()), reason));
    }

    let de = &mut serde_json::Deserializer::from_slice(&body_bytes);
    serde_path_to_error::deserialize(de).map_err(|e| {
        Error::transport(
            method,
            path,
            Some(status.as_u16()),
            format!("invalid response body: {e}"),
        )
    })
}

pub async fn mk_get_request<T: for<'a> Deserialize<'a>>(
    client: &HyperHttpsClient,
    settings: &Settings,
    path: &str,
) -> Result<T> {
    let request = Request::builder()
        .method("GET")
        .header("Accept", "application/json")
        .uri(mk_uri(settings, "GET", path)?)
        .body(Body::empty())
        .map_err(|e| Error::transport("GET", path, None, e))?;

    send(client, settings, "GET", path, request).await
}

pub async fn mk_post_request<RequestBody, ResponseBody>(
    client: &HyperHttpsClient,
    settings: &Settings,
    path: &str,
    body: &RequestBody,
) -> Result<ResponseBody>
where
    RequestBody: Serialize,
    ResponseBody: for<'a> Deserialize<'a>,
{
    let body = serde_json::to_string(body)
        .map_err(|e| Error::transport("POST", path, None, format!("unserializable body: {e}")))?;

    let request = Request::builder()
        .method("POST")
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .uri(mk_uri(settings, "POST", path)?)
        .body(Body::from(body))
        .map_err(|e| Error::transport("POST", path, None, e))?;

    send(client, settings, "POST", path, request).await
}
