use std::time::{Duration, Instant};

use log::trace;
use reqwest::{Client, Response, StatusCode, Url};

use crate::core::{GenericError, GenericResult};

const MAX_ERROR_BODY_SIZE: usize = 256;

/// Sends GET request. Doesn't check the response status: it's up to the caller since some APIs
/// return error details in the body.
pub async fn send_request(
    client: &Client, url: &Url, authorization: Option<&str>, timeout: Duration,
) -> GenericResult<Response> {
    let mut request = client.get(url.clone()).timeout(timeout);
    if let Some(authorization) = authorization {
        request = request.bearer_auth(authorization);
    }

    trace!("Sending request to {url}...");
    let start = Instant::now();
    let response = request.send().await.map_err(humanize_reqwest_error)?;
    trace!("Got response from {url} ({:?}): {}.", start.elapsed(), response.status());

    Ok(response)
}

pub async fn read_body(response: Response) -> GenericResult<String> {
    Ok(response.text().await.map_err(humanize_reqwest_error)?)
}

pub fn server_error(status: StatusCode, body: &str) -> GenericError {
    let body = body.trim();

    if body.is_empty() || body.len() > MAX_ERROR_BODY_SIZE {
        format!("Server returned an error: {status}").into()
    } else {
        format!("Server returned an error: {status}: {body}").into()
    }
}

fn humanize_reqwest_error(err: reqwest::Error) -> String {
    if err.is_timeout() {
        "Request timed out".to_owned()
    } else if err.is_connect() {
        format!("Connection error: {err}")
    } else {
        err.to_string()
    }
}
