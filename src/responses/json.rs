use crate::errors::{ResultResp, ServerError};
use astra::{Body, ResponseBuilder};
use serde::Serialize;

pub fn json_response<T: Serialize>(value: &T) -> ResultResp {
    let body = serde_json::to_string(value).map_err(|_| ServerError::Internal)?;

    ResponseBuilder::new()
        .status(200)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .map_err(|_| ServerError::Internal)
}

pub fn text_response(text: &str) -> ResultResp {
    ResponseBuilder::new()
        .status(200)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Body::from(text.to_string()))
        .map_err(|_| ServerError::Internal)
}
