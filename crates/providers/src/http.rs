//! Shared HTTP plumbing for the provider adapters.
//!
//! Maps transport and status failures onto [`FetchError`] so every adapter
//! reports provider trouble the same way.

use std::time::Duration;

use doshboard_core::fetch::FetchError;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Send `request` and decode a JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, FetchError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Unreachable(e.to_string())
        }
    })?;

    if let Some(err) = classify_status(response.status()) {
        return Err(err);
    }

    response
        .json::<T>()
        .await
        .map_err(|e| FetchError::Unreachable(format!("undecodable provider response: {e}")))
}

/// Translate a non-successful status into a [`FetchError`].
///
/// 400/404/422 blame the widget configuration; 429 is an explicit back-off
/// request; anything else non-2xx (including an empty 204) counts as an
/// outage.
pub(crate) fn classify_status(status: StatusCode) -> Option<FetchError> {
    match status {
        StatusCode::NO_CONTENT => Some(FetchError::Unreachable("empty provider response".into())),
        s if s.is_success() => None,
        StatusCode::TOO_MANY_REQUESTS => Some(FetchError::RateLimited),
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => Some(
            FetchError::InvalidConfig(format!("provider rejected the request ({status})")),
        ),
        s => Some(FetchError::Unreachable(format!("provider returned {s}"))),
    }
}

/// Require a widget parameter, reporting its absence as a config error.
pub(crate) fn required<'a>(
    config: &'a doshboard_core::widget::WidgetConfig,
    key: &str,
) -> Result<&'a str, FetchError> {
    config
        .param(key)
        .ok_or_else(|| FetchError::InvalidConfig(format!("missing parameter '{key}'")))
}

/// Accept a JSON number or a numeric string. Several providers quote
/// their numbers.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn success_is_not_an_error() {
        assert!(classify_status(StatusCode::OK).is_none());
    }

    #[test]
    fn status_mapping() {
        assert_matches!(classify_status(StatusCode::TOO_MANY_REQUESTS), Some(FetchError::RateLimited));
        assert_matches!(classify_status(StatusCode::NOT_FOUND), Some(FetchError::InvalidConfig(_)));
        assert_matches!(classify_status(StatusCode::BAD_REQUEST), Some(FetchError::InvalidConfig(_)));
        assert_matches!(classify_status(StatusCode::BAD_GATEWAY), Some(FetchError::Unreachable(_)));
        assert_matches!(classify_status(StatusCode::UNAUTHORIZED), Some(FetchError::Unreachable(_)));
        assert_matches!(classify_status(StatusCode::NO_CONTENT), Some(FetchError::Unreachable(_)));
    }

    #[test]
    fn lenient_numbers() {
        #[derive(Deserialize)]
        struct Sample {
            #[serde(default, deserialize_with = "lenient_f64")]
            v: Option<f64>,
        }

        let parse = |json: &str| serde_json::from_str::<Sample>(json).unwrap().v;
        assert_eq!(parse(r#"{"v": 1.5}"#), Some(1.5));
        assert_eq!(parse(r#"{"v": "42.25"}"#), Some(42.25));
        assert_eq!(parse(r#"{"v": "n/a"}"#), None);
        assert_eq!(parse(r#"{"v": null}"#), None);
        assert_eq!(parse(r#"{}"#), None);
    }
}
