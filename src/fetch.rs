//! Guarded HTTP fetching with per-hop redirect validation.
//!
//! The HTTP client never follows redirects on its own: every `Location` is
//! run back through the [`UrlGuard`], and each connection is pinned to an
//! address the guard approved, so a rebinding DNS answer between validation
//! and connect cannot redirect the request.

use std::time::Duration;

use reqwest::redirect::Policy as RedirectPolicy;
use reqwest::{Client, Response};

use crate::error::Error;
use crate::validate::{UrlGuard, Validated};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: u8 = 10;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a fetch operation, including the redirect chain.
#[derive(Debug)]
pub struct FetchResult {
    /// The final HTTP response.
    pub response: Response,

    /// Chain of validated URLs that were followed (including the original).
    pub chain: Vec<Validated>,
}

/// Fetch a URL with GET, following redirects only through the guard.
///
/// # Example
///
/// ```rust,no_run
/// use outbound_guard::{fetch, Policy, UrlGuard};
///
/// # async fn example() -> Result<(), outbound_guard::Error> {
/// let guard = UrlGuard::new(Policy::builder().allow_domain("httpbin.org").build()?)?;
/// let result = fetch(&guard, "https://httpbin.org/redirect/2").await?;
/// println!("Final URL: {}", result.response.url());
/// println!("Followed {} redirects", result.chain.len() - 1);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// [`Error::Denied`] if the URL itself is rejected, [`Error::RedirectBlocked`]
/// if a redirect target is, [`Error::TooManyRedirects`] past ten hops and
/// [`Error::Http`] for transport failures.
pub async fn fetch(guard: &UrlGuard, url: &str) -> Result<FetchResult, Error> {
    let mut current_url = url.to_string();
    let mut chain: Vec<Validated> = Vec::new();

    for _ in 0..=MAX_REDIRECTS {
        let outcome = guard.validate(&current_url).await;
        let validated = match outcome {
            Ok(validated) => validated,
            Err(denied) if chain.is_empty() => return Err(denied.into()),
            Err(denied) => {
                return Err(Error::RedirectBlocked {
                    original_url: url.to_string(),
                    redirect_url: current_url,
                    reason: denied.reason(),
                })
            }
        };

        let client = pinned_client(&validated)?;
        let response = client
            .get(validated.url())
            .send()
            .await
            .map_err(|e| http_error(&current_url, e))?;

        if !response.status().is_redirection() {
            chain.push(validated);
            return Ok(FetchResult { response, chain });
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| Error::Http {
                url: current_url.clone(),
                message: "redirect without Location header".to_string(),
            })?;

        tracing::debug!(from = %validated.host(), location, "following redirect");
        current_url = resolve_redirect_url(validated.url(), location)?;
        chain.push(validated);
    }

    Err(Error::TooManyRedirects {
        url: url.to_string(),
        max: MAX_REDIRECTS,
    })
}

/// A client that connects `validated.host()` only to the approved address.
fn pinned_client(validated: &Validated) -> Result<Client, Error> {
    Client::builder()
        .redirect(RedirectPolicy::none())
        .resolve(validated.host(), validated.to_socket_addr())
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| http_error(validated.url(), e))
}

fn http_error(url: &str, e: reqwest::Error) -> Error {
    tracing::warn!(url, error = %e, "outbound request failed");
    Error::Http {
        url: url.to_string(),
        message: e.to_string(),
    }
}

/// Resolve a redirect URL (which may be relative) against the base URL.
fn resolve_redirect_url(base: &str, location: &str) -> Result<String, Error> {
    let invalid = |message: String| Error::Http {
        url: location.to_string(),
        message,
    };

    let base_url = url::Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    let resolved = base_url
        .join(location)
        .map_err(|e| invalid(format!("invalid redirect location: {e}")))?;

    Ok(resolved.to_string())
}
