//! Redirect decisions.

use crate::Response;
use http::header::LOCATION;
use url::Url;

/// Returns where to go next, if `response` should be followed.
///
/// A response is followed when its status is 3xx, it carries a `Location`
/// header, and fewer than `max_redirects` hops have been taken. Relative
/// locations are resolved against `current`. A location that does not
/// resolve leaves the response unfollowed.
///
/// # Examples
///
/// ```
/// use courier::{redirect::redirect_target, Response, ResponseBody};
/// use http::{HeaderMap, HeaderValue, StatusCode};
/// use url::Url;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("location", HeaderValue::from_static("../login"));
/// let response = Response::new(StatusCode::FOUND, headers, ResponseBody::Text(String::new()));
/// let current = Url::parse("https://example.com/app/home").unwrap();
///
/// let next = redirect_target(&response, &current, 0, 3).unwrap();
/// assert_eq!(next.as_str(), "https://example.com/login");
/// assert!(redirect_target(&response, &current, 3, 3).is_none());
/// ```
pub fn redirect_target(
    response: &Response,
    current: &Url,
    redirect_count: usize,
    max_redirects: usize,
) -> Option<Url> {
    if !response.status_code.is_redirection() || redirect_count >= max_redirects {
        return None;
    }

    let location = response.headers.get(LOCATION)?.to_str().ok()?;
    match current.join(location) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(
                location = %location,
                error = %e,
                "Ignoring redirect with unresolvable Location"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResponseBody;
    use http::{HeaderMap, HeaderValue, StatusCode};

    fn response(status: u16, location: Option<&'static str>) -> Response {
        let mut headers = HeaderMap::new();
        if let Some(location) = location {
            headers.insert(LOCATION, HeaderValue::from_static(location));
        }
        Response::new(
            StatusCode::from_u16(status).unwrap(),
            headers,
            ResponseBody::Text(String::new()),
        )
    }

    fn current() -> Url {
        Url::parse("http://example.com/a/b?x=1").unwrap()
    }

    #[test]
    fn test_absolute_location() {
        let next = redirect_target(
            &response(301, Some("https://other.example/landing")),
            &current(),
            0,
            3,
        );
        assert_eq!(next.unwrap().as_str(), "https://other.example/landing");
    }

    #[test]
    fn test_relative_locations() {
        let next = redirect_target(&response(302, Some("/root")), &current(), 0, 3);
        assert_eq!(next.unwrap().as_str(), "http://example.com/root");

        let next = redirect_target(&response(307, Some("c")), &current(), 1, 3);
        assert_eq!(next.unwrap().as_str(), "http://example.com/a/c");
    }

    #[test]
    fn test_budget_exhausted() {
        assert!(redirect_target(&response(301, Some("/x")), &current(), 2, 2).is_none());
        assert!(redirect_target(&response(301, Some("/x")), &current(), 0, 0).is_none());
    }

    #[test]
    fn test_requires_location_and_3xx() {
        assert!(redirect_target(&response(301, None), &current(), 0, 3).is_none());
        assert!(redirect_target(&response(200, Some("/x")), &current(), 0, 3).is_none());
        assert!(redirect_target(&response(404, Some("/x")), &current(), 0, 3).is_none());
    }
}
