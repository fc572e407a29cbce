use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode, Url};

use super::{is_retriable_status, FeedPage, MissedResponse, TokenBody};
use crate::messaging::error::{
    backend_rejected, backend_unavailable, internal_error, invalid_argument, MessagingResult,
};

/// Typed client for the notification endpoints of the HemoLink backend.
///
/// Every call carries the opaque session credential as a bearer header. The
/// client performs no automatic retries; callers decide what is worth
/// retrying based on the returned error code.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(base_url: &str, session_token: &str) -> MessagingResult<Self> {
        let url = Url::parse(base_url)
            .map_err(|err| invalid_argument(format!("invalid backend origin '{base_url}': {err}")))?;
        if url.cannot_be_a_base() {
            return Err(invalid_argument(format!(
                "backend origin '{base_url}' cannot be a base URL"
            )));
        }

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {session_token}"))
            .map_err(|err| invalid_argument(format!("invalid session credential: {err}")))?;
        headers.insert(AUTHORIZATION, bearer);

        let http = Client::builder()
            .user_agent(format!("hemolink-push-sdk/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|err| internal_error(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: url,
        })
    }

    /// `POST /notifications/token/register` — upserts this device's token.
    pub async fn register_token(&self, token: &str) -> MessagingResult<()> {
        let url = self.endpoint(&["notifications", "token", "register"])?;
        let response = self
            .http
            .post(url)
            .json(&TokenBody { token })
            .send()
            .await
            .map_err(|err| backend_unavailable(err.to_string()))?;
        self.expect_success(response, "token registration").await
    }

    /// `POST /notifications/token/remove` — idempotent on a missing token.
    pub async fn remove_token(&self, token: &str) -> MessagingResult<()> {
        let url = self.endpoint(&["notifications", "token", "remove"])?;
        let response = self
            .http
            .post(url)
            .json(&TokenBody { token })
            .send()
            .await
            .map_err(|err| backend_unavailable(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.expect_success(response, "token removal").await
    }

    /// `GET /notifications?page=&limit=`
    pub async fn fetch_feed(&self, page: u32, limit: u32) -> MessagingResult<FeedPage> {
        let mut url = self.endpoint(&["notifications"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string());

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| backend_unavailable(err.to_string()))?;
        let response = self.check_status(response, "feed fetch")?;
        response
            .json::<FeedPage>()
            .await
            .map_err(|err| internal_error(format!("failed to parse feed page: {err}")))
    }

    /// `PATCH /notifications/:id/read`
    pub async fn mark_read(&self, id: &str) -> MessagingResult<()> {
        let url = self.endpoint(&["notifications", id, "read"])?;
        let response = self
            .http
            .patch(url)
            .send()
            .await
            .map_err(|err| backend_unavailable(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.expect_success(response, "mark-as-read").await
    }

    /// `POST /notifications/read-all`
    pub async fn mark_all_read(&self) -> MessagingResult<()> {
        let url = self.endpoint(&["notifications", "read-all"])?;
        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|err| backend_unavailable(err.to_string()))?;
        self.expect_success(response, "mark-all-read").await
    }

    /// `DELETE /notifications/:id`
    pub async fn delete_notification(&self, id: &str) -> MessagingResult<()> {
        let url = self.endpoint(&["notifications", id])?;
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|err| backend_unavailable(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.expect_success(response, "notification delete").await
    }

    /// `GET /notifications/check-missed` — session-gap reconciliation.
    pub async fn check_missed(&self) -> MessagingResult<u32> {
        let url = self.endpoint(&["notifications", "check-missed"])?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| backend_unavailable(err.to_string()))?;
        let response = self.check_status(response, "missed-notification check")?;
        response
            .json::<MissedResponse>()
            .await
            .map(|body| body.missed_notifications)
            .map_err(|err| internal_error(format!("failed to parse missed count: {err}")))
    }

    fn endpoint(&self, segments: &[&str]) -> MessagingResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| internal_error("backend origin is not a base URL"))?;
            path.extend(segments);
        }
        Ok(url)
    }

    fn check_status(&self, response: Response, operation: &str) -> MessagingResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        log::debug!("{operation} returned status {status}");
        if is_retriable_status(status.as_u16()) {
            Err(backend_unavailable(format!(
                "{operation} failed with status {status}"
            )))
        } else {
            Err(backend_rejected(format!(
                "{operation} rejected with status {status}"
            )))
        }
    }

    async fn expect_success(&self, response: Response, operation: &str) -> MessagingResult<()> {
        self.check_status(response, operation).map(|_| ())
    }
}
