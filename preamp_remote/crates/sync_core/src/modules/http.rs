use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::modules::actor::DriverEvent;
use crate::modules::config::Endpoints;
use crate::modules::error::FetchError;
use crate::modules::poller::{CommandOutcome, FallbackApi, PollOutcome, PollRequest};

/// `GET /api/state`, `GET /api/labels` and `POST /api/cmd` against the bridge.
pub struct HttpFallback {
    client: reqwest::Client,
    endpoints: Endpoints,
    events: mpsc::UnboundedSender<DriverEvent>,
}

impl HttpFallback {
    pub fn new(
        endpoints: Endpoints,
        timeout: Duration,
        events: mpsc::UnboundedSender<DriverEvent>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoints,
            events,
        })
    }
}

impl FallbackApi for HttpFallback {
    fn poll(&mut self, request: PollRequest) {
        let client = self.client.clone();
        let state_url = self.endpoints.state_url();
        let labels_url = request.labels.then(|| self.endpoints.labels_url());
        let events = self.events.clone();

        tokio::spawn(async move {
            let (state, labels) = match labels_url {
                Some(labels_url) => {
                    let (state, labels) = tokio::join!(
                        fetch_line(&client, state_url),
                        fetch_line(&client, labels_url)
                    );
                    (state, Some(labels))
                }
                None => (fetch_line(&client, state_url).await, None),
            };
            let _ = events.send(DriverEvent::Polled(PollOutcome { state, labels }));
        });
    }

    fn post_command(&mut self, line: &str) {
        let client = self.client.clone();
        let url = self.endpoints.command_url();
        let line = line.to_string();
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = post_line(&client, url, &line).await;
            let _ = events.send(DriverEvent::Posted(CommandOutcome { line, result }));
        });
    }
}

async fn fetch_line(client: &reqwest::Client, url: Url) -> Result<String, FetchError> {
    let resp = client
        .get(url.clone())
        .header(CACHE_CONTROL, "no-store")
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::BadStatus { status });
    }

    let body = resp.text().await?;
    let line = body.trim();
    if line.is_empty() {
        return Err(FetchError::UnexpectedBody(body));
    }
    debug!("fetched {url}: {line}");
    Ok(line.to_string())
}

async fn post_line(client: &reqwest::Client, url: Url, line: &str) -> Result<(), FetchError> {
    let resp = client
        .post(url)
        .header(CONTENT_TYPE, "text/plain")
        .body(line.to_string())
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::BadStatus { status });
    }
    Ok(())
}
