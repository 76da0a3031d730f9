use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{InteractionAction, TagSink};
use crate::kernel::scheduler::TagEffect;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InteractionReport<'a> {
    tag_id: &'a str,
    action: InteractionAction,
}

/// Wraps a UI sink with the network side of firing: silent API calls and
/// interaction reports. Every request runs on a detached task.
pub struct HttpTagSink<S> {
    inner: S,
    client: Client,
    interaction_url: Option<String>,
}

impl<S: TagSink> HttpTagSink<S> {
    pub fn new(inner: S, interaction_url: Option<String>, timeout: Duration) -> Self {
        Self {
            inner,
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            interaction_url,
        }
    }

    fn call_api(&self, url: String) {
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => debug!("TagSink: API call {} ok", url),
                Ok(resp) => warn!("TagSink: API call {} returned {}", url, resp.status()),
                Err(e) => warn!("TagSink: API call {} failed: {}", url, e),
            }
        });
    }
}

impl<S: TagSink> TagSink for HttpTagSink<S> {
    fn fire_tag(&self, effect: &TagEffect) {
        if let TagEffect::SilentCall(tag) = effect {
            self.call_api(tag.info.clone());
        }
        self.inner.fire_tag(effect);
    }

    fn report_interaction(&self, tag_id: &str, action: InteractionAction) {
        self.inner.report_interaction(tag_id, action);

        let Some(url) = self.interaction_url.clone() else {
            return;
        };
        let client = self.client.clone();
        let body = match serde_json::to_value(InteractionReport { tag_id, action }) {
            Ok(body) => body,
            Err(e) => {
                warn!("TagSink: cannot encode interaction: {}", e);
                return;
            }
        };
        tokio::spawn(async move {
            if let Err(e) = client.post(&url).json(&body).send().await {
                warn!("TagSink: interaction report failed: {}", e);
            }
        });
    }
}
