//! Registry of monitored Statuspage instances.

use eyre::{Result, bail};

/// One monitored status page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    /// Short stable key, e.g. `openai`.
    pub key: String,
    /// Display name used in logs and fingerprints.
    pub name: String,
    /// Status page root, e.g. `https://status.openai.com`.
    pub base_url: String,
    /// Statuspage page id carried by webhook payloads.
    pub page_id: String,
    /// Whether the poller visits this provider.
    pub enabled: bool,
}

impl Provider {
    /// Creates an enabled provider.
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
        page_id: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            base_url: base_url.into(),
            page_id: page_id.into(),
            enabled: true,
        }
    }

    /// Root of the public Statuspage v2 API.
    pub fn api_url(&self) -> String {
        format!("{}/api/v2", self.base_url.trim_end_matches('/'))
    }

    /// Unresolved incidents listing.
    pub fn incidents_url(&self) -> String {
        format!("{}/incidents/unresolved.json", self.api_url())
    }

    /// Component status listing.
    pub fn components_url(&self) -> String {
        format!("{}/components.json", self.api_url())
    }

    /// Page summary with overall status and components.
    pub fn summary_url(&self) -> String {
        format!("{}/summary.json", self.api_url())
    }

    /// Webhook subscriber collection.
    pub fn subscribers_url(&self) -> String {
        format!("{}/subscribers.json", self.api_url())
    }

    /// A single webhook subscriber.
    pub fn subscriber_url(&self, subscriber_id: &str) -> String {
        format!("{}/subscribers/{}.json", self.api_url(), subscriber_id)
    }
}

const BUILTIN: [(&str, &str, &str, &str); 10] = [
    ("openai", "OpenAI", "https://status.openai.com", "01JMDK9XYNY6RXSED6SDWW50WY"),
    ("github", "GitHub", "https://www.githubstatus.com", "kctbh9vrtdwd"),
    ("cloudflare", "Cloudflare", "https://www.cloudflarestatus.com", "yh6f0r4529hb"),
    ("atlassian", "Atlassian", "https://status.atlassian.com", "0f54fx204jpt"),
    ("datadog", "Datadog", "https://status.datadoghq.com", "1k6wzpspjf99"),
    ("twilio", "Twilio", "https://status.twilio.com", "gpkpyklzq55q"),
    ("vercel", "Vercel", "https://www.vercel-status.com", "lvglq8h0mdyh"),
    ("linear", "Linear", "https://linearstatus.com", "01GYJ3SH6BPHBR7V0GQAW4GTM0"),
    ("hashicorp", "HashiCorp", "https://status.hashicorp.com", "01K7FBWXHZPP52EWA3EGJ2SNVA"),
    ("notion", "Notion", "https://www.notion-status.com", "kgl53swp0yg1"),
];

/// Read-only, ordered list of providers.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    /// Creates a registry from an explicit list.
    pub const fn new(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    /// The verified Statuspage instances shipped with the monitor.
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN
                .iter()
                .map(|(key, name, base_url, page_id)| Provider::new(*key, *name, *base_url, *page_id))
                .collect(),
        )
    }

    /// Enables exactly the providers named in `keys`. An empty list leaves the registry unchanged.
    pub fn restrict_to(mut self, keys: &[String]) -> Result<Self> {
        if keys.is_empty() {
            return Ok(self);
        }
        if let Some(unknown) = keys.iter().find(|k| self.get(k).is_none()) {
            bail!("unknown provider `{}`, available: {}", unknown, self.keys().join(", "));
        }
        for provider in &mut self.providers {
            provider.enabled = keys.contains(&provider.key);
        }
        Ok(self)
    }

    /// Looks up a provider by key.
    pub fn get(&self, key: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.key == key)
    }

    /// Looks up a provider by Statuspage page id.
    pub fn by_page_id(&self, page_id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.page_id == page_id)
    }

    /// Enabled providers in registry order.
    pub fn enabled(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter().filter(|p| p.enabled)
    }

    /// All providers, enabled or not.
    pub fn all(&self) -> &[Provider] {
        &self.providers
    }

    /// All provider keys in registry order.
    pub fn keys(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.key.as_str()).collect()
    }
}
