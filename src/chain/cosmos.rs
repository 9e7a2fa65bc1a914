use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use url::Url;

use super::{ChainReader, DelegationEntry};
use crate::config::ChainApiSettings;

/// Upper bound on pages followed per validator
const MAX_PAGES: usize = 1_000;

/// Maximum number of body bytes quoted in an error
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Deserialize)]
struct DelegationsPage {
    #[serde(default)]
    delegation_responses: Vec<DelegationResponse>,
    #[serde(default)]
    pagination: Option<PageResponse>,
}

#[derive(Debug, Deserialize)]
struct DelegationResponse {
    delegation: Delegation,
    balance: Balance,
}

#[derive(Debug, Deserialize)]
struct Delegation {
    delegator_address: String,
    validator_address: String,
}

#[derive(Debug, Deserialize)]
struct Balance {
    denom: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    next_key: Option<String>,
}

impl DelegationsPage {
    fn next_key(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .and_then(|p| p.next_key.as_deref())
            .filter(|key| !key.is_empty())
    }
}

impl From<DelegationResponse> for DelegationEntry {
    fn from(response: DelegationResponse) -> Self {
        Self {
            validator_address: response.delegation.validator_address,
            delegator_address: response.delegation.delegator_address,
            denom: response.balance.denom,
            amount: response.balance.amount,
        }
    }
}

/// Reads delegations from a Cosmos SDK REST (LCD) endpoint.
///
/// Queries `/cosmos/staking/v1beta1/validators/{validator}/delegations` for
/// every tracked validator and follows `pagination.next_key` until the
/// listing is exhausted.
#[derive(Debug, Clone)]
pub struct CosmosRestReader {
    client: reqwest::Client,
    base_url: Url,
    validators: Vec<String>,
    page_limit: u32,
}

impl CosmosRestReader {
    pub fn new(settings: &ChainApiSettings) -> anyhow::Result<Self> {
        let base_url = Url::parse(&settings.base_url)
            .with_context(|| format!("Invalid chain API url {}", settings.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Chain API url {} cannot be used as a base", base_url);
        }
        if settings.validators.is_empty() {
            bail!("No validators configured to track");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("Failed to build chain API HTTP client")?;

        Ok(Self {
            client,
            base_url,
            validators: settings.validators.clone(),
            page_limit: settings.page_limit.max(1),
        })
    }

    fn delegations_url(&self, validator: &str, key: Option<&str>) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Chain API url {} cannot be used as a base", self.base_url))?
            .pop_if_empty()
            .extend([
                "cosmos",
                "staking",
                "v1beta1",
                "validators",
                validator,
                "delegations",
            ]);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pagination.limit", &self.page_limit.to_string());
            if let Some(key) = key {
                query.append_pair("pagination.key", key);
            }
        }

        Ok(url)
    }

    async fn fetch_page(&self, validator: &str, key: Option<&str>) -> anyhow::Result<DelegationsPage> {
        let url = self.delegations_url(validator, key)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to fetch delegations from {}", url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read delegations body from {}", url))?;

        if !status.is_success() {
            bail!(
                "Chain API {} returned {}: {}",
                url,
                status,
                truncate(&body, ERROR_BODY_LIMIT)
            );
        }

        serde_json::from_str(&body)
            .with_context(|| format!("Failed to decode delegations from {}", url))
    }

    async fn fetch_validator(&self, validator: &str) -> anyhow::Result<Vec<DelegationEntry>> {
        let mut entries = Vec::new();
        let mut key: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(validator, key.as_deref()).await?;
            let next = page.next_key().map(str::to_string);
            entries.extend(page.delegation_responses.into_iter().map(DelegationEntry::from));

            match next {
                Some(next) if key.as_deref() == Some(next.as_str()) => {
                    bail!("Chain API repeated pagination key {} for {}", next, validator);
                },
                Some(next) => key = Some(next),
                None => {
                    debug!("Fetched {} delegations for {}", entries.len(), validator);
                    return Ok(entries);
                },
            }
        }

        bail!(
            "Delegations of {} span more than {} pages",
            validator,
            MAX_PAGES
        )
    }
}

#[async_trait]
impl ChainReader for CosmosRestReader {
    async fn fetch_delegations(&self) -> anyhow::Result<Vec<DelegationEntry>> {
        let mut all = Vec::new();
        for validator in &self.validators {
            all.extend(self.fetch_validator(validator).await?);
        }
        Ok(all)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
