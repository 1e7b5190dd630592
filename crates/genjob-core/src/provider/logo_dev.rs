//! Logo.dev brand search plus image CDN.
//!
//! Search resolves a brand name to a domain with the secret key; the logo
//! itself is a CDN URL signed with the publishable token. Both finish inside
//! `create`, and the job id is the resolved domain.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::catalog::normalize_key;
use crate::error::JobError;
use crate::http;
use crate::job::{ArtifactRef, JobHandle, JobRequest, JobState, LogoRequest, ProviderId, RequestBody};

use super::{credential, endpoint, ensure_non_empty, wrong_family, FinishedJobs, JobProvider};

pub const SEARCH_KEY_VAR: &str = "LOGO_SEARCH_KEY";
pub const PUBLIC_TOKEN_VAR: &str = "LOGO_PUBLIC_TOKEN";
pub const DEFAULT_SEARCH_URL: &str = "https://api.logo.dev";
pub const DEFAULT_IMAGE_URL: &str = "https://img.logo.dev";

const MIN_SIZE: u32 = 16;
const MAX_SIZE: u32 = 2048;
const DEFAULT_SIZE: u32 = 512;

pub struct LogoDevProvider {
    client: Client,
    search_key: String,
    public_token: String,
    search_base: String,
    image_base: String,
    finished: FinishedJobs,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchHit {
    #[serde(default)]
    name: String,
    domain: String,
}

impl LogoDevProvider {
    pub fn new(
        client: Client,
        search_key: impl Into<String>,
        public_token: impl Into<String>,
        search_base: Option<&str>,
        image_base: Option<&str>,
    ) -> Self {
        Self {
            client,
            search_key: search_key.into(),
            public_token: public_token.into(),
            search_base: search_base.unwrap_or(DEFAULT_SEARCH_URL).to_string(),
            image_base: image_base.unwrap_or(DEFAULT_IMAGE_URL).to_string(),
            finished: FinishedJobs::default(),
        }
    }

    pub fn from_env(
        client: Client,
        search_base: Option<&str>,
        image_base: Option<&str>,
    ) -> Result<Self, JobError> {
        Ok(Self::new(
            client,
            credential(SEARCH_KEY_VAR)?,
            credential(PUBLIC_TOKEN_VAR)?,
            search_base,
            image_base,
        ))
    }

    fn logo<'a>(&self, request: &'a JobRequest) -> Result<&'a LogoRequest, JobError> {
        match &request.body {
            RequestBody::Logo(l) => Ok(l),
            _ => Err(wrong_family(ProviderId::LogoDev, request)),
        }
    }

    /// CDN URL for `domain` at `size` pixels, PNG.
    pub fn image_url(&self, domain: &str, size: u32) -> Result<String, JobError> {
        let mut url = Url::parse(&endpoint(&self.image_base, domain))
            .map_err(|e| JobError::Validation(format!("bad logo image URL for {domain}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("token", &self.public_token)
            .append_pair("size", &size.to_string())
            .append_pair("format", "png");
        Ok(url.to_string())
    }

    async fn search(&self, brand: &str) -> Result<Vec<SearchHit>, JobError> {
        let mut url = Url::parse(&endpoint(&self.search_base, "search"))
            .map_err(|e| JobError::Validation(format!("bad logo search URL: {e}")))?;
        url.query_pairs_mut().append_pair("q", brand);
        let req = self.client.get(url).bearer_auth(&self.search_key);
        http::send_json(req).await
    }
}

/// Prefer a hit whose name matches the brand exactly, then the first hit.
fn best_match<'a>(brand: &str, hits: &'a [SearchHit]) -> Option<&'a SearchHit> {
    let wanted = normalize_key(brand);
    hits.iter()
        .find(|h| normalize_key(&h.name) == wanted)
        .or_else(|| hits.first())
}

#[async_trait]
impl JobProvider for LogoDevProvider {
    fn id(&self) -> ProviderId {
        ProviderId::LogoDev
    }

    fn validate(&self, request: &JobRequest) -> Result<(), JobError> {
        let l = self.logo(request)?;
        ensure_non_empty("brand", &l.brand)?;
        if !(MIN_SIZE..=MAX_SIZE).contains(&l.size) {
            return Err(JobError::Validation(format!(
                "size must be between {MIN_SIZE} and {MAX_SIZE}, got {}",
                l.size
            )));
        }
        Ok(())
    }

    async fn create(&self, request: &JobRequest) -> Result<String, JobError> {
        let l = self.logo(request)?;
        let hits = self.search(l.brand.trim()).await?;
        let hit = match best_match(&l.brand, &hits) {
            Some(h) => h,
            None => {
                return Err(JobError::RemoteJobFailed {
                    code: Some("not_found".into()),
                    message: format!("no logo found for {:?}", l.brand),
                })
            }
        };
        tracing::info!(brand = %l.brand, domain = %hit.domain, name = %hit.name, "logo resolved");
        let artifact = ArtifactRef::new(self.image_url(&hit.domain, l.size)?);
        self.finished.insert(&hit.domain, JobState::Completed { artifact });
        Ok(hit.domain.clone())
    }

    /// Terminal immediately. For a domain this process never resolved, the
    /// URL is rebuilt at the default size.
    async fn status(&self, handle: &JobHandle) -> Result<JobState, JobError> {
        if let Some(state) = self.finished.get(&handle.id) {
            return Ok(state);
        }
        Ok(JobState::Completed {
            artifact: ArtifactRef::new(self.image_url(&handle.id, DEFAULT_SIZE)?),
        })
    }

    fn completes_on_submit(&self) -> bool {
        true
    }
}
