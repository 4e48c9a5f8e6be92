//! HTTP clients for the solver and personnel services.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use roster_kernel::{BackendError, PersonnelDirectory, PersonnelRecord, SolveRequest, SolveResponse, Solver};

/// Client for `POST {base}/api/assignment/solve`.
#[derive(Clone)]
pub struct SolverClient {
    client: reqwest::Client,
    base_url: String,
}

impl SolverClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_solve(&self, request: &SolveRequest) -> Result<SolveResponse> {
        let url = format!("{}/api/assignment/solve", self.base_url);
        debug!(url = %url, assignments = request.assignment_list.len(), "Posting solve request");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .context("Failed to send request to solver")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Solve request failed with status {}: {}", status, body);
        }

        response.json().await.context("Failed to parse solver response")
    }
}

#[async_trait]
impl Solver for SolverClient {
    async fn solve(&self, request: &SolveRequest) -> Result<SolveResponse, BackendError> {
        self.post_solve(request)
            .await
            .map_err(|e| BackendError::new(format!("{e:#}")))
    }
}

/// Client for `GET {base}/api/manpower`.
#[derive(Clone)]
pub struct PersonnelClient {
    client: reqwest::Client,
    base_url: String,
}

impl PersonnelClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self) -> Result<Vec<PersonnelRecord>> {
        let url = format!("{}/api/manpower", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach personnel service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Personnel request failed with status {}: {}", status, body);
        }

        let people: Vec<PersonnelRecord> = response
            .json()
            .await
            .context("Failed to parse personnel list")?;
        debug!(people = people.len(), "Fetched personnel");
        Ok(people)
    }
}

#[async_trait]
impl PersonnelDirectory for PersonnelClient {
    async fn list_people(&self) -> Result<Vec<PersonnelRecord>, BackendError> {
        self.fetch()
            .await
            .map_err(|e| BackendError::new(format!("{e:#}")))
    }
}

/// Personnel list held in memory, for offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticPersonnel {
    people: Vec<PersonnelRecord>,
}

impl StaticPersonnel {
    pub fn new(people: Vec<PersonnelRecord>) -> Self {
        Self { people }
    }

    /// Load a JSON array of personnel records.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read personnel file {}", path.display()))?;
        let people = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse personnel file {}", path.display()))?;
        Ok(Self { people })
    }
}

#[async_trait]
impl PersonnelDirectory for StaticPersonnel {
    async fn list_people(&self) -> Result<Vec<PersonnelRecord>, BackendError> {
        Ok(self.people.clone())
    }
}
