use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::domain::{AccessionKey, DisplayName, LookupOutcome};
use crate::error::ResolverError;

/// One round-trip to the lookup service per call. Never retries.
pub trait LookupClient: Send + Sync {
    fn lookup(&self, key: &AccessionKey) -> LookupOutcome;
}

#[derive(Clone)]
pub struct UniprotHttpClient {
    client: Client,
    service: ServiceConfig,
}

impl UniprotHttpClient {
    pub fn new(service: ServiceConfig) -> Result<Self, ResolverError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("acc-resolve/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ResolverError::HttpClient(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(service.timeout_secs))
            .build()
            .map_err(|err| ResolverError::HttpClient(err.to_string()))?;
        Ok(Self { client, service })
    }

    fn fetch_body(&self, key: &AccessionKey) -> Result<String, String> {
        let response = self
            .client
            .get(&self.service.base_url)
            .query(&[
                ("format", self.service.format.as_str()),
                ("query", key.as_str()),
                ("columns", self.service.columns.as_str()),
            ])
            .send()
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!("status {}", response.status().as_u16()));
        }
        response.text().map_err(|err| err.to_string())
    }
}

impl LookupClient for UniprotHttpClient {
    fn lookup(&self, key: &AccessionKey) -> LookupOutcome {
        match self.fetch_body(key) {
            Ok(body) => {
                let outcome = parse_tab_response(&body);
                debug!(key = %key, hit = !outcome.is_miss(), "uniprot lookup");
                outcome
            }
            Err(message) => {
                warn!(key = %key, %message, "uniprot request failed; treating as miss");
                LookupOutcome::Miss
            }
        }
    }
}

/// Parses a `format=tab` body: header line, then `<id>\t<gene synonyms>`.
pub fn parse_tab_response(body: &str) -> LookupOutcome {
    let mut lines = body.lines();
    let (Some(_header), Some(row)) = (lines.next(), lines.next()) else {
        return LookupOutcome::Miss;
    };
    let mut fields = row.split('\t');
    let (Some(id), Some(genes)) = (fields.next(), fields.next()) else {
        return LookupOutcome::Miss;
    };
    let id = id.trim();
    if id.is_empty() {
        return LookupOutcome::Miss;
    }
    LookupOutcome::Resolved {
        external_id: id.to_string(),
        display_name: DisplayName::from_gene_field(genes),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn header_only_is_miss() {
        assert_eq!(parse_tab_response("Entry\tGene names\n"), LookupOutcome::Miss);
        assert_eq!(parse_tab_response(""), LookupOutcome::Miss);
    }

    #[test]
    fn single_field_is_miss() {
        assert_eq!(
            parse_tab_response("Entry\tGene names\nP69905\n"),
            LookupOutcome::Miss
        );
    }

    #[test]
    fn keeps_first_synonym() {
        let outcome = parse_tab_response("Entry\tGene names\nP69905\tHBA1 HBA2\nP01942\tHba\n");
        assert_matches!(
            outcome,
            LookupOutcome::Resolved { ref external_id, display_name: DisplayName::Named(ref name) }
                if external_id == "P69905" && name == "HBA1"
        );
    }

    #[test]
    fn empty_gene_field_is_unnamed() {
        let outcome = parse_tab_response("Entry\tGene names\nA0A024R161\t\n");
        assert_eq!(
            outcome,
            LookupOutcome::Resolved {
                external_id: "A0A024R161".to_string(),
                display_name: DisplayName::Unnamed,
            }
        );
    }

    #[test]
    fn blank_id_is_miss() {
        assert_eq!(
            parse_tab_response("Entry\tGene names\n\tHBA1\n"),
            LookupOutcome::Miss
        );
    }
}
