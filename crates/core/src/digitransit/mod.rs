//! Stops and departures from the Digitransit routing API.
//!
//! Both repositories are served by one GraphQL endpoint. Requests carry the
//! raw query document as `application/graphql`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use nearby_transit::{
    DepartureBoard, DeparturesRepository, FetchError, Stop, StopIdentifier, StopsQuery,
    StopsRepository,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::config::ControllerConfig;

pub mod query;
pub mod wire;

use wire::{GraphQlResponse, StopData, StopsByRadiusData};

const SUBSCRIPTION_KEY_HEADER: &str = "digitransit-subscription-key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DigitransitClient {
    client: Client,
    endpoint: Url,
    subscription_key: Option<String>,
    departures_per_stop: u32,
}

impl DigitransitClient {
    /// Client for the endpoint and key in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidData`] if the endpoint is not a valid URL,
    /// or [`FetchError::Network`] if the HTTP client cannot be built.
    pub fn new(config: &ControllerConfig) -> Result<Self, FetchError> {
        Self::with_endpoint(
            &config.endpoint,
            config.subscription_key.clone(),
            config.departures_per_stop,
        )
    }

    /// Client for an arbitrary endpoint, e.g. a mock server
    pub fn with_endpoint(
        endpoint: &str,
        subscription_key: Option<String>,
        departures_per_stop: u32,
    ) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| FetchError::InvalidData(format!("invalid endpoint '{endpoint}': {e}")))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("nearby/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(to_fetch_error)?;

        Ok(Self {
            client,
            endpoint,
            subscription_key,
            departures_per_stop,
        })
    }

    async fn post_query<T: DeserializeOwned>(&self, document: String) -> Result<T, FetchError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/graphql")
            .body(document);
        if let Some(key) = &self.subscription_key {
            request = request.header(SUBSCRIPTION_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(to_fetch_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(to_fetch_error)?;
        let envelope: GraphQlResponse<T> =
            serde_json::from_slice(&body).map_err(|e| FetchError::InvalidData(e.to_string()))?;
        envelope.into_data()
    }
}

fn to_fetch_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(error.to_string())
    }
}

impl StopsRepository for DigitransitClient {
    fn fetch_stops<'a>(
        &'a self,
        stops_query: StopsQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Stop>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            tracing::debug!(
                latitude = stops_query.coordinates.latitude,
                longitude = stops_query.coordinates.longitude,
                radius_m = stops_query.radius_m,
                "fetching nearby stops"
            );
            let document = query::stops_by_radius(&stops_query);
            let data: StopsByRadiusData = self.post_query(document).await?;
            Ok(data.into_stops())
        })
    }
}

impl DeparturesRepository for DigitransitClient {
    fn fetch_departures<'a>(
        &'a self,
        stop_id: &'a StopIdentifier,
    ) -> Pin<Box<dyn Future<Output = Result<DepartureBoard, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            tracing::debug!(stop = %stop_id, "fetching departures");
            let document = query::stop_departures(stop_id, self.departures_per_stop);
            let data: StopData = self.post_query(document).await?;
            data.into_board(stop_id)
        })
    }
}
