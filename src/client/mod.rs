//! HTTP implementation of [`FluenceApi`] backed by `reqwest`.

mod error;

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::api::{ApiFuture, FluenceApi};
use crate::models::{
    AddSshKey, AvailableHardware, CreateVmRequest, CreatedVm, Datacenter, DefaultImage,
    DepositEstimate, EstimateDepositRequest, RunningInstance, SshKey, UpdateVm,
};

pub use error::ClientError;

/// Default marketplace endpoint.
pub const DEFAULT_HOST: &str = "https://api.fluence.dev";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const COUNTRIES_PATH: &str = "/marketplace/countries";
const HARDWARE_PATH: &str = "/marketplace/hardware";
const BASIC_CONFIGURATIONS_PATH: &str = "/marketplace/basic_configurations";
const DATACENTERS_PATH: &str = "/datacenters";
const DEFAULT_IMAGES_PATH: &str = "/vms/v3/default_images";
const ESTIMATE_PATH: &str = "/vms/v3/estimate";
const SSH_KEYS_PATH: &str = "/ssh_keys";
const VMS_PATH: &str = "/vms/v3";

/// Client for the Fluence marketplace REST API.
#[derive(Clone, Debug)]
pub struct FluenceClient {
    http: reqwest::Client,
    host: String,
}

impl FluenceClient {
    /// Builds a client for `host`, authenticating every request with
    /// `api_key` as a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidHost`] when `host` is not an absolute
    /// URL, [`ClientError::InvalidApiKey`] when the key cannot be sent as a
    /// header, and [`ClientError::Transport`] when the HTTP client cannot be
    /// initialised.
    pub fn new(host: &str, api_key: &str) -> Result<Self, ClientError> {
        let trimmed = host.trim().trim_end_matches('/');
        Url::parse(trimmed).map_err(|err| ClientError::InvalidHost {
            host: host.to_owned(),
            message: err.to_string(),
        })?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ClientError::InvalidApiKey)?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|err| ClientError::Transport {
                path: String::from("/"),
                message: err.to_string(),
            })?;

        Ok(Self {
            http,
            host: trimmed.to_owned(),
        })
    }

    /// Returns the normalised host the client talks to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{path}", self.host))
    }

    async fn execute(builder: RequestBuilder, path: &str) -> Result<Vec<u8>, ClientError> {
        let response = builder.send().await.map_err(|err| ClientError::Transport {
            path: path.to_owned(),
            message: err.to_string(),
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ClientError::Transport {
                path: path.to_owned(),
                message: err.to_string(),
            })?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        Err(ClientError::Status {
            path: path.to_owned(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> Result<T, ClientError> {
        serde_json::from_slice(body).map_err(|err| ClientError::Decode {
            path: path.to_owned(),
            message: err.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let body = Self::execute(self.request(Method::GET, path), path).await?;
        Self::decode(path, &body)
    }
}

impl FluenceApi for FluenceClient {
    fn list_vms(&self) -> ApiFuture<'_, Vec<RunningInstance>> {
        Box::pin(self.get_json(VMS_PATH))
    }

    fn create_vms<'a>(&'a self, request: &'a CreateVmRequest) -> ApiFuture<'a, Vec<CreatedVm>> {
        Box::pin(async move {
            let body =
                Self::execute(self.request(Method::POST, VMS_PATH).json(request), VMS_PATH)
                    .await?;
            Self::decode(VMS_PATH, &body)
        })
    }

    fn update_vms<'a>(&'a self, updates: &'a [UpdateVm]) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let payload = json!({ "updates": updates });
            Self::execute(
                self.request(Method::PATCH, VMS_PATH).json(&payload),
                VMS_PATH,
            )
            .await
            .map(drop)
        })
    }

    fn remove_vms<'a>(&'a self, vm_ids: &'a [String]) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let payload = json!({ "vmIds": vm_ids });
            Self::execute(
                self.request(Method::DELETE, VMS_PATH).json(&payload),
                VMS_PATH,
            )
            .await
            .map(drop)
        })
    }

    fn list_ssh_keys(&self) -> ApiFuture<'_, Vec<SshKey>> {
        Box::pin(self.get_json(SSH_KEYS_PATH))
    }

    fn create_ssh_key<'a>(&'a self, request: &'a AddSshKey) -> ApiFuture<'a, SshKey> {
        Box::pin(async move {
            let body = Self::execute(
                self.request(Method::POST, SSH_KEYS_PATH).json(request),
                SSH_KEYS_PATH,
            )
            .await?;
            Self::decode(SSH_KEYS_PATH, &body)
        })
    }

    fn remove_ssh_key<'a>(&'a self, fingerprint: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let payload = json!({ "fingerprint": fingerprint });
            Self::execute(
                self.request(Method::DELETE, SSH_KEYS_PATH).json(&payload),
                SSH_KEYS_PATH,
            )
            .await
            .map(drop)
        })
    }

    fn available_countries(&self) -> ApiFuture<'_, Vec<String>> {
        Box::pin(self.get_json(COUNTRIES_PATH))
    }

    fn available_hardware(&self) -> ApiFuture<'_, AvailableHardware> {
        Box::pin(self.get_json(HARDWARE_PATH))
    }

    fn basic_configurations(&self) -> ApiFuture<'_, Vec<String>> {
        Box::pin(self.get_json(BASIC_CONFIGURATIONS_PATH))
    }

    fn datacenters(&self) -> ApiFuture<'_, Vec<Datacenter>> {
        Box::pin(self.get_json(DATACENTERS_PATH))
    }

    fn default_images(&self) -> ApiFuture<'_, Vec<DefaultImage>> {
        Box::pin(self.get_json(DEFAULT_IMAGES_PATH))
    }

    fn estimate_deposit<'a>(
        &'a self,
        request: &'a EstimateDepositRequest,
    ) -> ApiFuture<'a, DepositEstimate> {
        Box::pin(async move {
            let body = Self::execute(
                self.request(Method::POST, ESTIMATE_PATH).json(request),
                ESTIMATE_PATH,
            )
            .await?;
            Self::decode(ESTIMATE_PATH, &body)
        })
    }
}
