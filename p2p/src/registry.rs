use crate::errors::registry_error;
use async_trait::async_trait;
use libchat::{PeerMap, Registry, RegistryError, UserInfo};
use log::*;
use reqwest::Url;

/// Client for the HTTP registry service.
///
/// - `GET /v1/users` lists all registered users as a JSON object of name to address.
/// - `POST /v1/users` registers a [`UserInfo`].
/// - `DELETE /v1/users/{name}` removes a registration.
pub struct HttpRegistry {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpRegistry {
    pub fn new(base_url: &str) -> Result<Self, RegistryError> {
        let base_url = Url::parse(base_url).map_err(|e| RegistryError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RegistryError::InvalidUrl(base_url.to_string()));
        }
        Ok(HttpRegistry { base_url, client: reqwest::Client::new() })
    }

    /// Appends path segments to the base URL. Segments are percent-encoded, so user names may contain spaces.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RegistryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn list(&self) -> Result<PeerMap, RegistryError> {
        let url = self.endpoint(&["v1", "users"])?;
        trace!("GET {url}");
        let response = self.client.get(url).send().await.map_err(registry_error)?;
        let response = response.error_for_status().map_err(registry_error)?;
        let users = response.json::<PeerMap>().await.map_err(registry_error)?;
        debug!("Registry lists {} users", users.len());
        Ok(users)
    }

    async fn register(&self, user: &UserInfo) -> Result<(), RegistryError> {
        let url = self.endpoint(&["v1", "users"])?;
        info!("Registering {} at {} with {}", user.name, user.address, self.base_url);
        let response = self.client.post(url).json(user).send().await.map_err(registry_error)?;
        response.error_for_status().map_err(registry_error)?;
        Ok(())
    }

    async fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        let url = self.endpoint(&["v1", "users", name])?;
        info!("Unregistering {name} from {}", self.base_url);
        let response = self.client.delete(url).send().await.map_err(registry_error)?;
        response.error_for_status().map_err(registry_error)?;
        Ok(())
    }
}
