//! Remote collection over a JSON HTTP API.
//!
//! Routes, relative to the base URL:
//! - `GET    /v1/<kind>?userId=<id>` returns the user's documents
//! - `POST   /v1/<kind>` creates one and returns `{"id": "..."}`
//! - `PATCH  /v1/<kind>/<id>` applies a partial write
//! - `DELETE /v1/<kind>/<id>`

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;

use super::{parse_api_error, RemoteCollection, RemoteDocument, RemoteError, RemoteResult};
use crate::models::EntityId;
use crate::store::Entity;
use crate::util::{is_http_url, normalize_text_option};

const REQUEST_TIMEOUT_SECS: u64 = 10;

pub struct HttpRemoteCollection<E> {
    base_url: Url,
    token: Option<String>,
    client: Client,
    _entity: PhantomData<fn() -> E>,
}

impl<E> std::fmt::Debug for HttpRemoteCollection<E> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteCollection")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: Option<String>,
}

impl<E: Entity> HttpRemoteCollection<E> {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> RemoteResult<Self> {
        let base_url = normalize_text_option(Some(base_url.into())).ok_or_else(|| {
            RemoteError::InvalidConfiguration("base URL must not be empty".to_string())
        })?;
        if !is_http_url(&base_url) {
            return Err(RemoteError::InvalidConfiguration(
                "base URL must include http:// or https://".to_string(),
            ));
        }
        let base_url = Url::parse(&base_url)
            .map_err(|error| RemoteError::InvalidConfiguration(error.to_string()))?;

        Ok(Self {
            base_url,
            token: normalize_text_option(token),
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            _entity: PhantomData,
        })
    }

    fn url(&self, id: Option<&EntityId>) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                RemoteError::InvalidConfiguration("base URL cannot carry a path".to_string())
            })?;
            segments.pop_if_empty().push("v1").push(E::KIND);
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, id: Option<&EntityId>) -> RemoteResult<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match (status, id) {
            (StatusCode::NOT_FOUND, Some(id)) => Err(RemoteError::NotFound(id.to_string())),
            (StatusCode::SERVICE_UNAVAILABLE, _) => {
                Err(RemoteError::Unavailable(parse_api_error(status, &body)))
            }
            _ => Err(RemoteError::Api(parse_api_error(status, &body))),
        }
    }
}

#[async_trait]
impl<E: Entity> RemoteCollection<E> for HttpRemoteCollection<E> {
    async fn fetch_all(&self, user_id: &str) -> RemoteResult<Vec<E>> {
        let mut url = self.url(None)?;
        url.query_pairs_mut().append_pair("userId", user_id);

        let body = self.send(self.client.get(url), None).await?.text().await?;
        let documents = serde_json::from_str::<Vec<RemoteDocument<E>>>(&body)
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        Ok(documents
            .into_iter()
            .map(|document| document.entity)
            .collect())
    }

    async fn create(&self, user_id: &str, entity: &E) -> RemoteResult<EntityId> {
        let mut body = serde_json::to_value(entity)
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        let fields = body.as_object_mut().ok_or_else(|| {
            RemoteError::InvalidPayload(format!("{} must serialize to an object", E::KIND))
        })?;
        for server_owned in ["id", "createdAt", "updatedAt"] {
            fields.remove(server_owned);
        }
        fields.insert("userId".to_string(), serde_json::Value::from(user_id));

        let created = self
            .send(self.client.post(self.url(None)?).json(&body), None)
            .await?
            .json::<CreatedResponse>()
            .await?;
        created
            .id
            .and_then(|id| normalize_text_option(Some(id)))
            .map(EntityId::from_remote)
            .ok_or_else(|| RemoteError::InvalidPayload("response did not include id".to_string()))
    }

    async fn update(&self, id: &EntityId, patch: &E::Patch) -> RemoteResult<()> {
        self.send(self.client.patch(self.url(Some(id))?).json(patch), Some(id))
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &EntityId) -> RemoteResult<()> {
        self.send(self.client.delete(self.url(Some(id))?), Some(id))
            .await?;
        Ok(())
    }
}
