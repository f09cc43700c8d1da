// Neutron resource CRUD on top of the authenticated executor

use reqwest::{Method, StatusCode};
use serde_json::{Map, Value};

use crate::error::{NeutronError, Result};
use crate::http_client::NeutronHttpClient;
use crate::session::Session;

/// API version prefix for every resource path
pub const API_PREFIX: &str = "/v2.0";

/// A Neutron resource kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Key wrapping a single object (`vip`)
    pub singular: String,
    /// Key wrapping a list (`vips`)
    pub plural: String,
    /// Collection path below the API prefix (`/lb/vips`)
    pub path: String,
}

impl Resource {
    fn new(singular: &str, plural: &str, path: &str) -> Self {
        Self {
            singular: singular.to_string(),
            plural: plural.to_string(),
            path: path.to_string(),
        }
    }

    /// Look up a resource by CLI name
    ///
    /// Load-balancer objects live under `/lb`; anything unknown is treated
    /// as a top-level collection.
    pub fn lookup(name: &str) -> Self {
        match name {
            "vip" | "vips" => Self::new("vip", "vips", "/lb/vips"),
            "pool" | "pools" => Self::new("pool", "pools", "/lb/pools"),
            "member" | "members" => Self::new("member", "members", "/lb/members"),
            "health-monitor" | "health_monitor" | "health-monitors" | "health_monitors" => {
                Self::new("health_monitor", "health_monitors", "/lb/health_monitors")
            }
            "network" | "networks" => Self::new("network", "networks", "/networks"),
            "subnet" | "subnets" => Self::new("subnet", "subnets", "/subnets"),
            "port" | "ports" => Self::new("port", "ports", "/ports"),
            "router" | "routers" => Self::new("router", "routers", "/routers"),
            other => {
                let singular = other.replace('-', "_");
                let plural = pluralize(&singular);
                let path = format!("/{}", pluralize(other));
                Self {
                    singular,
                    plural,
                    path,
                }
            }
        }
    }

    pub fn collection_path(&self) -> String {
        format!("{}{}", API_PREFIX, self.path)
    }

    pub fn item_path(&self, id: &str) -> String {
        format!("{}{}/{}", API_PREFIX, self.path, id)
    }

    /// Wrap attributes in the singular key unless already wrapped
    pub fn wrap(&self, attributes: Value) -> Value {
        if let Value::Object(map) = &attributes {
            if map.len() == 1 && map.contains_key(&self.singular) {
                return attributes;
            }
        }
        let mut body = Map::new();
        body.insert(self.singular.clone(), attributes);
        Value::Object(body)
    }
}

fn pluralize(name: &str) -> String {
    if name.ends_with('s') {
        name.to_string()
    } else if let Some(stem) = name.strip_suffix('y') {
        format!("{}ies", stem)
    } else {
        format!("{}s", name)
    }
}

/// Pull the human message out of a Neutron error body
///
/// Neutron answers `{"NeutronError": {"message": ...}}`, older servers a
/// bare string under the same key.
pub fn extract_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        match value.get("NeutronError") {
            Some(Value::Object(fault)) => {
                if let Some(Value::String(message)) = fault.get("message") {
                    return message.clone();
                }
            }
            Some(Value::String(message)) => return message.clone(),
            _ => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

/// CRUD operations for Neutron resources
pub struct ResourceClient<'a> {
    http: &'a NeutronHttpClient,
}

impl<'a> ResourceClient<'a> {
    pub fn new(http: &'a NeutronHttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self, session: &mut Session, resource: &Resource) -> Result<Value> {
        let body = self
            .call(session, Method::GET, &resource.collection_path(), None)
            .await?;
        unwrap_key(body, &resource.plural)
    }

    pub async fn show(&self, session: &mut Session, resource: &Resource, id: &str) -> Result<Value> {
        let body = self
            .call(session, Method::GET, &resource.item_path(id), None)
            .await?;
        unwrap_key(body, &resource.singular)
    }

    pub async fn create(
        &self,
        session: &mut Session,
        resource: &Resource,
        attributes: Value,
    ) -> Result<Value> {
        let request = resource.wrap(attributes);
        let body = self
            .call(session, Method::POST, &resource.collection_path(), Some(request))
            .await?;
        unwrap_key(body, &resource.singular)
    }

    pub async fn update(
        &self,
        session: &mut Session,
        resource: &Resource,
        id: &str,
        attributes: Value,
    ) -> Result<Value> {
        let request = resource.wrap(attributes);
        let body = self
            .call(session, Method::PUT, &resource.item_path(id), Some(request))
            .await?;
        unwrap_key(body, &resource.singular)
    }

    pub async fn delete(&self, session: &mut Session, resource: &Resource, id: &str) -> Result<()> {
        self.call(session, Method::DELETE, &resource.item_path(id), None)
            .await?;
        Ok(())
    }

    async fn call(
        &self,
        session: &mut Session,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let payload = body.map(|b| b.to_string());
        let (status, text) = self
            .http
            .do_request(session, path, method, payload.as_deref())
            .await?;

        if !status.is_success() {
            let message = extract_error_message(status, &text);
            tracing::debug!(status = %status, message = %message, "Neutron API error");
            return Err(NeutronError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn unwrap_key(mut body: Value, key: &str) -> Result<Value> {
    body.as_object_mut()
        .and_then(|map| map.remove(key))
        .ok_or_else(|| NeutronError::MalformedResponse(format!("response has no '{}' key", key)))
}
