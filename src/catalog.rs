// Service catalog normalization and endpoint resolution

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{NeutronError, Result};

/// Service type of the Neutron API in the Keystone catalog
pub const NETWORK_SERVICE_TYPE: &str = "network";

/// Interface visibility used to pick a URL out of a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EndpointType {
    #[default]
    Public,
    Admin,
    Internal,
    /// Any other key, looked up verbatim
    Other(String),
}

impl EndpointType {
    /// Key of this interface in a normalized catalog entry
    pub fn key(&self) -> &str {
        match self {
            EndpointType::Public => "publicURL",
            EndpointType::Admin => "adminURL",
            EndpointType::Internal => "internalURL",
            EndpointType::Other(key) => key,
        }
    }

    /// Parse either the v2 key form (`publicURL`) or the v3 interface name (`public`)
    pub fn parse(s: &str) -> Self {
        match s {
            "publicURL" | "public" => EndpointType::Public,
            "adminURL" | "admin" => EndpointType::Admin,
            "internalURL" | "internal" => EndpointType::Internal,
            other => EndpointType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What to do when no catalog entry matches the requested region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionFallback {
    /// Use the first entry of the service type and log a warning
    #[default]
    FirstEntry,
    /// Treat a region miss as `EndpointNotFound`
    Strict,
}

/// One (service, region) pair with its interface URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCatalogEntry {
    pub service_type: String,
    pub name: Option<String>,
    pub region: Option<String>,
    /// Interface key ("publicURL", "adminURL", ...) to URL
    pub endpoints: BTreeMap<String, String>,
}

/// Identity v2 catalog service (`access.serviceCatalog[]`)
#[derive(Debug, Deserialize)]
pub struct V2Service {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<V2Endpoint>,
}

/// Identity v2 endpoint: a region plus `*URL` keys
#[derive(Debug, Deserialize)]
pub struct V2Endpoint {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// Entry of `GET /tokens/{id}/endpoints`, which inlines the service type
#[derive(Debug, Deserialize)]
pub struct V2FlatEndpoint {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// Identity v3 catalog service (`token.catalog[]`)
#[derive(Debug, Deserialize)]
pub struct V3Service {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<V3Endpoint>,
}

/// Identity v3 endpoint: one URL per interface
#[derive(Debug, Deserialize)]
pub struct V3Endpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
}

fn url_fields(fields: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    fields
        .iter()
        .filter(|(key, _)| key.ends_with("URL"))
        .filter_map(|(key, value)| value.as_str().map(|url| (key.clone(), url.to_string())))
        .collect()
}

/// Flatten a v2 catalog into one entry per (service, endpoint)
pub fn from_v2_catalog(services: Vec<V2Service>) -> Vec<ServiceCatalogEntry> {
    services
        .into_iter()
        .flat_map(|service| {
            let service_type = service.service_type;
            let name = service.name;
            service
                .endpoints
                .into_iter()
                .map(move |endpoint| ServiceCatalogEntry {
                    service_type: service_type.clone(),
                    name: name.clone(),
                    region: endpoint.region,
                    endpoints: url_fields(&endpoint.fields),
                })
        })
        .collect()
}

/// Normalize the flat `/tokens/{id}/endpoints` listing
pub fn from_v2_endpoints(endpoints: Vec<V2FlatEndpoint>) -> Vec<ServiceCatalogEntry> {
    endpoints
        .into_iter()
        .map(|endpoint| ServiceCatalogEntry {
            endpoints: url_fields(&endpoint.fields),
            service_type: endpoint.service_type,
            name: endpoint.name,
            region: endpoint.region,
        })
        .collect()
}

/// Group v3 interface endpoints by region, in catalog order
pub fn from_v3_catalog(services: Vec<V3Service>) -> Vec<ServiceCatalogEntry> {
    let mut entries: Vec<ServiceCatalogEntry> = Vec::new();

    for service in services {
        let first_of_service = entries.len();
        for endpoint in service.endpoints {
            let region = endpoint.region.or(endpoint.region_id);
            let key = match EndpointType::parse(&endpoint.interface) {
                EndpointType::Other(interface) => format!("{}URL", interface),
                known => known.key().to_string(),
            };

            let existing = entries
                .iter_mut()
                .skip(first_of_service)
                .find(|entry| entry.region == region);
            match existing {
                Some(entry) => {
                    entry.endpoints.insert(key, endpoint.url);
                }
                None => {
                    let mut urls = BTreeMap::new();
                    urls.insert(key, endpoint.url);
                    entries.push(ServiceCatalogEntry {
                        service_type: service.service_type.clone(),
                        name: service.name.clone(),
                        region,
                        endpoints: urls,
                    });
                }
            }
        }
    }

    entries
}

/// Pick the URL for `service_type` in `region` with the given interface
pub fn resolve_endpoint(
    catalog: &[ServiceCatalogEntry],
    service_type: &str,
    region: Option<&str>,
    endpoint_type: &EndpointType,
    fallback: RegionFallback,
) -> Result<String> {
    let mut candidates = catalog
        .iter()
        .filter(|entry| entry.service_type == service_type)
        .peekable();

    let first = *candidates.peek().ok_or(NeutronError::EndpointNotFound)?;

    let entry = match region {
        None => first,
        Some(region) => match candidates.find(|entry| entry.region.as_deref() == Some(region)) {
            Some(entry) => entry,
            None => match fallback {
                RegionFallback::FirstEntry => {
                    tracing::warn!(
                        region = region,
                        service_type = service_type,
                        fallback_region = ?first.region,
                        "No catalog entry for region, using the first entry of the service"
                    );
                    first
                }
                RegionFallback::Strict => return Err(NeutronError::EndpointNotFound),
            },
        },
    };

    entry
        .endpoints
        .get(endpoint_type.key())
        .cloned()
        .ok_or_else(|| NeutronError::EndpointTypeNotFound {
            endpoint_type: endpoint_type.to_string(),
        })
}
