// CLI commands: resource CRUD and auth info

use clap::{Args, Subcommand};
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::error::{NeutronError, Result};
use crate::http_client::NeutronHttpClient;
use crate::resource::{Resource, ResourceClient};
use crate::session::Session;

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List resources of a kind
    List(ListArgs),
    /// Show one resource
    Show(ItemArgs),
    /// Create a resource
    Create(CreateArgs),
    /// Update a resource
    Update(UpdateArgs),
    /// Delete a resource
    Delete(ItemArgs),
    /// Print the token, tenant, user and endpoint in use
    AuthInfo,
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Resource name (vip, pool, member, health-monitor, network, ...)
    pub resource: String,
}

#[derive(Debug, Clone, Args)]
pub struct ItemArgs {
    pub resource: String,
    /// Resource ID
    pub id: String,
}

#[derive(Debug, Clone, Args)]
pub struct AttributeArgs {
    /// Request body as a JSON object
    #[arg(long)]
    pub data: Option<String>,

    /// Single attribute, repeatable; values are parsed as JSON when possible
    #[arg(long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    pub resource: String,
    #[command(flatten)]
    pub attributes: AttributeArgs,
}

#[derive(Debug, Clone, Args)]
pub struct UpdateArgs {
    pub resource: String,
    pub id: String,
    #[command(flatten)]
    pub attributes: AttributeArgs,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::List(_) => "list",
            Command::Show(_) => "show",
            Command::Create(_) => "create",
            Command::Update(_) => "update",
            Command::Delete(_) => "delete",
            Command::AuthInfo => "auth-info",
        }
    }
}

/// Run one command and render its output
pub async fn run(command: &Command, client: &NeutronHttpClient, session: &mut Session) -> Result<String> {
    let span = tracing::info_span!("command", name = command.name());
    execute(command, client, session).instrument(span).await
}

async fn execute(command: &Command, client: &NeutronHttpClient, session: &mut Session) -> Result<String> {
    let resources = ResourceClient::new(client);

    match command {
        Command::List(args) => {
            let resource = Resource::lookup(&args.resource);
            let items = resources.list(session, &resource).await?;
            tracing::debug!(resource = %resource.plural, "Listed resources");
            render(&items)
        }
        Command::Show(args) => {
            let resource = Resource::lookup(&args.resource);
            let item = resources.show(session, &resource, &args.id).await?;
            render(&item)
        }
        Command::Create(args) => {
            let resource = Resource::lookup(&args.resource);
            let attributes = build_attributes(&args.attributes)?;
            let item = resources.create(session, &resource, attributes).await?;
            Ok(format!("Created a new {}:\n{}", resource.singular, render(&item)?))
        }
        Command::Update(args) => {
            let resource = Resource::lookup(&args.resource);
            let attributes = build_attributes(&args.attributes)?;
            resources
                .update(session, &resource, &args.id, attributes)
                .await?;
            Ok(format!("Updated {}: {}", resource.singular, args.id))
        }
        Command::Delete(args) => {
            let resource = Resource::lookup(&args.resource);
            resources.delete(session, &resource, &args.id).await?;
            Ok(format!("Deleted {}: {}", resource.singular, args.id))
        }
        Command::AuthInfo => {
            // A given token is reported as is, only its endpoint is looked up
            client.ensure_authenticated(session).await?;
            let info = serde_json::to_value(session.auth_info())?;
            render(&info)
        }
    }
}

fn render(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Merge `--data` and `--field` into one attribute object
///
/// Fields are applied after the JSON body, so they win on conflicts.
pub fn build_attributes(args: &AttributeArgs) -> Result<Value> {
    let mut attributes = match args.data.as_deref() {
        Some(data) => match serde_json::from_str::<Value>(data)? {
            Value::Object(map) => map,
            _ => {
                return Err(NeutronError::Config(
                    "--data must be a JSON object".to_string(),
                ))
            }
        },
        None => Map::new(),
    };

    for field in &args.fields {
        let (key, value) = parse_field(field)?;
        attributes.insert(key, value);
    }

    if attributes.is_empty() {
        return Err(NeutronError::Config(
            "no attributes given (use --data or --field)".to_string(),
        ));
    }

    Ok(Value::Object(attributes))
}

fn parse_field(field: &str) -> Result<(String, Value)> {
    let (key, raw) = field
        .split_once('=')
        .ok_or_else(|| NeutronError::Config(format!("invalid field '{}', expected KEY=VALUE", field)))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(NeutronError::Config(format!("invalid field '{}', empty key", field)));
    }

    // Bare words stay strings: name=web
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
