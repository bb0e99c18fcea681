//! Professional-network toolset.
//!
//! Profile lookups, people search, messaging, and batch retrieval over
//! a [`NetworkClient`]. The wrapped service is an unofficial API that
//! restricts accounts on aggressive usage, so lookups, searches, and
//! messages each run under their own rate-limit category.
//!
//! Default limits: profile reads 10-30s / 500 per day, searches
//! 30-60s / 100 per day, messages 60-180s / 100 per day.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::config::{MESSAGES_CATEGORY, PROFILES_CATEGORY, SEARCH_CATEGORY};
use crate::error::HandlerError;
use crate::quota::{AdmitResult, RateLimiter};
use crate::tools::tool::{CallContext, Handler, ParamType, ToolDescriptor, require_str};

/// Toolset id the network tools are registered under.
pub const NETWORK_TOOLSET: &str = "network";

/// Upper bound on a single outbound message.
const MAX_MESSAGE_CHARS: usize = 8000;
/// Upper bound on one batch lookup, keeping a batch well inside the
/// daily profile quota.
const MAX_BATCH_PROFILES: usize = 20;

/// Error surface of the external network client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client not configured: {0}")]
    NotConfigured(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("message rejected: {0}")]
    MessageRejected(String),
}

impl From<ClientError> for HandlerError {
    fn from(e: ClientError) -> Self {
        HandlerError::ExternalService(e.to_string())
    }
}

/// Identifier for a profile: the public handle from the profile URL,
/// or the opaque URN id returned by searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileId {
    Public(String),
    Urn(String),
}

impl ProfileId {
    fn from_args(args: &Value) -> Result<Self, HandlerError> {
        let public = args.get("public_id").and_then(Value::as_str).unwrap_or("");
        let urn = args.get("urn_id").and_then(Value::as_str).unwrap_or("");
        if !public.is_empty() {
            Ok(ProfileId::Public(public.to_string()))
        } else if !urn.is_empty() {
            Ok(ProfileId::Urn(urn.to_string()))
        } else {
            Err(HandlerError::msg("provide either public_id or urn_id"))
        }
    }
}

/// Narrow interface to the external professional-network service.
/// Authentication and transport live behind the implementation; the
/// toolset only sees already-authorized calls.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn profile(&self, id: &ProfileId) -> Result<Value, ClientError>;
    async fn own_profile(&self) -> Result<Value, ClientError>;
    async fn contact_info(&self, id: &ProfileId) -> Result<Value, ClientError>;
    async fn search_people(
        &self,
        keywords: &str,
        network_depth: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Value>, ClientError>;
    async fn connections(&self, limit: usize) -> Result<Vec<Value>, ClientError>;
    async fn conversations(&self) -> Result<Vec<Value>, ClientError>;
    async fn conversation(&self, conversation_id: &str) -> Result<Value, ClientError>;
    async fn send_message(&self, recipient_urn: &str, body: &str) -> Result<(), ClientError>;
    async fn reply(&self, conversation_id: &str, body: &str) -> Result<(), ClientError>;
}

/// Placeholder client used until a real integration is wired in.
/// Every call reports the missing configuration.
pub struct UnconfiguredClient;

macro_rules! unconfigured {
    () => {
        Err(ClientError::NotConfigured(
            "no professional-network integration is wired in".to_string(),
        ))
    };
}

#[async_trait]
impl NetworkClient for UnconfiguredClient {
    async fn profile(&self, _id: &ProfileId) -> Result<Value, ClientError> {
        unconfigured!()
    }
    async fn own_profile(&self) -> Result<Value, ClientError> {
        unconfigured!()
    }
    async fn contact_info(&self, _id: &ProfileId) -> Result<Value, ClientError> {
        unconfigured!()
    }
    async fn search_people(
        &self,
        _keywords: &str,
        _network_depth: Option<&str>,
        _limit: usize,
    ) -> Result<Vec<Value>, ClientError> {
        unconfigured!()
    }
    async fn connections(&self, _limit: usize) -> Result<Vec<Value>, ClientError> {
        unconfigured!()
    }
    async fn conversations(&self) -> Result<Vec<Value>, ClientError> {
        unconfigured!()
    }
    async fn conversation(&self, _conversation_id: &str) -> Result<Value, ClientError> {
        unconfigured!()
    }
    async fn send_message(&self, _recipient_urn: &str, _body: &str) -> Result<(), ClientError> {
        unconfigured!()
    }
    async fn reply(&self, _conversation_id: &str, _body: &str) -> Result<(), ClientError> {
        unconfigured!()
    }
}

/// Build the network toolset's descriptor table over `client`.
///
/// Read-only lookups are safe; message sends and batch fetches are
/// marked unsafe so upstream surfaces require explicit confirmation.
pub fn network_toolset(
    client: Arc<dyn NetworkClient>,
    limiter: Arc<RateLimiter>,
) -> Vec<ToolDescriptor> {
    vec![
        profile_tool(client.clone()),
        own_profile_tool(client.clone()),
        contact_info_tool(client.clone()),
        search_tool(client.clone(), limiter.clone()),
        connections_tool(client.clone()),
        conversations_tool(client.clone()),
        conversation_tool(client.clone()),
        send_message_tool(client.clone(), limiter.clone()),
        reply_tool(client.clone(), limiter.clone()),
        batch_profiles_tool(client, limiter.clone()),
        quota_status_tool(limiter),
    ]
}

// ---- profile lookups ----

struct ProfileHandler {
    client: Arc<dyn NetworkClient>,
}

#[async_trait]
impl Handler for ProfileHandler {
    async fn call(&self, args: Value, _ctx: &CallContext) -> Result<Value, HandlerError> {
        let id = ProfileId::from_args(&args)?;
        let verbose = args.get("verbose").and_then(Value::as_bool).unwrap_or(false);
        let profile = self.client.profile(&id).await?;
        Ok(summarize_profile(&profile, verbose))
    }
}

fn profile_tool(client: Arc<dyn NetworkClient>) -> ToolDescriptor {
    ToolDescriptor::builder(
        "profile",
        "Look up a profile by public id or URN id. Returns name, headline, \
         location, and current position.",
    )
    .optional_param(
        "public_id",
        ParamType::String,
        "Public profile id from the profile URL (e.g. 'john-doe-123456')",
    )
    .optional_param(
        "urn_id",
        ParamType::String,
        "Opaque URN id from a previous search result",
    )
    .optional_param(
        "verbose",
        ParamType::Boolean,
        "Include summary and education details",
    )
    .rate_category(PROFILES_CATEGORY)
    .handler(Arc::new(ProfileHandler { client }))
}

struct OwnProfileHandler {
    client: Arc<dyn NetworkClient>,
}

#[async_trait]
impl Handler for OwnProfileHandler {
    async fn call(&self, _args: Value, _ctx: &CallContext) -> Result<Value, HandlerError> {
        let profile = self.client.own_profile().await?;
        Ok(summarize_profile(&profile, true))
    }
}

fn own_profile_tool(client: Arc<dyn NetworkClient>) -> ToolDescriptor {
    ToolDescriptor::builder("own_profile", "Fetch the authenticated account's own profile.")
        .handler(Arc::new(OwnProfileHandler { client }))
}

struct ContactInfoHandler {
    client: Arc<dyn NetworkClient>,
}

#[async_trait]
impl Handler for ContactInfoHandler {
    async fn call(&self, args: Value, _ctx: &CallContext) -> Result<Value, HandlerError> {
        let id = ProfileId::from_args(&args)?;
        let info = self.client.contact_info(&id).await?;
        Ok(info)
    }
}

fn contact_info_tool(client: Arc<dyn NetworkClient>) -> ToolDescriptor {
    ToolDescriptor::builder(
        "contact_info",
        "Fetch contact information a profile has chosen to share (email, \
         phone, websites).",
    )
    .optional_param("public_id", ParamType::String, "Public profile id")
    .optional_param("urn_id", ParamType::String, "Opaque URN id")
    .rate_category(PROFILES_CATEGORY)
    .handler(Arc::new(ContactInfoHandler { client }))
}

// ---- search ----

struct SearchHandler {
    client: Arc<dyn NetworkClient>,
    limiter: Arc<RateLimiter>,
}

#[async_trait]
impl Handler for SearchHandler {
    async fn call(&self, args: Value, _ctx: &CallContext) -> Result<Value, HandlerError> {
        let keywords = require_str(&args, "keywords")?;
        let depth = match args
            .get("connection_level")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "" => None,
            "1st" | "1" | "first" => Some("F"),
            "2nd" | "2" | "second" => Some("S"),
            "3rd" | "3" | "third" => Some("O"),
            other => {
                return Err(HandlerError::msg(format!(
                    "unknown connection_level '{other}' (expected 1st, 2nd, or 3rd)"
                )));
            }
        };
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(10)
            .min(50) as usize;

        let results = self.client.search_people(keywords, depth, limit).await?;
        let summaries: Vec<Value> = results.iter().map(summarize_search_result).collect();
        Ok(json!({
            "keywords": keywords,
            "count": summaries.len(),
            "results": summaries,
            "searches_remaining_today": remaining(&self.limiter, SEARCH_CATEGORY),
        }))
    }
}

fn search_tool(client: Arc<dyn NetworkClient>, limiter: Arc<RateLimiter>) -> ToolDescriptor {
    ToolDescriptor::builder(
        "search_people",
        "Search for people by keywords. Returns matching profiles with ids \
         for further lookup.",
    )
    .param("keywords", ParamType::String, "Search keywords")
    .optional_param(
        "connection_level",
        ParamType::String,
        "Filter by connection level: '1st', '2nd', or '3rd'",
    )
    .optional_param(
        "limit",
        ParamType::Integer,
        "Maximum number of results (default 10, max 50)",
    )
    .rate_category(SEARCH_CATEGORY)
    .handler(Arc::new(SearchHandler { client, limiter }))
}

struct ConnectionsHandler {
    client: Arc<dyn NetworkClient>,
}

#[async_trait]
impl Handler for ConnectionsHandler {
    async fn call(&self, args: Value, _ctx: &CallContext) -> Result<Value, HandlerError> {
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(50)
            .min(200) as usize;
        let connections = self.client.connections(limit).await?;
        let summaries: Vec<Value> = connections.iter().map(summarize_search_result).collect();
        Ok(json!({ "count": summaries.len(), "connections": summaries }))
    }
}

fn connections_tool(client: Arc<dyn NetworkClient>) -> ToolDescriptor {
    ToolDescriptor::builder(
        "connections",
        "List the account's first-degree connections.",
    )
    .optional_param(
        "limit",
        ParamType::Integer,
        "Maximum number of connections (default 50, max 200)",
    )
    .rate_category(PROFILES_CATEGORY)
    .handler(Arc::new(ConnectionsHandler { client }))
}

// ---- messaging ----

struct ConversationsHandler {
    client: Arc<dyn NetworkClient>,
}

#[async_trait]
impl Handler for ConversationsHandler {
    async fn call(&self, _args: Value, _ctx: &CallContext) -> Result<Value, HandlerError> {
        let conversations = self.client.conversations().await?;
        Ok(json!({
            "count": conversations.len(),
            "conversations": conversations,
        }))
    }
}

fn conversations_tool(client: Arc<dyn NetworkClient>) -> ToolDescriptor {
    ToolDescriptor::builder(
        "conversations",
        "List recent message threads with participants and last activity.",
    )
    .handler(Arc::new(ConversationsHandler { client }))
}

struct ConversationHandler {
    client: Arc<dyn NetworkClient>,
}

#[async_trait]
impl Handler for ConversationHandler {
    async fn call(&self, args: Value, _ctx: &CallContext) -> Result<Value, HandlerError> {
        let conversation_id = require_str(&args, "conversation_id")?;
        let conversation = self.client.conversation(conversation_id).await?;
        Ok(conversation)
    }
}

fn conversation_tool(client: Arc<dyn NetworkClient>) -> ToolDescriptor {
    ToolDescriptor::builder("conversation", "Fetch the messages in one conversation.")
        .param(
            "conversation_id",
            ParamType::String,
            "Conversation id from the conversations listing",
        )
        .handler(Arc::new(ConversationHandler { client }))
}

fn check_message_body(body: &str) -> Result<(), HandlerError> {
    if body.is_empty() {
        return Err(HandlerError::msg("message must not be empty"));
    }
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(HandlerError::msg(format!(
            "message too long (max {MAX_MESSAGE_CHARS} characters)"
        )));
    }
    Ok(())
}

struct SendMessageHandler {
    client: Arc<dyn NetworkClient>,
    limiter: Arc<RateLimiter>,
}

#[async_trait]
impl Handler for SendMessageHandler {
    async fn call(&self, args: Value, _ctx: &CallContext) -> Result<Value, HandlerError> {
        let recipient_urn = require_str(&args, "recipient_urn")?;
        let message = require_str(&args, "message")?;
        check_message_body(message)?;

        self.client.send_message(recipient_urn, message).await?;
        Ok(json!({
            "sent": true,
            "recipient_urn": recipient_urn,
            "length": message.chars().count(),
            "messages_remaining_today": remaining(&self.limiter, MESSAGES_CATEGORY),
        }))
    }
}

fn send_message_tool(client: Arc<dyn NetworkClient>, limiter: Arc<RateLimiter>) -> ToolDescriptor {
    ToolDescriptor::builder(
        "send_message",
        "Send a direct message. Heavily rate limited; use sparingly to keep \
         the account in good standing.",
    )
    .param(
        "recipient_urn",
        ParamType::String,
        "URN id of the recipient, from a profile lookup or search",
    )
    .param("message", ParamType::String, "Message text to send")
    .unsafe_op()
    .rate_category(MESSAGES_CATEGORY)
    .handler(Arc::new(SendMessageHandler { client, limiter }))
}

struct ReplyHandler {
    client: Arc<dyn NetworkClient>,
    limiter: Arc<RateLimiter>,
}

#[async_trait]
impl Handler for ReplyHandler {
    async fn call(&self, args: Value, _ctx: &CallContext) -> Result<Value, HandlerError> {
        let conversation_id = require_str(&args, "conversation_id")?;
        let message = require_str(&args, "message")?;
        check_message_body(message)?;

        self.client.reply(conversation_id, message).await?;
        Ok(json!({
            "sent": true,
            "conversation_id": conversation_id,
            "messages_remaining_today": remaining(&self.limiter, MESSAGES_CATEGORY),
        }))
    }
}

fn reply_tool(client: Arc<dyn NetworkClient>, limiter: Arc<RateLimiter>) -> ToolDescriptor {
    ToolDescriptor::builder("reply", "Reply to an existing conversation.")
        .param(
            "conversation_id",
            ParamType::String,
            "Conversation id from the conversations listing",
        )
        .param("message", ParamType::String, "Reply text")
        .unsafe_op()
        .rate_category(MESSAGES_CATEGORY)
        .handler(Arc::new(ReplyHandler { client, limiter }))
}

// ---- batch ----

struct BatchProfilesHandler {
    client: Arc<dyn NetworkClient>,
    limiter: Arc<RateLimiter>,
}

#[async_trait]
impl Handler for BatchProfilesHandler {
    async fn call(&self, args: Value, _ctx: &CallContext) -> Result<Value, HandlerError> {
        let items = args
            .get("profiles")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if items.is_empty() {
            return Err(HandlerError::msg("no profiles specified"));
        }
        if items.len() > MAX_BATCH_PROFILES {
            return Err(HandlerError::msg(format!(
                "maximum {MAX_BATCH_PROFILES} profiles per batch"
            )));
        }

        let mut results = Vec::new();
        let mut errors = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let id = match ProfileId::from_args(item) {
                Ok(id) => id,
                Err(e) => {
                    errors.push(json!({ "index": index, "error": e.to_string() }));
                    continue;
                }
            };

            // Each item consumes one profile-lookup slot; the batch
            // stops as soon as admission is denied.
            match self.limiter.admit(PROFILES_CATEGORY).await {
                AdmitResult::Denied { retry_after } => {
                    errors.push(json!({
                        "index": index,
                        "error": format!("profile quota exhausted, stopping batch (retry after {retry_after})"),
                    }));
                    break;
                }
                AdmitResult::Allowed { wait } => {
                    if !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }
                }
            }

            match self.client.profile(&id).await {
                Ok(profile) => results.push(json!({
                    "index": index,
                    "profile": summarize_profile(&profile, false),
                })),
                Err(e) => errors.push(json!({ "index": index, "error": e.to_string() })),
            }
        }

        Ok(json!({
            "requested": items.len(),
            "retrieved": results.len(),
            "results": results,
            "errors": errors,
            "lookups_remaining_today": remaining(&self.limiter, PROFILES_CATEGORY),
        }))
    }
}

fn batch_profiles_tool(
    client: Arc<dyn NetworkClient>,
    limiter: Arc<RateLimiter>,
) -> ToolDescriptor {
    ToolDescriptor::builder(
        "batch_profiles",
        "Fetch several profiles in one call. Each profile still consumes a \
         lookup slot and the batch stops early when the quota runs out.",
    )
    .param(
        "profiles",
        ParamType::Array,
        "Array of objects with 'public_id' and/or 'urn_id'",
    )
    .unsafe_op()
    // Generous ceiling: the batch sits out the per-item spacing itself.
    .timeout(std::time::Duration::from_secs(MAX_BATCH_PROFILES as u64 * 60))
    .handler(Arc::new(BatchProfilesHandler { client, limiter }))
}

// ---- status ----

struct QuotaStatusHandler {
    limiter: Arc<RateLimiter>,
}

#[async_trait]
impl Handler for QuotaStatusHandler {
    async fn call(&self, _args: Value, _ctx: &CallContext) -> Result<Value, HandlerError> {
        Ok(json!({ "categories": self.limiter.status_all() }))
    }
}

fn quota_status_tool(limiter: Arc<RateLimiter>) -> ToolDescriptor {
    ToolDescriptor::builder(
        "rate_limit_status",
        "Show remaining daily operations per rate-limit category. Limits \
         reset at local midnight.",
    )
    .handler(Arc::new(QuotaStatusHandler { limiter }))
}

fn remaining(limiter: &RateLimiter, category: &str) -> Option<u32> {
    limiter.status(category).map(|s| s.remaining)
}

// ---- result shaping ----

fn text<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn trimmed_urn(raw: &str) -> &str {
    raw.rsplit(':').next().unwrap_or(raw)
}

/// Compact view of a raw profile payload. Fields may live at the top
/// level or under a nested `miniProfile`, depending on which endpoint
/// produced the payload.
fn summarize_profile(profile: &Value, verbose: bool) -> Value {
    let mini = profile.get("miniProfile").cloned().unwrap_or(Value::Null);
    let mut out = Map::new();

    let first = text(profile, &["firstName"])
        .or_else(|| text(&mini, &["firstName"]))
        .unwrap_or("");
    let last = text(profile, &["lastName"])
        .or_else(|| text(&mini, &["lastName"]))
        .unwrap_or("");
    let name = format!("{first} {last}");
    out.insert("name".to_string(), json!(name.trim()));

    if let Some(headline) = text(profile, &["headline", "occupation"])
        .or_else(|| text(&mini, &["occupation"]))
    {
        out.insert("headline".to_string(), json!(headline));
    }
    if let Some(public_id) = text(profile, &["public_id", "publicIdentifier"])
        .or_else(|| text(&mini, &["publicIdentifier"]))
    {
        out.insert("public_id".to_string(), json!(public_id));
    }
    if let Some(urn) = text(profile, &["urn_id", "entityUrn"]).or_else(|| text(&mini, &["entityUrn"]))
    {
        out.insert("urn_id".to_string(), json!(trimmed_urn(urn)));
    }
    if let Some(location) = text(profile, &["locationName", "geoLocationName"]) {
        out.insert("location".to_string(), json!(location));
    }
    if let Some(industry) = text(profile, &["industryName"]) {
        out.insert("industry".to_string(), json!(industry));
    }

    if let Some(current) = profile
        .get("experience")
        .and_then(Value::as_array)
        .and_then(|jobs| jobs.first())
    {
        let title = text(current, &["title"]).unwrap_or("");
        let company = text(current, &["companyName"]).unwrap_or("");
        if !title.is_empty() || !company.is_empty() {
            out.insert(
                "current_position".to_string(),
                json!(format!("{title} at {company}").trim()),
            );
        }
    }

    if verbose {
        if let Some(summary) = text(profile, &["summary"]) {
            let truncated: String = summary.chars().take(500).collect();
            out.insert("summary".to_string(), json!(truncated));
        }
        if let Some(education) = profile.get("education").and_then(Value::as_array) {
            let schools: Vec<Value> = education
                .iter()
                .take(3)
                .map(|edu| {
                    json!({
                        "school": text(edu, &["schoolName"]).unwrap_or(""),
                        "degree": text(edu, &["degreeName"]).unwrap_or(""),
                        "field": text(edu, &["fieldOfStudy"]).unwrap_or(""),
                    })
                })
                .collect();
            if !schools.is_empty() {
                out.insert("education".to_string(), json!(schools));
            }
        }
    }

    Value::Object(out)
}

/// Compact view of one search or connections entry.
fn summarize_search_result(result: &Value) -> Value {
    let mini = result.get("miniProfile").cloned().unwrap_or(Value::Null);
    let mut out = Map::new();

    let first = text(result, &["firstName"])
        .or_else(|| text(&mini, &["firstName"]))
        .unwrap_or("");
    let last = text(result, &["lastName"])
        .or_else(|| text(&mini, &["lastName"]))
        .unwrap_or("");
    let name = format!("{first} {last}");
    out.insert("name".to_string(), json!(name.trim()));

    if let Some(headline) = text(result, &["headline", "jobtitle", "occupation"])
        .or_else(|| text(&mini, &["occupation"]))
    {
        out.insert("headline".to_string(), json!(headline));
    }
    if let Some(location) = text(result, &["location", "locationName"]) {
        out.insert("location".to_string(), json!(location));
    }
    if let Some(public_id) = text(result, &["public_id", "publicIdentifier"])
        .or_else(|| text(&mini, &["publicIdentifier"]))
    {
        out.insert("public_id".to_string(), json!(public_id));
    }
    if let Some(urn) = text(result, &["urn_id", "entityUrn"]).or_else(|| text(&mini, &["entityUrn"]))
    {
        out.insert("urn_id".to_string(), json!(trimmed_urn(urn)));
    }

    Value::Object(out)
}
