//! Node-type registry: type tag → descriptor.
//!
//! The registry is built once at startup and then only read.  The engine
//! receives it as an `Arc<NodeRegistry>`; nothing looks handlers up from
//! global state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::builtin::{
    AiHandler, ApiCallHandler, EmailSendHandler, FilterHandler, FormHandler, GenericHandler,
    SlackHandler, TransformHandler, WebhookHandler,
};
use crate::traits::NodeHandler;
use crate::value::{properties_from_json, Properties};

/// Palette group a node type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Input,
    Processing,
    Output,
    Integration,
    Communication,
    Payments,
    Cloud,
    Analytics,
    Custom,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::Processing => "processing",
            Self::Output => "output",
            Self::Integration => "integration",
            Self::Communication => "communication",
            Self::Payments => "payments",
            Self::Cloud => "cloud",
            Self::Analytics => "analytics",
            Self::Custom => "custom",
        };
        f.pad(s)
    }
}

/// Everything the engine and editor need to know about one node type.
#[derive(Clone)]
pub struct NodeDescriptor {
    pub type_tag: String,
    pub category: Category,
    /// Whether the node accepts incoming connections.
    pub has_input: bool,
    /// Whether the node can feed downstream nodes.
    pub has_output: bool,
    /// Configuration a freshly placed node starts with.
    pub default_properties: Properties,
    pub handler: Arc<dyn NodeHandler>,
}

impl NodeDescriptor {
    pub fn new(
        type_tag: impl Into<String>,
        category: Category,
        handler: Arc<dyn NodeHandler>,
    ) -> Self {
        Self {
            type_tag: type_tag.into(),
            category,
            has_input: true,
            has_output: true,
            default_properties: Properties::new(),
            handler,
        }
    }

    pub fn ports(mut self, has_input: bool, has_output: bool) -> Self {
        self.has_input = has_input;
        self.has_output = has_output;
        self
    }

    pub fn defaults(mut self, properties: Properties) -> Self {
        self.default_properties = properties;
        self
    }
}

impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("type_tag", &self.type_tag)
            .field("category", &self.category)
            .field("has_input", &self.has_input)
            .field("has_output", &self.has_output)
            .field("default_properties", &self.default_properties)
            .finish_non_exhaustive()
    }
}

/// Immutable mapping from type tag to [`NodeDescriptor`].
///
/// Unknown type tags resolve to the fallback descriptor.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    descriptors: HashMap<String, NodeDescriptor>,
    /// Registration order, for listing.
    order: Vec<String>,
    fallback: NodeDescriptor,
}

impl NodeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The descriptor for `type_tag`, or the fallback.
    pub fn descriptor(&self, type_tag: &str) -> &NodeDescriptor {
        self.descriptors.get(type_tag).unwrap_or(&self.fallback)
    }

    pub fn handler(&self, type_tag: &str) -> Arc<dyn NodeHandler> {
        Arc::clone(&self.descriptor(type_tag).handler)
    }

    pub fn default_properties(&self, type_tag: &str) -> Properties {
        self.descriptor(type_tag).default_properties.clone()
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.descriptors.contains_key(type_tag)
    }

    /// Registered descriptors in registration order (fallback excluded).
    pub fn iter(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.order.iter().filter_map(|tag| self.descriptors.get(tag))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// The standard catalog: dedicated handlers for the core node types,
    /// the generic handler for every other integration.
    pub fn builtin() -> Self {
        let generic: Arc<dyn NodeHandler> = Arc::new(GenericHandler);
        let ai: Arc<dyn NodeHandler> = Arc::new(AiHandler);
        let d = |tag: &str, category, handler: &Arc<dyn NodeHandler>, defaults| {
            NodeDescriptor::new(tag, category, Arc::clone(handler)).defaults(properties_from_json(defaults))
        };
        use Category::*;

        Self::builder()
            // Input
            .register(
                d("webhook", Input, &(Arc::new(WebhookHandler) as Arc<dyn NodeHandler>),
                  json!({ "url": "/webhook/incoming", "method": "POST", "authentication": false }))
                .ports(false, true),
            )
            .register(
                d("form", Input, &(Arc::new(FormHandler) as Arc<dyn NodeHandler>),
                  json!({ "formName": "Contact", "fields": ["name", "email", "message"], "validation": true }))
                .ports(false, true),
            )
            .register(
                d("email-trigger", Input, &generic,
                  json!({ "provider": "Gmail", "folder": "Inbox", "filters": [] }))
                .ports(false, true),
            )
            .register(
                d("schedule", Input, &generic,
                  json!({ "frequency": "daily", "time": "09:00", "timezone": "UTC" }))
                .ports(false, true),
            )
            // Processing
            .register(d("chatgpt", Processing, &ai,
                json!({ "model": "gpt-4", "temperature": 0.7, "maxTokens": 1000,
                        "systemPrompt": "You are a helpful workflow assistant" })))
            .register(d("gemini", Processing, &ai,
                json!({ "model": "gemini-pro", "temperature": 0.7, "safetySettings": "high" })))
            .register(d("filter", Processing, &(Arc::new(FilterHandler) as Arc<dyn NodeHandler>),
                json!({ "conditions": [], "operator": "AND", "action": "continue" })))
            .register(d("transform", Processing, &(Arc::new(TransformHandler) as Arc<dyn NodeHandler>),
                json!({ "mappings": {}, "format": "json" })))
            // Output
            .register(
                d("email-send", Output, &(Arc::new(EmailSendHandler) as Arc<dyn NodeHandler>),
                  json!({ "provider": "SMTP", "template": "default", "bcc": false }))
                .ports(true, false),
            )
            .register(
                d("slack", Output, &(Arc::new(SlackHandler) as Arc<dyn NodeHandler>),
                  json!({ "channel": "#general", "username": "Workflow Bot", "icon": ":robot_face:" }))
                .ports(true, false),
            )
            .register(
                d("database", Output, &generic,
                  json!({ "connection": "default", "table": "automation_data", "operation": "insert" }))
                .ports(true, false),
            )
            .register(d("api-call", Output, &(Arc::new(ApiCallHandler) as Arc<dyn NodeHandler>),
                json!({ "url": "", "method": "POST", "headers": {}, "timeout": 30000 })))
            // Integration
            .register(d("zapier", Integration, &generic, json!({ "zapId": "", "trigger": "webhook" })))
            .register(d("make", Integration, &generic, json!({ "scenarioId": "", "webhookUrl": "" })))
            .register(d("google-sheets", Integration, &generic,
                json!({ "spreadsheetId": "", "sheetName": "Data", "operation": "append" })))
            .register(d("crm", Integration, &generic,
                json!({ "system": "HubSpot", "action": "create_contact", "pipeline": "sales" })))
            // Communication
            .register(d("whatsapp", Communication, &generic,
                json!({ "provider": "Meta Cloud API", "phoneNumberId": "", "accessToken": "",
                        "messageType": "text", "templateName": "", "recipientPhone": "" })))
            .register(d("telegram", Communication, &generic,
                json!({ "botToken": "", "chatId": "", "parseMode": "HTML",
                        "messageType": "text", "disableNotification": false })))
            .register(d("twilio", Communication, &generic,
                json!({ "accountSid": "", "authToken": "", "fromNumber": "",
                        "toNumber": "", "messageType": "sms" })))
            .register(
                d("discord", Communication, &generic,
                  json!({ "webhookUrl": "", "username": "Workflow Bot", "avatarUrl": "",
                          "embedColor": "#7c3aed", "mentionRole": "" }))
                .ports(true, false),
            )
            // Payments
            .register(d("stripe", Payments, &generic,
                json!({ "secretKey": "", "webhookSecret": "", "action": "create_payment_intent",
                        "currency": "usd", "amount": 0, "customerEmail": "" })))
            .register(d("paypal", Payments, &generic,
                json!({ "clientId": "", "clientSecret": "", "environment": "sandbox",
                        "action": "create_order", "currency": "USD" })))
            .register(d("mercadopago", Payments, &generic,
                json!({ "accessToken": "", "action": "create_preference",
                        "currency": "COP", "notificationUrl": "" })))
            // Cloud
            .register(d("aws-s3", Cloud, &generic,
                json!({ "accessKeyId": "", "secretAccessKey": "", "region": "us-east-1",
                        "bucket": "", "action": "upload", "acl": "private" })))
            .register(d("firebase", Cloud, &generic,
                json!({ "projectId": "", "serviceAccount": "", "collection": "",
                        "action": "add_document", "documentId": "" })))
            .register(d("mongodb", Cloud, &generic,
                json!({ "connectionString": "", "database": "", "collection": "",
                        "action": "insertOne", "query": {} })))
            .register(d("supabase", Cloud, &generic,
                json!({ "projectUrl": "", "anonKey": "", "table": "",
                        "action": "insert", "filters": [] })))
            // Analytics
            .register(
                d("google-analytics", Analytics, &generic,
                  json!({ "measurementId": "", "apiSecret": "", "eventName": "", "eventParams": {} }))
                .ports(true, false),
            )
            .register(
                d("mixpanel", Analytics, &generic,
                  json!({ "projectToken": "", "eventName": "", "distinctId": "", "properties": {} }))
                .ports(true, false),
            )
            .register(d("segment", Analytics, &generic,
                json!({ "writeKey": "", "eventType": "track", "eventName": "",
                        "userId": "", "traits": {} })))
            .fallback(generic)
            .build()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Collects descriptors; [`RegistryBuilder::build`] freezes them.
#[derive(Default)]
pub struct RegistryBuilder {
    descriptors: HashMap<String, NodeDescriptor>,
    order: Vec<String>,
    fallback: Option<Arc<dyn NodeHandler>>,
}

impl RegistryBuilder {
    /// Add a descriptor.  Registering a tag twice replaces the earlier one.
    pub fn register(mut self, descriptor: NodeDescriptor) -> Self {
        let tag = descriptor.type_tag.clone();
        if self.descriptors.insert(tag.clone(), descriptor).is_none() {
            self.order.push(tag);
        }
        self
    }

    /// Shorthand for a type with default ports and no default properties.
    pub fn handler(self, type_tag: &str, category: Category, handler: Arc<dyn NodeHandler>) -> Self {
        self.register(NodeDescriptor::new(type_tag, category, handler))
    }

    /// Handler used for unregistered type tags (default: [`GenericHandler`]).
    pub fn fallback(mut self, handler: Arc<dyn NodeHandler>) -> Self {
        self.fallback = Some(handler);
        self
    }

    pub fn build(self) -> NodeRegistry {
        let handler = self
            .fallback
            .unwrap_or_else(|| Arc::new(GenericHandler) as Arc<dyn NodeHandler>);
        debug!(node_types = self.order.len(), "node registry built");
        NodeRegistry {
            descriptors: self.descriptors,
            order: self.order,
            fallback: NodeDescriptor::new("custom", Category::Custom, handler),
        }
    }
}
