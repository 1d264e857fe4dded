//! This module defines the `Delivery` handed to consumers and its `DeliveryBuilder`.
//!
//! The protocol layer decodes the wire frames and builds a `Delivery`; this crate only routes it.

use std::collections::HashMap;

use crate::tag::ConsumerTag;

/// Message properties carried alongside a delivery.
///
/// Values are kept as the protocol layer decoded them. Header values are flattened to strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryProperties {
    /// MIME content type of the body
    pub content_type: Option<String>,
    /// MIME content encoding of the body
    pub content_encoding: Option<String>,
    /// Application correlation identifier
    pub correlation_id: Option<String>,
    /// Address to reply to
    pub reply_to: Option<String>,
    /// Application message identifier
    pub message_id: Option<String>,
    /// Application headers
    pub headers: HashMap<String, String>,
}

/// A message pushed by the broker to a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The subscription this delivery belongs to
    pub consumer_tag: ConsumerTag,

    /// Channel-scoped sequence number used to acknowledge the delivery
    pub delivery_tag: u64,

    /// Whether the broker has attempted to deliver this message before
    pub redelivered: bool,

    /// The exchange the message was published to
    pub exchange: String,

    /// The routing key used when publishing
    pub routing_key: String,

    /// Message properties
    pub properties: DeliveryProperties,

    /// Raw message body
    pub body: Vec<u8>,
}

impl Delivery {
    /// Creates a new `DeliveryBuilder` instance.
    pub fn builder() -> DeliveryBuilder {
        DeliveryBuilder::new()
    }
}

/// Builder for `Delivery`
#[derive(Debug, Default)]
pub struct DeliveryBuilder {
    consumer_tag: Option<ConsumerTag>,
    delivery_tag: Option<u64>,
    redelivered: bool,
    exchange: String,
    routing_key: String,
    properties: DeliveryProperties,
    body: Vec<u8>,
}

impl DeliveryBuilder {
    /// Creates a new `DeliveryBuilder` with no consumer tag and no delivery tag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the consumer tag.
    pub fn consumer_tag(mut self, consumer_tag: impl Into<ConsumerTag>) -> Self {
        self.consumer_tag = Some(consumer_tag.into());
        self
    }

    /// Sets the delivery tag.
    pub fn delivery_tag(mut self, delivery_tag: u64) -> Self {
        self.delivery_tag = Some(delivery_tag);
        self
    }

    /// Marks the delivery as redelivered.
    pub fn redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    /// Sets the exchange.
    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    /// Sets the routing key.
    pub fn routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = routing_key.into();
        self
    }

    /// Sets the message properties.
    pub fn properties(mut self, properties: DeliveryProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Sets the message body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the `Delivery`.
    ///
    /// # Errors
    ///
    /// Returns an error if the consumer tag or the delivery tag are not set.
    pub fn build(self) -> Result<Delivery, DeliveryBuilderError> {
        Ok(Delivery {
            consumer_tag: self
                .consumer_tag
                .ok_or(DeliveryBuilderError::ConsumerTagMissing)?,
            delivery_tag: self
                .delivery_tag
                .ok_or(DeliveryBuilderError::DeliveryTagMissing)?,
            redelivered: self.redelivered,
            exchange: self.exchange,
            routing_key: self.routing_key,
            properties: self.properties,
            body: self.body,
        })
    }
}

/// Errors that can occur when building a `Delivery`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeliveryBuilderError {
    /// The consumer tag is missing.
    #[error("Delivery consumer tag is required")]
    ConsumerTagMissing,
    /// The delivery tag is missing.
    #[error("Delivery tag is required")]
    DeliveryTagMissing,
}
