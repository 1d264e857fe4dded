//! Consumer tags identify a subscription on a channel.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Prefix used for tags generated on the client side.
const GENERATED_TAG_PREFIX: &str = "ctag-";

/// The identifier of an active subscription.
///
/// Tags are assigned either by the broker (when the subscription request carries an empty tag) or
/// by the client. A tag is unique while the subscription is active and may be reused once the
/// subscription has been cancelled.
///
/// Cloning a tag only bumps a reference count, so it can be handed to worker tasks freely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerTag(Arc<str>);

impl ConsumerTag {
    /// Creates a new tag from the given string.
    pub fn new(tag: impl Into<Arc<str>>) -> Self {
        ConsumerTag(tag.into())
    }

    /// Generates a fresh client-side tag like `ctag-4f0c...`.
    pub fn generate() -> Self {
        let tag = format!("{}{}", GENERATED_TAG_PREFIX, Uuid::new_v4().simple());
        ConsumerTag(tag.into())
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Lets the registry be queried with a plain `&str` on the delivery path.
impl Borrow<str> for ConsumerTag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ConsumerTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConsumerTag {
    fn from(tag: &str) -> Self {
        ConsumerTag(tag.into())
    }
}

impl From<String> for ConsumerTag {
    fn from(tag: String) -> Self {
        ConsumerTag(tag.into())
    }
}

impl PartialEq<str> for ConsumerTag {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for ConsumerTag {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}
