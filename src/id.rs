//! Colon-tagged identifiers for document objects.
//!
//! Every addressable location in the document carries an ASCII id made of
//! colon-joined tags: a [`NodeId`] has exactly four tags (`"0:1:2:3"`), a
//! Meta [`ParameterId`] five, a User [`ParameterId`] six. Stripping the
//! extra one or two trailing tags of a parameter id recovers the id of the
//! owning node.

use std::fmt;

use crate::error::Error;

/// Number of tags in a node id.
pub const NODE_ID_TAGS: usize = 4;
/// Number of tags in a Meta parameter id.
pub const META_PARAM_ID_TAGS: usize = 5;
/// Number of tags in a User parameter id.
pub const USER_PARAM_ID_TAGS: usize = 6;

/// Splits a raw id on `':'`.
///
/// Empty trailing tokens are not appended, so a malformed trailing colon
/// simply yields fewer tags rather than an empty one.
pub fn split_tags(id: &str) -> Vec<&str> {
    id.split(':').filter(|tag| !tag.is_empty()).collect()
}

/// Identifier of a document node: four colon-joined tags.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    /// Validates and wraps a raw id string.
    ///
    /// Fails with [`Error::MalformedId`] unless the string carries exactly
    /// four tags.
    pub fn new(id: impl Into<String>) -> Result<Self, Error> {
        let id = id.into();
        if split_tags(&id).len() != NODE_ID_TAGS {
            return Err(Error::MalformedId { id });
        }
        Ok(Self(id))
    }

    /// The raw colon-joined form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Kind of a parameter id, decided by its tag count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamIdKind {
    /// System-side parameter: node id plus one extra tag.
    Meta,
    /// Domain-side parameter: node id plus two extra tags.
    User,
}

/// Identifier of a parameter: five (Meta) or six (User) colon-joined tags.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterId(String);

impl ParameterId {
    /// Validates and wraps a raw id string.
    ///
    /// Fails with [`Error::MalformedId`] unless the string carries five or
    /// six tags.
    pub fn new(id: impl Into<String>) -> Result<Self, Error> {
        let id = id.into();
        match split_tags(&id).len() {
            META_PARAM_ID_TAGS | USER_PARAM_ID_TAGS => Ok(Self(id)),
            _ => Err(Error::MalformedId { id }),
        }
    }

    /// The raw colon-joined form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Meta or User, decided by the tag count.
    pub fn kind(&self) -> ParamIdKind {
        if split_tags(&self.0).len() == META_PARAM_ID_TAGS {
            ParamIdKind::Meta
        } else {
            ParamIdKind::User
        }
    }

    /// Id of the node owning this parameter.
    pub fn node_id(&self) -> NodeId {
        // The constructor guarantees 5 or 6 tags, so this cannot fail.
        node_id_by_parameter_id(self).expect("validated parameter id")
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Recovers the owning node id from a parameter id.
///
/// Five tags strip one, six tags strip two; any other count is a malformed
/// id and reported as such rather than aborting.
pub fn node_id_by_parameter_id(pid: &ParameterId) -> Result<NodeId, Error> {
    let tags = split_tags(pid.as_str());
    let keep = match tags.len() {
        META_PARAM_ID_TAGS => NODE_ID_TAGS,
        USER_PARAM_ID_TAGS => NODE_ID_TAGS,
        _ => {
            return Err(Error::MalformedId {
                id: pid.as_str().to_owned(),
            })
        }
    };
    NodeId::new(tags[..keep].join(":"))
}

/// Trims an arbitrary object id down to a parameter id.
///
/// Returns `None` for ids with fewer than five tags; otherwise keeps the
/// leading `min(6, tag_count)` tags.
pub fn trim_to_parameter_id(object_id: &str) -> Option<ParameterId> {
    let tags = split_tags(object_id);
    if tags.len() < META_PARAM_ID_TAGS {
        return None;
    }
    let keep = tags.len().min(USER_PARAM_ID_TAGS);
    ParameterId::new(tags[..keep].join(":")).ok()
}
