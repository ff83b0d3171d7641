//! Concrete message catalog.
//!
//! Each message is a plain data struct plus a static [`Schema`] table;
//! `encode` goes through the generic builder, `decode` validates with
//! [`StructParser::check_schema_validity`] before reading a single field.

use super::builder::MessageBuilder;
use super::parser::StructParser;
use super::schema::{Field, FieldKind, Schema, SchemaKind};
use crate::error::Result;

/// Tags of [`ATTRIBUTE_PATH`] members.
pub mod path_tags {
    /// Endpoint id.
    pub const ENDPOINT: u8 = 0;
    /// Cluster id.
    pub const CLUSTER: u8 = 1;
    /// Attribute id.
    pub const ATTRIBUTE: u8 = 2;
}

/// Tags of [`STATUS`] members.
pub mod status_tags {
    /// Protocol-level status code.
    pub const STATUS: u8 = 0;
    /// Cluster-specific status code.
    pub const CLUSTER_STATUS: u8 = 1;
}

/// Tags of [`ATTRIBUTE_STATUS`] members.
pub mod attribute_status_tags {
    /// Attribute path the status refers to.
    pub const PATH: u8 = 0;
    /// Outcome for that path.
    pub const ERROR_STATUS: u8 = 1;
}

/// Tags of [`WRITE_RESPONSE`] members.
pub mod write_response_tags {
    /// Per-attribute outcome list.
    pub const WRITE_RESPONSES: u8 = 0;
}

/// Tags of [`STATUS_RESPONSE`] members.
pub mod status_response_tags {
    /// Overall status code.
    pub const STATUS: u8 = 0;
}

/// Path addressing one attribute. All members optional: wildcards omit.
pub static ATTRIBUTE_PATH: Schema = Schema {
    name: "AttributePath",
    kind: SchemaKind::Structure {
        fields: &[
            Field {
                tag: path_tags::ENDPOINT,
                kind: FieldKind::UnsignedInt,
                required: false,
            },
            Field {
                tag: path_tags::CLUSTER,
                kind: FieldKind::UnsignedInt,
                required: false,
            },
            Field {
                tag: path_tags::ATTRIBUTE,
                kind: FieldKind::UnsignedInt,
                required: false,
            },
        ],
        root: false,
    },
};

/// Status code pair.
pub static STATUS: Schema = Schema {
    name: "Status",
    kind: SchemaKind::Structure {
        fields: &[
            Field {
                tag: status_tags::STATUS,
                kind: FieldKind::UnsignedInt,
                required: true,
            },
            Field {
                tag: status_tags::CLUSTER_STATUS,
                kind: FieldKind::UnsignedInt,
                required: false,
            },
        ],
        root: false,
    },
};

/// Outcome of one attribute write: path plus status.
pub static ATTRIBUTE_STATUS: Schema = Schema {
    name: "AttributeStatus",
    kind: SchemaKind::Structure {
        fields: &[
            Field {
                tag: attribute_status_tags::PATH,
                kind: FieldKind::Structure(&ATTRIBUTE_PATH),
                required: true,
            },
            Field {
                tag: attribute_status_tags::ERROR_STATUS,
                kind: FieldKind::Structure(&STATUS),
                required: true,
            },
        ],
        root: false,
    },
};

/// Array of [`ATTRIBUTE_STATUS`] entries.
pub static ATTRIBUTE_STATUS_LIST: Schema = Schema {
    name: "AttributeStatusList",
    kind: SchemaKind::Array {
        entry: &ATTRIBUTE_STATUS,
    },
};

/// Root response to a write request.
pub static WRITE_RESPONSE: Schema = Schema {
    name: "WriteResponse",
    kind: SchemaKind::Structure {
        fields: &[Field {
            tag: write_response_tags::WRITE_RESPONSES,
            kind: FieldKind::Array(&ATTRIBUTE_STATUS_LIST),
            required: true,
        }],
        root: true,
    },
};

/// Root standalone status report.
pub static STATUS_RESPONSE: Schema = Schema {
    name: "StatusResponse",
    kind: SchemaKind::Structure {
        fields: &[Field {
            tag: status_response_tags::STATUS,
            kind: FieldKind::UnsignedInt,
            required: true,
        }],
        root: true,
    },
};

/// Path addressing one attribute on one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributePath {
    /// Endpoint id, absent for wildcard.
    pub endpoint: Option<u16>,
    /// Cluster id, absent for wildcard.
    pub cluster: Option<u32>,
    /// Attribute id, absent for wildcard.
    pub attribute: Option<u32>,
}

/// Status code pair: protocol status plus optional cluster status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Protocol-level status code.
    pub status: u8,
    /// Cluster-specific refinement, if the cluster defines one.
    pub cluster_status: Option<u8>,
}

/// Outcome of one attribute write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeStatus {
    /// Attribute the outcome refers to.
    pub path: AttributePath,
    /// Outcome for that attribute.
    pub status: Status,
}

/// Response to a write request: one outcome per written attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteResponse {
    /// Per-attribute outcomes; may be empty.
    pub write_responses: Vec<AttributeStatus>,
}

/// Standalone status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    /// Overall status code.
    pub status: u32,
}

impl AttributePath {
    fn read(parser: &StructParser<'_>) -> Result<Self> {
        Ok(Self {
            endpoint: optional(parser.get_u16(path_tags::ENDPOINT))?,
            cluster: optional(parser.get_u32(path_tags::CLUSTER))?,
            attribute: optional(parser.get_u32(path_tags::ATTRIBUTE))?,
        })
    }

    fn write(&self, b: &mut super::builder::StructBuilder<'_>) {
        if let Some(endpoint) = self.endpoint {
            b.put_uint(path_tags::ENDPOINT, u64::from(endpoint));
        }
        if let Some(cluster) = self.cluster {
            b.put_uint(path_tags::CLUSTER, u64::from(cluster));
        }
        if let Some(attribute) = self.attribute {
            b.put_uint(path_tags::ATTRIBUTE, u64::from(attribute));
        }
    }
}

impl Status {
    fn read(parser: &StructParser<'_>) -> Result<Self> {
        Ok(Self {
            status: parser.get_u8(status_tags::STATUS)?,
            cluster_status: optional(parser.get_u8(status_tags::CLUSTER_STATUS))?,
        })
    }

    fn write(&self, b: &mut super::builder::StructBuilder<'_>) {
        b.put_uint(status_tags::STATUS, u64::from(self.status));
        if let Some(cluster_status) = self.cluster_status {
            b.put_uint(status_tags::CLUSTER_STATUS, u64::from(cluster_status));
        }
    }
}

impl AttributeStatus {
    fn read(parser: &StructParser<'_>) -> Result<Self> {
        Ok(Self {
            path: AttributePath::read(&parser.get_struct(attribute_status_tags::PATH)?)?,
            status: Status::read(&parser.get_struct(attribute_status_tags::ERROR_STATUS)?)?,
        })
    }

    fn write(&self, b: &mut super::builder::StructBuilder<'_>) {
        b.put_struct(attribute_status_tags::PATH, |p| self.path.write(p));
        b.put_struct(attribute_status_tags::ERROR_STATUS, |s| self.status.write(s));
    }
}

impl WriteResponse {
    /// Encode as a root message with the current protocol revision.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut msg = MessageBuilder::new(&WRITE_RESPONSE);
        msg.body()
            .put_array(write_response_tags::WRITE_RESPONSES, |list| {
                for entry in &self.write_responses {
                    list.put_entry(|e| entry.write(e));
                }
            });
        msg.build()
    }

    /// Validate and decode a root message.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let parser = StructParser::root(buf, &WRITE_RESPONSE)?;
        parser.check_schema_validity()?;

        let mut write_responses = Vec::new();
        let mut list = parser.get_array(write_response_tags::WRITE_RESPONSES)?;
        while let Some(entry) = list.next_entry()? {
            write_responses.push(AttributeStatus::read(&entry)?);
        }
        Ok(Self { write_responses })
    }
}

impl StatusResponse {
    /// Encode as a root message with the current protocol revision.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut msg = MessageBuilder::new(&STATUS_RESPONSE);
        msg.body()
            .put_uint(status_response_tags::STATUS, u64::from(self.status));
        msg.build()
    }

    /// Validate and decode a root message.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let parser = StructParser::root(buf, &STATUS_RESPONSE)?;
        parser.check_schema_validity()?;
        Ok(Self {
            status: parser.get_u32(status_response_tags::STATUS)?,
        })
    }
}

/// Map an absent optional field to `None`, keep real errors.
fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    use crate::error::WeaveError;
    match result {
        Ok(v) => Ok(Some(v)),
        Err(WeaveError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}
