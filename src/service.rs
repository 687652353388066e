//! The SQL service: five operations behind one admission gate.

use crate::config::{GatewayConfig, SharedSecret};
use crate::db::{ConnectionProvisioner, SqlxProvisioner};
use crate::envelope::Envelope;
use crate::executor;
use crate::gate::{admit, CallContext, CallMetadata};
use crate::materialize::{self, ColumnClassifier, TypeNameClassifier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Request payload shared by every operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

/// The RPC operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Raw,
    Insert,
    Update,
    Delete,
    Select,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Self::Raw,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::Select,
    ];

    /// RPC method name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Raw => "RawQuery",
            Self::Insert => "InsertQuery",
            Self::Update => "UpdateQuery",
            Self::Delete => "DeleteQuery",
            Self::Select => "SelectQuery",
        }
    }

    /// Looks up an operation by RPC method name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// True for the operation whose rows are materialized.
    pub fn returns_rows(&self) -> bool {
        matches!(self, Self::Select)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs admitted calls against the database.
///
/// Holds no per-call state; clones share the provisioner and classifier.
#[derive(Clone)]
pub struct SqlService {
    provisioner: Arc<dyn ConnectionProvisioner>,
    classifier: Arc<dyn ColumnClassifier>,
    secret: SharedSecret,
}

impl SqlService {
    pub fn new(
        provisioner: Arc<dyn ConnectionProvisioner>,
        classifier: Arc<dyn ColumnClassifier>,
        secret: SharedSecret,
    ) -> Self {
        Self {
            provisioner,
            classifier,
            secret,
        }
    }

    /// Builds the production service: sqlx connections and type-name classification.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            Arc::new(SqlxProvisioner::new(config.database.clone())),
            Arc::new(TypeNameClassifier::new(&config.database.textual_types)),
            config.secret.clone(),
        )
    }

    /// Admits the call, then dispatches it.
    pub async fn call(
        &self,
        op: Operation,
        metadata: Option<&CallMetadata>,
        request: &QueryRequest,
    ) -> Envelope {
        let ctx = CallContext::new(metadata, &request.query);
        let admission = admit(&ctx, &self.secret);
        if let Some(rejection) = admission.rejection() {
            debug!("{} rejected: {} / {}", op, rejection.status, rejection.result);
            return rejection;
        }

        debug!("{} admitted ({} bytes of SQL)", op, request.query.len());

        if op.returns_rows() {
            materialize::materialize(
                self.provisioner.as_ref(),
                self.classifier.as_ref(),
                &request.query,
            )
            .await
        } else {
            executor::execute(self.provisioner.as_ref(), &request.query).await
        }
    }

    pub async fn raw_query(
        &self,
        metadata: Option<&CallMetadata>,
        request: &QueryRequest,
    ) -> Envelope {
        self.call(Operation::Raw, metadata, request).await
    }

    pub async fn insert_query(
        &self,
        metadata: Option<&CallMetadata>,
        request: &QueryRequest,
    ) -> Envelope {
        self.call(Operation::Insert, metadata, request).await
    }

    pub async fn update_query(
        &self,
        metadata: Option<&CallMetadata>,
        request: &QueryRequest,
    ) -> Envelope {
        self.call(Operation::Update, metadata, request).await
    }

    pub async fn delete_query(
        &self,
        metadata: Option<&CallMetadata>,
        request: &QueryRequest,
    ) -> Envelope {
        self.call(Operation::Delete, metadata, request).await
    }

    pub async fn select_query(
        &self,
        metadata: Option<&CallMetadata>,
        request: &QueryRequest,
    ) -> Envelope {
        self.call(Operation::Select, metadata, request).await
    }
}

impl fmt::Debug for SqlService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlService")
            .field("secret", &self.secret)
            .finish_non_exhaustive()
    }
}
