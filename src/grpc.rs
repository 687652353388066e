//! gRPC surface: the `sql.SQLServices` service.
//!
//! Messages and service plumbing are written against tonic's codegen API
//! directly, so no build script or protoc is needed. The wire contract is
//!
//! ```proto
//! package sql;
//! message Input  { string query = 1; }
//! message Output { string status = 1; string result = 2; string error = 3; }
//! service SQLServices {
//!   rpc RawQuery(Input) returns (Output);
//!   rpc InsertQuery(Input) returns (Output);
//!   rpc UpdateQuery(Input) returns (Output);
//!   rpc DeleteQuery(Input) returns (Output);
//!   rpc SelectQuery(Input) returns (Output);
//! }
//! ```
//!
//! The credential travels in the `auth` metadata entry.

use crate::envelope::Envelope;
use crate::error::{GatewayError, Result};
use crate::server::metadata_from_headers;
use crate::service::{Operation, QueryRequest, SqlService};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tracing::info;

/// Fully qualified service name.
pub const SERVICE_NAME: &str = "sql.SQLServices";

/// Request message shared by every operation.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Input {
    #[prost(string, tag = "1")]
    pub query: String,
}

/// Response message: the envelope on the wire.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Output {
    #[prost(string, tag = "1")]
    pub status: String,

    #[prost(string, tag = "2")]
    pub result: String,

    #[prost(string, tag = "3")]
    pub error: String,
}

impl From<Envelope> for Output {
    fn from(envelope: Envelope) -> Self {
        Self {
            status: envelope.status,
            result: envelope.result,
            error: envelope.error,
        }
    }
}

/// Converts gRPC metadata into call metadata.
///
/// Returns `None` when the first `auth` value is not readable text.
pub fn call_metadata(metadata: &MetadataMap) -> Option<crate::gate::CallMetadata> {
    metadata_from_headers(&metadata.clone().into_headers())
}

/// Runs one operation for a decoded gRPC request.
pub async fn handle(
    service: &SqlService,
    op: Operation,
    request: tonic::Request<Input>,
) -> Output {
    let metadata = call_metadata(request.metadata());
    let input = request.into_inner();
    service
        .call(op, metadata.as_ref(), &QueryRequest::new(input.query))
        .await
        .into()
}

/// Serves `SQLServices` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    service: SqlService,
    shutdown: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("gRPC listening on {}", addr);
    }

    tonic::transport::Server::builder()
        .add_service(sql_services_server::SqlServicesServer::new(service))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            shutdown.cancelled().await
        })
        .await
        .map_err(|e| GatewayError::server(format!("gRPC server failed: {e}")))
}

/// gRPC server module
pub mod sql_services_server {
    use super::*;
    use tonic::codegen::*;

    /// `SQLServices` server dispatching to a [`SqlService`].
    #[derive(Debug, Clone)]
    pub struct SqlServicesServer {
        service: SqlService,
    }

    impl SqlServicesServer {
        pub fn new(service: SqlService) -> Self {
            Self { service }
        }
    }

    impl tonic::server::NamedService for SqlServicesServer {
        const NAME: &'static str = SERVICE_NAME;
    }

    impl<B> Service<http::Request<B>> for SqlServicesServer
    where
        B: Body + std::marker::Send + 'static,
        B::Error: Into<StdError> + std::marker::Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(
            &mut self,
            _cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let op = match req.uri().path().rsplit_once('/') {
                Some((prefix, method)) if prefix.strip_prefix('/') == Some(SERVICE_NAME) => {
                    Operation::from_name(method)
                }
                _ => None,
            };

            match op {
                Some(op) => {
                    let method = OperationSvc {
                        service: self.service.clone(),
                        op,
                    };
                    Box::pin(async move {
                        let mut grpc =
                            tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                        Ok(grpc.unary(method, req).await)
                    })
                }
                None => Box::pin(async move {
                    let mut response = http::Response::new(tonic::body::empty_body());
                    let headers = response.headers_mut();
                    headers.insert(
                        "grpc-status",
                        http::HeaderValue::from(tonic::Code::Unimplemented as i32),
                    );
                    headers.insert(
                        http::header::CONTENT_TYPE,
                        http::HeaderValue::from_static("application/grpc"),
                    );
                    Ok(response)
                }),
            }
        }
    }

    struct OperationSvc {
        service: SqlService,
        op: Operation,
    }

    impl tonic::server::UnaryService<Input> for OperationSvc {
        type Response = Output;
        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

        fn call(&mut self, request: tonic::Request<Input>) -> Self::Future {
            let service = self.service.clone();
            let op = self.op;
            Box::pin(async move { Ok(tonic::Response::new(handle(&service, op, request).await)) })
        }
    }
}

/// gRPC client module
pub mod sql_services_client {
    use super::*;
    use tonic::codegen::*;

    /// `SQLServices` client.
    #[derive(Debug, Clone)]
    pub struct SqlServicesClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl SqlServicesClient<tonic::transport::Channel> {
        /// Create a new client from a channel
        pub fn new(channel: tonic::transport::Channel) -> Self {
            let inner = tonic::client::Grpc::new(channel);
            Self { inner }
        }
    }

    impl<T> SqlServicesClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError> + std::fmt::Debug,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        /// Invokes one operation.
        pub async fn call(
            &mut self,
            op: Operation,
            request: impl tonic::IntoRequest<Input>,
        ) -> std::result::Result<tonic::Response<Output>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(tonic::Code::Unknown, format!("Service not ready: {:?}", e))
            })?;

            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::try_from(format!("/{SERVICE_NAME}/{}", op.name()))
                .map_err(|e| tonic::Status::internal(e.to_string()))?;
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new(SERVICE_NAME, op.name()));
            self.inner.unary(req, path, codec).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::sql_services_server::SqlServicesServer;
    use super::*;
    use crate::config::SharedSecret;
    use crate::db::{ColumnInfo, MockDatabase, MockResponse, QueryResult, Value};
    use crate::gate::AUTH_KEY;
    use crate::materialize::TypeNameClassifier;
    use axum::http::{HeaderMap, HeaderValue};
    use std::sync::Arc;
    use tonic::metadata::MetadataValue;
    use tower::ServiceExt;

    const SECRET: &str = "s3cret";

    fn service(db: &MockDatabase) -> SqlService {
        SqlService::new(
            Arc::new(db.clone()),
            Arc::new(TypeNameClassifier::default()),
            SharedSecret::new(SECRET),
        )
    }

    fn request(query: &str, auth: Option<&'static str>) -> tonic::Request<Input> {
        let mut request = tonic::Request::new(Input {
            query: query.to_string(),
        });
        if let Some(auth) = auth {
            request
                .metadata_mut()
                .insert(AUTH_KEY, MetadataValue::from_static(auth));
        }
        request
    }

    #[tokio::test]
    async fn test_select_over_grpc_handler() {
        let sql = "SELECT name, age FROM people";
        let rows = QueryResult::with_data(
            vec![ColumnInfo::new("name", "VARCHAR"), ColumnInfo::new("age", "INT")],
            vec![vec![Value::from("Ada"), Value::from(36)]],
        );
        let db = MockDatabase::new().respond(sql, MockResponse::Rows(rows));

        let output = handle(&service(&db), Operation::Select, request(sql, Some(SECRET))).await;

        assert_eq!(
            output,
            Output {
                status: "OK".to_string(),
                result: r#"[{"name":"Ada","age":36}]"#.to_string(),
                error: "NULL".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_admission_over_grpc_handler() {
        let db = MockDatabase::new();
        let svc = service(&db);

        let missing = handle(&svc, Operation::Insert, request("INSERT 1", None)).await;
        let wrong = handle(&svc, Operation::Insert, request("INSERT 1", Some("guess"))).await;
        let empty = handle(&svc, Operation::Insert, request("", Some(SECRET))).await;

        assert_eq!((missing.status.as_str(), missing.result.as_str()), ("ABORTED", "INVALID_FORM"));
        assert_eq!((wrong.status.as_str(), wrong.result.as_str()), ("UNAUTHORIZED", "OK"));
        assert_eq!((empty.status.as_str(), empty.result.as_str()), ("ABORTED", "INVALID_FORM"));
        assert_eq!(db.acquired(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_auth_metadata_is_internal() {
        let db = MockDatabase::new();
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_KEY, HeaderValue::from_bytes(&[0x73, 0xff]).unwrap());

        let mut req = request("SELECT 1", None);
        *req.metadata_mut() = MetadataMap::from_headers(headers);

        let output = handle(&service(&db), Operation::Select, req).await;
        assert_eq!(output.status, "ABORTED");
        assert_eq!(output.result, "INTERNAL_ERROR");
        assert_eq!(output.error, "NULL");
    }

    #[tokio::test]
    async fn test_unknown_method_is_unimplemented() {
        let server = SqlServicesServer::new(service(&MockDatabase::new()));
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/sql.SQLServices/DropQuery")
            .header("content-type", "application/grpc")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = server.oneshot(request).await.unwrap();

        assert_eq!(response.headers()["grpc-status"], "12");
    }

    #[test]
    fn test_output_from_envelope() {
        let output = Output::from(Envelope::not_found());
        assert_eq!(output.status, "NOT_FOUND");
        assert_eq!(output.result, "OK");
        assert_eq!(output.error, "NULL");
    }
}
