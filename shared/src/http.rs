use http::{Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty};
use hyper::body::{Bytes, Incoming};
use hyper::service::{Service, service_fn};
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// Address of the client on the other end of a connection.
///
/// Inserted into the extensions of every request served by [`serve_http_service`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

pub async fn bind(host: &str, port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind(format!("{host}:{port}")).await
}

pub async fn run_http_service<S, E>(
    host: &str,
    port: u16,
    tls: Option<TlsAcceptor>,
    service: S,
) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
{
    let listener = bind(host, port).await?;
    serve_http_service(listener, tls, service).await
}

/// Accepts connections on an already bound listener, one task per connection.
///
/// When `tls` is set every connection goes through the handshake first; a failed
/// handshake only drops that connection.
pub async fn serve_http_service<S, E>(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    service: S,
) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
{
    let service_arc = Arc::new(service);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        let svc = service_arc.clone();
        let tls = tls.clone();

        tokio::spawn(async move {
            match tls {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(stream) => serve_connection(stream, peer_addr, svc).await,
                    Err(e) => {
                        tracing::warn!(peer_addr = %peer_addr, error = %e, "TLS handshake failed")
                    }
                },
                None => serve_connection(stream, peer_addr, svc).await,
            }
        });
    }
}

async fn serve_connection<I, S, E>(stream: I, peer_addr: SocketAddr, service: Arc<S>)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let io = TokioIo::new(stream);
    let svc = service_fn(move |mut req: Request<Incoming>| {
        req.extensions_mut().insert(PeerAddr(peer_addr));
        service.call(req)
    });

    // Hand the connection to hyper; auto-detect h1/h2 on this socket
    if let Err(e) = Builder::new(TokioExecutor::new())
        .serve_connection(io, svc)
        .await
    {
        tracing::debug!(peer_addr = %peer_addr, error = %e, "connection closed with error");
    }
}

/// Builds a response with the given status and no body.
pub fn make_empty_response<E: 'static>(status_code: StatusCode) -> Response<BoxBody<Bytes, E>> {
    let mut response = Response::new(Empty::<Bytes>::new().map_err(|e| match e {}).boxed());
    *response.status_mut() = status_code;
    response
}

/// Builds a response with the given status and its canonical reason as the body.
pub fn make_boxed_error_response<E: 'static>(
    status_code: StatusCode,
) -> Response<BoxBody<Bytes, E>> {
    let message = status_code
        .canonical_reason()
        .unwrap_or("an error occurred");

    let mut response = Response::new(
        http_body_util::Full::new(Bytes::from(format!("{message}\n")))
            .map_err(|e| match e {})
            .boxed(),
    );
    *response.status_mut() = status_code;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper_util::client::legacy::Client;
    use hyper_util::client::legacy::connect::HttpConnector;
    use std::convert::Infallible;
    use std::future::Future;
    use std::pin::Pin;

    #[derive(thiserror::Error, Debug)]
    enum TestError {
        #[error("io error: {0}")]
        Io(#[from] std::io::Error),
    }

    // Echoes the peer address seen by the service back in the body.
    struct PeerEcho;

    impl Service<Request<Incoming>> for PeerEcho {
        type Response = Response<BoxBody<Bytes, TestError>>;
        type Error = TestError;
        type Future =
            Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

        fn call(&self, req: Request<Incoming>) -> Self::Future {
            let peer = req
                .extensions()
                .get::<PeerAddr>()
                .map(|p| p.0.ip().to_string())
                .unwrap_or_default();
            Box::pin(async move {
                Ok(Response::new(
                    Full::new(Bytes::from(peer)).map_err(|e| match e {}).boxed(),
                ))
            })
        }
    }

    #[tokio::test]
    async fn test_peer_addr_is_attached() {
        let listener = bind("127.0.0.1", 0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_http_service(listener, None, PeerEcho));

        let client: Client<HttpConnector, Empty<Bytes>> =
            Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let response = client
            .get(format!("http://127.0.0.1:{port}/").parse().unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"127.0.0.1");
    }

    #[tokio::test]
    async fn test_tls_connections() {
        use crate::tls::load_acceptor;
        use rustls::pki_types::ServerName;
        use rustls::{ClientConfig, RootCertStore};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpStream;
        use tokio_rustls::TlsConnector;

        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, certified.cert.pem()).unwrap();
        std::fs::write(&key_path, certified.key_pair.serialize_pem()).unwrap();
        let acceptor = load_acceptor(&cert_path, &key_path).unwrap();

        let listener = bind("127.0.0.1", 0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_http_service(listener, Some(acceptor), PeerEcho));

        // A plain HTTP client fails the handshake and gets no HTTP response
        let mut plain = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        plain
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut received = Vec::new();
        let _ = plain.read_to_end(&mut received).await;
        assert!(!received.starts_with(b"HTTP/"));

        // The listener keeps serving TLS clients afterwards
        let mut roots = RootCertStore::empty();
        roots.add(certified.cert.der().clone()).unwrap();
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let client_config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(client_config));

        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let server_name = ServerName::try_from("localhost").unwrap();
        let stream = connector.connect(server_name, stream).await.unwrap();

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .unwrap();
        tokio::spawn(connection);

        let request = Request::builder()
            .uri("/")
            .header(http::header::HOST, "localhost")
            .body(Empty::<Bytes>::new())
            .unwrap();
        let response = sender.send_request(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"127.0.0.1");
    }

    #[tokio::test]
    async fn test_empty_and_error_responses() {
        let response = make_empty_response::<Infallible>(StatusCode::NO_CONTENT);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());

        let response = make_boxed_error_response::<Infallible>(StatusCode::NOT_FOUND);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"Not Found\n");
    }
}
