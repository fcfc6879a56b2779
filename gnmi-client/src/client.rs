//! gNMI client

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tonic::{Request, Status};
use tracing::debug;

use crate::error::{Error, Result};
use crate::gnmi::{
    self, CapabilityRequest, CapabilityResponse, Encoding, GetRequest, GetResponse, Path,
    PathElem, SetRequest, SetResponse, SubscribeRequest, SubscriptionList, SubscriptionMode,
    TypedValue, Update, g_nmi_client::GNmiClient,
};
use crate::path::{parse_xpath, split_path};
use crate::subscription::SubscriptionStream;

/// A gNMI client for a single target.
///
/// The underlying channel is created lazily, so construction succeeds
/// without the target being reachable and connectivity problems surface on
/// the first RPC. Every request carries the configured username and
/// password as gRPC metadata.
#[derive(Clone)]
pub struct GnmiClient {
    inner: GNmiClient<Channel>,
    username: String,
    password: String,
}

impl GnmiClient {
    /// Creates a client for `target` (a `host:port` pair) over plaintext
    /// HTTP/2.
    pub fn new(target: &str, username: &str, password: &str) -> Result<Self> {
        Self::builder(target)
            .credentials(username, password)
            .build()
    }

    /// Starts building a client, for when TLS settings are needed.
    pub fn builder(target: &str) -> ClientBuilder {
        ClientBuilder {
            target: target.to_string(),
            username: String::new(),
            password: String::new(),
            tls: None,
        }
    }

    /// Retrieves the target's capabilities: supported models, encodings and
    /// the gNMI service version.
    pub async fn capabilities(&mut self) -> Result<CapabilityResponse> {
        let request = self.authenticated(CapabilityRequest::default())?;
        debug!("Sending Capabilities request");
        let response = self.inner.capabilities(request).await?;
        Ok(response.into_inner())
    }

    /// Reads the data tree at `path` and returns the raw response.
    pub async fn get(&mut self, path: &str) -> Result<GetResponse> {
        let request = self.authenticated(build_get_request(path))?;
        debug!("Sending Get request for {}", path);
        let response = self.inner.get(request).await?;
        Ok(response.into_inner())
    }

    /// Writes `value` as a string update at `path` and returns the target's
    /// transaction result. The value is sent verbatim, so numbers and
    /// booleans stay strings unless the target coerces them.
    pub async fn set(&mut self, path: &str, value: &str) -> Result<SetResponse> {
        let request = self.authenticated(build_set_request(path, value))?;
        debug!("Sending Set request for {}", path);
        let response = self.inner.set(request).await?;
        Ok(response.into_inner())
    }

    /// Opens a streaming subscription for a single `path` using the
    /// target-defined mode, STREAM list type and JSON encoding.
    ///
    /// Path segments are kept opaque, so bracketed key expressions stay
    /// inside the element name. Use [`GnmiClient::subscribe_with`] to have
    /// keys parsed or to control the subscription parameters.
    pub fn subscribe(&self, path: &str) -> SubscriptionStream {
        // Some targets require the prefix field to be present even when empty.
        let request = build_subscribe_request(
            vec![request_path(path)],
            &SubscribeOptions::default(),
            Some(Path::default()),
        );
        self.spawn_subscription(request)
    }

    /// Opens a streaming subscription for several XPath-like paths.
    /// Bracketed key expressions such as `interface[name=eth0]` are parsed
    /// into path element keys.
    pub fn subscribe_with(&self, paths: &[&str], options: &SubscribeOptions) -> SubscriptionStream {
        let parsed = paths.iter().map(|p| parse_xpath(p)).collect();
        let request = build_subscribe_request(parsed, options, None);
        self.spawn_subscription(request)
    }

    fn spawn_subscription(&self, subscribe_request: SubscribeRequest) -> SubscriptionStream {
        let authenticated = self.authenticated(tokio_stream::once(subscribe_request));
        let mut client = self.inner.clone();

        SubscriptionStream::spawn(async move {
            let request = authenticated.map_err(|e| Status::invalid_argument(e.to_string()))?;
            let response = client.subscribe(request).await?;
            debug!("Subscription established");
            Ok(response.into_inner())
        })
    }

    /// Wraps `message` in a request carrying the credential metadata.
    fn authenticated<T>(&self, message: T) -> Result<Request<T>> {
        let mut request = Request::new(message);
        request
            .metadata_mut()
            .insert("username", self.username.parse()?);
        request
            .metadata_mut()
            .insert("password", self.password.parse()?);
        Ok(request)
    }
}

/// Builder for [`GnmiClient`] with optional TLS settings.
pub struct ClientBuilder {
    target: String,
    username: String,
    password: String,
    tls: Option<TlsOptions>,
}

impl ClientBuilder {
    /// Sets the username and password attached to every request.
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    /// Enables TLS for the connection.
    pub fn tls(mut self, options: TlsOptions) -> Self {
        self.tls = Some(options);
        self
    }

    /// Builds the client. Certificate files are read here, but no
    /// connection is attempted until the first RPC.
    pub fn build(self) -> Result<GnmiClient> {
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        let uri = format!("{}://{}", scheme, self.target);
        debug!("Creating channel for {}", uri);

        let mut endpoint = Endpoint::from_shared(uri)?;

        if let Some(ref tls) = self.tls {
            let mut tls_config = ClientTlsConfig::new().with_native_roots();

            if let Some(ref domain) = tls.domain_name {
                tls_config = tls_config.domain_name(domain);
            }

            if let Some(ref ca_cert_path) = tls.ca_cert {
                let ca_cert = std::fs::read(ca_cert_path)?;
                tls_config = tls_config.ca_certificate(Certificate::from_pem(ca_cert));
            }

            match (&tls.client_cert, &tls.client_key) {
                (Some(cert_path), Some(key_path)) => {
                    let cert = std::fs::read(cert_path)?;
                    let key = std::fs::read(key_path)?;
                    tls_config = tls_config.identity(Identity::from_pem(cert, key));
                }
                (None, None) => {}
                _ => {
                    return Err(Error::Config(
                        "client_cert and client_key must be set together".to_string(),
                    ));
                }
            }

            endpoint = endpoint.tls_config(tls_config)?;
        }

        let channel = endpoint.connect_lazy();

        Ok(GnmiClient {
            inner: GNmiClient::new(channel),
            username: self.username,
            password: self.password,
        })
    }
}

/// TLS settings for [`ClientBuilder::tls`]. All fields are optional; with
/// none set the system trust roots are used.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Expected server name, when it differs from the target address.
    pub domain_name: Option<String>,
    /// PEM file with an additional CA certificate to trust.
    pub ca_cert: Option<PathBuf>,
    /// PEM file with the client certificate, for mutual TLS.
    pub client_cert: Option<PathBuf>,
    /// PEM file with the client private key, for mutual TLS.
    pub client_key: Option<PathBuf>,
}

/// Parameters for [`GnmiClient::subscribe_with`].
#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    /// Per-path subscription mode.
    pub mode: SubscriptionMode,
    /// Sampling period, used in SAMPLE mode.
    pub sample_interval: Option<Duration>,
    /// Whether unchanged values may be withheld in SAMPLE mode.
    pub suppress_redundant: bool,
    /// Longest silent period the target may observe while suppressing
    /// redundant updates.
    pub heartbeat_interval: Option<Duration>,
    /// Value encoding requested from the target.
    pub encoding: Encoding,
    /// Skip the initial state dump and stream only subsequent updates.
    pub updates_only: bool,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            mode: SubscriptionMode::TargetDefined,
            sample_interval: None,
            suppress_redundant: false,
            heartbeat_interval: None,
            encoding: Encoding::Json,
            updates_only: false,
        }
    }
}

/// Builds the request path, keeping each slash-separated segment opaque.
fn request_path(path: &str) -> Path {
    Path {
        elem: split_path(path)
            .into_iter()
            .map(|name| PathElem {
                name,
                key: HashMap::new(),
            })
            .collect(),
        ..Default::default()
    }
}

fn build_get_request(path: &str) -> GetRequest {
    GetRequest {
        path: vec![request_path(path)],
        ..Default::default()
    }
}

fn build_set_request(path: &str, value: &str) -> SetRequest {
    let update = Update {
        path: Some(request_path(path)),
        val: Some(TypedValue {
            value: Some(gnmi::typed_value::Value::StringVal(value.to_string())),
        }),
        ..Default::default()
    };

    SetRequest {
        update: vec![update],
        ..Default::default()
    }
}

fn build_subscribe_request(
    paths: Vec<Path>,
    options: &SubscribeOptions,
    prefix: Option<Path>,
) -> SubscribeRequest {
    let subscription = paths
        .into_iter()
        .map(|path| gnmi::Subscription {
            path: Some(path),
            mode: options.mode as i32,
            sample_interval: options.sample_interval.map_or(0, |d| d.as_nanos() as u64),
            suppress_redundant: options.suppress_redundant,
            heartbeat_interval: options.heartbeat_interval.map_or(0, |d| d.as_nanos() as u64),
        })
        .collect();

    let subscription_list = SubscriptionList {
        prefix,
        subscription,
        mode: gnmi::subscription_list::Mode::Stream as i32,
        encoding: options.encoding as i32,
        updates_only: options.updates_only,
        ..Default::default()
    };

    SubscribeRequest {
        request: Some(gnmi::subscribe_request::Request::Subscribe(
            subscription_list,
        )),
        extension: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::SubscriptionEvent;

    #[test]
    fn test_request_path_keeps_brackets_opaque() {
        let path = request_path("/interfaces/interface[name=eth0]");
        assert_eq!(path.elem.len(), 2);
        assert_eq!(path.elem[0].name, "interfaces");
        assert_eq!(path.elem[1].name, "interface[name=eth0]");
        assert!(path.elem[1].key.is_empty());
    }

    #[tokio::test]
    async fn test_request_metadata_is_exactly_the_credentials() {
        let client = GnmiClient::new("localhost:9339", "admin", "secret").unwrap();
        let request = client.authenticated(()).unwrap();

        let metadata = request.metadata();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata.get("username").unwrap(), "admin");
        assert_eq!(metadata.get("password").unwrap(), "secret");
    }

    #[tokio::test]
    async fn test_metadata_rejects_non_ascii_credentials() {
        let client = GnmiClient::new("localhost:9339", "admin", "pass\nword").unwrap();
        let result = client.authenticated(());
        assert!(matches!(result, Err(Error::Metadata(_))));
    }

    #[test]
    fn test_build_get_request() {
        let request = build_get_request("/system/state/hostname");
        assert_eq!(request.path.len(), 1);
        assert_eq!(request.path[0].elem.len(), 3);
        assert_eq!(request.r#type(), gnmi::get_request::DataType::All);
        assert_eq!(request.encoding(), Encoding::Json);
    }

    #[test]
    fn test_build_set_request_sends_value_verbatim() {
        let request =
            build_set_request("/interfaces/interface[name=eth0]/config/description", "uplink");

        assert!(request.delete.is_empty());
        assert!(request.replace.is_empty());
        assert_eq!(request.update.len(), 1);

        let update = &request.update[0];
        let elems: Vec<&str> = update
            .path
            .as_ref()
            .unwrap()
            .elem
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(
            elems,
            ["interfaces", "interface[name=eth0]", "config", "description"]
        );
        match update.val.as_ref().unwrap().value.as_ref().unwrap() {
            gnmi::typed_value::Value::StringVal(s) => assert_eq!(s, "uplink"),
            other => panic!("expected string value, got {:?}", other),
        }

        // Numeric strings stay strings.
        let request = build_set_request("/system/config/hostname", "4711");
        match request.update[0].val.as_ref().unwrap().value.as_ref().unwrap() {
            gnmi::typed_value::Value::StringVal(s) => assert_eq!(s, "4711"),
            other => panic!("expected string value, got {:?}", other),
        }
    }

    #[test]
    fn test_build_subscribe_request_defaults() {
        let request = build_subscribe_request(
            vec![request_path("/interfaces/interface[name=eth0]")],
            &SubscribeOptions::default(),
            Some(Path::default()),
        );

        let list = match request.request.unwrap() {
            gnmi::subscribe_request::Request::Subscribe(list) => list,
            other => panic!("expected subscription list, got {:?}", other),
        };

        assert_eq!(list.prefix, Some(Path::default()));
        assert_eq!(list.mode(), gnmi::subscription_list::Mode::Stream);
        assert_eq!(list.encoding(), Encoding::Json);
        assert_eq!(list.subscription.len(), 1);

        let subscription = &list.subscription[0];
        assert_eq!(subscription.mode(), SubscriptionMode::TargetDefined);
        assert_eq!(subscription.sample_interval, 0);

        let path = subscription.path.as_ref().unwrap();
        assert_eq!(path.elem[1].name, "interface[name=eth0]");
    }

    #[test]
    fn test_build_subscribe_request_with_options() {
        let options = SubscribeOptions {
            mode: SubscriptionMode::Sample,
            sample_interval: Some(Duration::from_secs(10)),
            suppress_redundant: true,
            heartbeat_interval: Some(Duration::from_secs(60)),
            encoding: Encoding::JsonIetf,
            updates_only: true,
        };
        let paths = vec![
            parse_xpath("/interfaces/interface[name=eth0]/state/counters"),
            parse_xpath("/system/memory/state"),
        ];
        let request = build_subscribe_request(paths, &options, None);

        let list = match request.request.unwrap() {
            gnmi::subscribe_request::Request::Subscribe(list) => list,
            other => panic!("expected subscription list, got {:?}", other),
        };

        assert_eq!(list.prefix, None);
        assert_eq!(list.encoding(), Encoding::JsonIetf);
        assert!(list.updates_only);
        assert_eq!(list.subscription.len(), 2);

        let first = &list.subscription[0];
        assert_eq!(first.mode(), SubscriptionMode::Sample);
        assert_eq!(first.sample_interval, 10_000_000_000);
        assert_eq!(first.heartbeat_interval, 60_000_000_000);
        assert!(first.suppress_redundant);

        // Keys are parsed for subscribe_with paths.
        let keyed = &first.path.as_ref().unwrap().elem[1];
        assert_eq!(keyed.name, "interface");
        assert_eq!(keyed.key.get("name"), Some(&"eth0".to_string()));
    }

    #[tokio::test]
    async fn test_new_does_not_dial_the_target() {
        // Nothing listens on port 1; lazy construction must still succeed.
        let client = GnmiClient::new("127.0.0.1:1", "admin", "admin");
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_target_fails_on_call() {
        let mut client = GnmiClient::new("127.0.0.1:1", "admin", "admin").unwrap();
        let err = client.capabilities().await.unwrap_err();
        assert!(matches!(err, Error::Rpc(_)));
    }

    #[tokio::test]
    async fn test_subscribe_to_unreachable_target_errors_as_event() {
        let client = GnmiClient::new("127.0.0.1:1", "admin", "admin").unwrap();
        let mut stream = client.subscribe("/interfaces");

        match stream.next_event().await {
            Some(SubscriptionEvent::Errored(_)) => {}
            other => panic!("expected error event, got {:?}", other),
        }
        assert!(stream.next_event().await.is_none());
    }

    #[test]
    fn test_builder_reports_missing_ca_cert() {
        let result = GnmiClient::builder("localhost:9339")
            .credentials("admin", "admin")
            .tls(TlsOptions {
                ca_cert: Some(PathBuf::from("/nonexistent/ca.pem")),
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_builder_rejects_half_configured_client_identity() {
        let result = GnmiClient::builder("localhost:9339")
            .credentials("admin", "admin")
            .tls(TlsOptions {
                client_cert: Some(PathBuf::from("/nonexistent/client.pem")),
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
