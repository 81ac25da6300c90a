use std::path::{Path, PathBuf};

use fs_err as fs;
use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    matchers::{body_partial_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use super::*;

const API_KEY: &str = "test-access-key";

fn cert_pem(domain: &str) -> String {
    format!("-----BEGIN CERTIFICATE-----\nleaf for {domain}\n-----END CERTIFICATE-----\n")
}

fn bundle_pem(domain: &str) -> String {
    format!("-----BEGIN CERTIFICATE-----\nintermediate for {domain}\n-----END CERTIFICATE-----\n")
}

/// Mount the order, details and download endpoints of one domain.
async fn mount_domain(server: &MockServer, domain: &str, order_id: &str) {
    Mock::given(method("POST"))
        .and(path("/certificates"))
        .and(query_param("access_key", API_KEY))
        .and(body_partial_json(json!({ "common_name": domain })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order_id": order_id })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/orders/{order_id}")))
        .and(query_param("access_key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "certificates": [{ "url": format!("{}/files/{order_id}/cert", server.uri()) }],
            "ca_bundle_url": format!("{}/files/{order_id}/bundle", server.uri()),
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/files/{order_id}/cert")))
        .respond_with(ResponseTemplate::new(200).set_body_string(cert_pem(domain)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/files/{order_id}/bundle")))
        .respond_with(ResponseTemplate::new(200).set_body_string(bundle_pem(domain)))
        .mount(server)
        .await;
}

struct Harness {
    server: MockServer,
    workdir: TempDir,
}

impl Harness {
    async fn start() -> Self {
        tracing_subscriber::fmt::try_init().ok();
        Self {
            server: MockServer::start().await,
            workdir: tempfile::tempdir().unwrap(),
        }
    }

    fn cert_dir(&self, domain: &str) -> PathBuf {
        self.workdir.path().join("certs").join(domain.replace('.', "_"))
    }

    fn reload_log(&self) -> PathBuf {
        self.workdir.path().join("reload.log")
    }

    /// Number of times the reload hook ran.
    fn reload_count(&self) -> usize {
        match fs::read_to_string(self.reload_log()) {
            Ok(log) => log.lines().count(),
            Err(_) => 0,
        }
    }

    fn renewer(&self, domains: &[&str]) -> CertRenewer {
        self.renewer_every(domains, Duration::from_secs(60 * 24 * 3600))
    }

    fn renewer_every(&self, domains: &[&str], interval: Duration) -> CertRenewer {
        let domains = domains
            .iter()
            .map(|domain| DomainConfig::new(*domain, self.cert_dir(domain)))
            .collect();
        RenewerConfig::builder()
            .api_url(self.server.uri())
            .api_key(API_KEY)
            .email("admin@example.com")
            .domains(domains)
            .reloader(Reloader::hook(format!(
                "echo reload >> '{}'",
                self.reload_log().display()
            )))
            .renew_interval(interval)
            .build()
            .build_renewer()
            .unwrap()
    }
}

fn read(dir: &Path, name: &str) -> Vec<u8> {
    fs::read(dir.join(name)).unwrap()
}

#[tokio::test]
async fn renews_every_domain_then_reloads_once() {
    let harness = Harness::start().await;
    mount_domain(&harness.server, "example.com", "ord-a").await;
    mount_domain(&harness.server, "example.org", "ord-b").await;

    harness
        .renewer(&["example.com", "example.org"])
        .renew_all()
        .await
        .unwrap();

    for domain in ["example.com", "example.org"] {
        let dir = harness.cert_dir(domain);
        let cert = read(&dir, "certificate.crt");
        let bundle = read(&dir, "ca_bundle.crt");
        let fullchain = read(&dir, "fullchain.pem");
        assert_eq!(cert, cert_pem(domain).into_bytes());
        assert_eq!(bundle, bundle_pem(domain).into_bytes());
        assert_eq!(fullchain.len(), cert.len() + bundle.len());
        assert_eq!(fullchain[..cert.len()], cert[..]);
        assert_eq!(fullchain[cert.len()..], bundle[..]);
    }
    assert_eq!(harness.reload_count(), 1);
}

#[tokio::test]
async fn failed_order_aborts_before_any_file_is_written() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/certificates"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    let err = harness
        .renewer(&["example.com"])
        .renew_all()
        .await
        .unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("example.com"), "{message}");
    assert!(message.contains("status code 500"), "{message}");
    assert!(message.contains("internal error"), "{message}");
    assert!(!harness.cert_dir("example.com").exists());
    assert_eq!(harness.reload_count(), 0);
}

#[tokio::test]
async fn failed_download_stops_the_run_without_reload() {
    let harness = Harness::start().await;
    mount_domain(&harness.server, "example.com", "ord-a").await;
    Mock::given(method("POST"))
        .and(path("/certificates"))
        .and(body_partial_json(json!({ "common_name": "example.org" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order_id": "ord-b" })))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/ord-b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "certificates": [{ "url": format!("{}/files/ord-b/cert", harness.server.uri()) }],
            "ca_bundle_url": format!("{}/files/ord-b/bundle", harness.server.uri()),
        })))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/ord-b/cert"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/certificates"))
        .and(body_partial_json(json!({ "common_name": "example.net" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order_id": "ord-c" })))
        .expect(0)
        .mount(&harness.server)
        .await;

    let err = harness
        .renewer(&["example.com", "example.org", "example.net"])
        .renew_all()
        .await
        .unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("failed to download certificate"), "{message}");
    assert!(message.contains("503"), "{message}");

    let first = harness.cert_dir("example.com");
    assert!(first.join("fullchain.pem").exists());
    let second = harness.cert_dir("example.org");
    assert!(!second.join("certificate.crt").exists());
    assert!(!second.join("fullchain.pem").exists());
    assert!(!harness.cert_dir("example.net").exists());
    assert_eq!(harness.reload_count(), 0);
}

#[tokio::test]
async fn reload_failure_fails_the_run() {
    let harness = Harness::start().await;
    mount_domain(&harness.server, "example.com", "ord-a").await;

    let renewer = RenewerConfig::builder()
        .api_url(harness.server.uri())
        .api_key(API_KEY)
        .email("admin@example.com")
        .domains(vec![DomainConfig::new(
            "example.com",
            harness.cert_dir("example.com"),
        )])
        .reloader(Reloader::hook("exit 1"))
        .build()
        .build_renewer()
        .unwrap();

    let err = renewer.renew_all().await.unwrap_err();
    assert!(format!("{err:#}").contains("failed to reload server"));
    assert!(harness
        .cert_dir("example.com")
        .join("fullchain.pem")
        .exists());
}

#[tokio::test]
async fn renew_domain_does_not_reload() {
    let harness = Harness::start().await;
    mount_domain(&harness.server, "example.com", "ord-a").await;

    let renewer = harness.renewer(&["example.com"]);
    let domain = DomainConfig::new("example.com", harness.cert_dir("example.com"));
    renewer.renew_domain(&domain).await.unwrap();

    assert!(harness
        .cert_dir("example.com")
        .join("fullchain.pem")
        .exists());
    assert_eq!(harness.reload_count(), 0);
}

#[test]
fn empty_api_key_is_rejected() {
    let result = RenewerConfig::builder()
        .api_key("")
        .email("admin@example.com")
        .domains(vec![DomainConfig::new("example.com", "/tmp/example_com")])
        .reloader(Reloader::docker("nginx"))
        .build()
        .build_renewer();
    let Err(err) = result else {
        panic!("empty api key must be rejected");
    };
    assert!(format!("{err:#}").contains("api key is empty"));
}

#[test]
fn zero_interval_is_rejected() {
    let result = RenewerConfig::builder()
        .api_key("key")
        .email("admin@example.com")
        .domains(vec![DomainConfig::new("example.com", "/tmp/example_com")])
        .reloader(Reloader::docker("nginx"))
        .renew_interval(Duration::ZERO)
        .build()
        .build_renewer();
    let Err(err) = result else {
        panic!("zero interval must be rejected");
    };
    assert!(format!("{err:#}").contains("renew interval is zero"));
}

#[tokio::test(start_paused = true)]
async fn periodic_run_continues_after_failed_run() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/certificates"))
        .respond_with(ResponseTemplate::new(500).set_body_string("temporarily unavailable"))
        .up_to_n_times(1)
        .mount(&harness.server)
        .await;
    mount_domain(&harness.server, "example.com", "ord-a").await;

    let interval = Duration::from_secs(24 * 3600);
    let renewer = harness.renewer_every(&["example.com"], interval);
    let task = tokio::spawn(async move { renewer.run().await });

    // The clock jumps ahead while HTTP and the hook are in flight, so poll in
    // steps much shorter than `interval` and stop before a third run starts.
    let step = Duration::from_secs(1);
    for _ in 0..(interval.as_secs() * 10) {
        if harness.reload_count() > 0 {
            break;
        }
        tokio::time::sleep(step).await;
    }
    task.abort();

    assert_eq!(harness.reload_count(), 1);
    let orders = harness
        .server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/certificates")
        .count();
    assert_eq!(orders, 2);
    assert!(harness
        .cert_dir("example.com")
        .join("fullchain.pem")
        .exists());
}

#[test]
fn default_interval_is_sixty_days() {
    let renewer = RenewerConfig::builder()
        .api_key("key")
        .email("admin@example.com")
        .domains(vec![])
        .reloader(Reloader::docker("nginx"))
        .build()
        .build_renewer()
        .unwrap();
    assert_eq!(renewer.renew_interval(), Duration::from_secs(60 * 24 * 3600));
}
