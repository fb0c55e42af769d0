//! Integration-Tests fuer die Admin-API und das Zusammenspiel mit den Plugin-Routen

use std::io::Write;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use flate2::{write::GzEncoder, Compression};
use plugwerk_server::{config::ServerConfig, Dienste, Server};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN: &str = "Bearer geheim";

fn config(dir: &TempDir) -> ServerConfig {
    let mut cfg = ServerConfig::default();
    cfg.datenbank.url = format!("sqlite://{}", dir.path().join("plugwerk.db").display());
    cfg.plugins.verzeichnis = dir.path().join("plugins");
    cfg.plugins.webapp_verzeichnis = dir.path().join("webapp");
    cfg.sessions.admin_token = Some("geheim".into());
    cfg
}

async fn dienste(dir: &TempDir, cfg: ServerConfig) -> Dienste {
    Server::neu(cfg, Some(dir.path().join("config.toml")))
        .dienste_aufbauen()
        .await
        .unwrap()
}

fn bundle(id: &str) -> Vec<u8> {
    let manifest = format!(
        "id = \"{id}\"\nname = \"{id}\"\nversion = \"2.1.0\"\n\n[webapp]\nbundle_path = \"webapp/main.js\"\n"
    );
    let dateien: [(String, &[u8]); 3] = [
        (format!("{id}/manifest.toml"), manifest.as_bytes()),
        (format!("{id}/public/hallo.txt"), b"hallo"),
        (format!("{id}/webapp/main.js"), b"console.log(1)"),
    ];

    let mut tar = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (pfad, inhalt) in &dateien {
        let mut header = tar::Header::new_gnu();
        header.set_size(inhalt.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, pfad, *inhalt).unwrap();
    }
    let mut gz = tar.into_inner().unwrap();
    gz.flush().unwrap();
    gz.finish().unwrap()
}

async fn senden(router: &Router, anfrage: Request<Body>) -> (StatusCode, Vec<u8>) {
    let antwort = router.clone().oneshot(anfrage).await.unwrap();
    let status = antwort.status();
    let body = to_bytes(antwort.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn senden_json(router: &Router, anfrage: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = senden(router, anfrage).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn admin(methode: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(methode)
        .uri(uri)
        .header("authorization", ADMIN)
        .body(body)
        .unwrap()
}

async fn warten_bis_aktiv(d: &Dienste, id: &str, aktiv: bool) {
    let manager = d.manager.as_ref().unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while manager.umgebung().ist_aktiv(id) != aktiv {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Plugin-Zustand wurde nicht erreicht");
}

#[tokio::test]
async fn health_ohne_token() {
    let dir = TempDir::new().unwrap();
    let d = dienste(&dir, config(&dir)).await;
    let (status, json) = senden_json(
        &d.router,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn admin_api_braucht_token() {
    let dir = TempDir::new().unwrap();
    let d = dienste(&dir, config(&dir)).await;

    let (status, json) = senden_json(
        &d.router,
        Request::get("/api/v1/plugins").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "api.nicht_autorisiert");

    let (status, _) = senden(
        &d.router,
        Request::get("/api/v1/plugins")
            .header("authorization", "Bearer falsch")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ohne_admin_token_gesperrt() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir);
    cfg.sessions.admin_token = None;
    let d = dienste(&dir, cfg).await;

    let (status, _) = senden(&d.router, admin("GET", "/api/v1/plugins", Body::empty())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn installieren_aktivieren_aufrufen_entfernen() {
    let dir = TempDir::new().unwrap();
    let d = dienste(&dir, config(&dir)).await;

    // Installieren
    let (status, json) = senden_json(
        &d.router,
        admin("POST", "/api/v1/plugins", Body::from(bundle("jira"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["id"], "jira");
    assert_eq!(json["version"], "2.1.0");

    let (_, json) = senden_json(&d.router, admin("GET", "/api/v1/plugins", Body::empty())).await;
    assert_eq!(json["inaktiv"][0]["id"], "jira");
    assert_eq!(json["aktiv"].as_array().unwrap().len(), 0);

    // Nochmal: doppelte ID
    let (status, json) = senden_json(
        &d.router,
        admin("POST", "/api/v1/plugins", Body::from(bundle("jira"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "plugin.doppelte_id");

    // Aktivieren ueber die Konfiguration
    let (status, _) = senden(
        &d.router,
        admin("POST", "/api/v1/plugins/jira/aktivieren", Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    warten_bis_aktiv(&d, "jira", true).await;

    let gespeichert = ServerConfig::laden(dir.path().join("config.toml")).unwrap();
    assert!(gespeichert.plugins.plugin_aktiviert("jira"));

    // Plugin-Route und Webapp-Bundle
    let (status, body) = senden(
        &d.router,
        Request::get("/plugins/jira/public/hallo.txt")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"hallo");

    let (status, body) = senden(
        &d.router,
        Request::get("/static/plugins/jira/main.js")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"console.log(1)");

    let (_, json) = senden_json(
        &d.router,
        admin("GET", "/api/v1/plugins/webapp", Body::empty()),
    )
    .await;
    assert_eq!(json[0]["id"], "jira");
    assert_eq!(json[0]["bundle_path"], "webapp/main.js");

    // Entfernen
    let (status, _) = senden(
        &d.router,
        admin("DELETE", "/api/v1/plugins/jira", Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = senden_json(
        &d.router,
        Request::get("/plugins/jira/public/hallo.txt")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "plugin.nicht_aktiv");

    let (status, _) = senden(
        &d.router,
        admin("DELETE", "/api/v1/plugins/jira", Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deaktivieren_unbekannter_plugins() {
    let dir = TempDir::new().unwrap();
    let d = dienste(&dir, config(&dir)).await;
    let (status, json) = senden_json(
        &d.router,
        admin("POST", "/api/v1/plugins/fehlt/deaktivieren", Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "plugin.nicht_installiert");
}

#[tokio::test]
async fn leeres_bundle() {
    let dir = TempDir::new().unwrap();
    let d = dienste(&dir, config(&dir)).await;
    let (status, json) =
        senden_json(&d.router, admin("POST", "/api/v1/plugins", Body::empty())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "api.ungueltige_anfrage");
}

#[tokio::test]
async fn plugin_system_deaktiviert() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir);
    cfg.plugins.aktiviert = false;
    let d = dienste(&dir, cfg).await;
    assert!(d.manager.is_none());

    let (status, json) =
        senden_json(&d.router, admin("GET", "/api/v1/plugins", Body::empty())).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(json["error"]["code"], "plugin.deaktiviert");

    let (status, _) = senden(
        &d.router,
        Request::get("/plugins/jira").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn sessions_ausstellen_und_beenden() {
    let dir = TempDir::new().unwrap();
    let d = dienste(&dir, config(&dir)).await;
    let user_id = uuid::Uuid::new_v4();

    let anfrage = Request::builder()
        .method("POST")
        .uri("/api/v1/sessions")
        .header("authorization", ADMIN)
        .header("content-type", "application/json")
        .body(Body::from(format!("{{\"user_id\":\"{user_id}\"}}")))
        .unwrap();
    let (status, json) = senden_json(&d.router, anfrage).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user_id"], user_id.to_string().as_str());
    let token = json["token"].as_str().unwrap().to_string();
    assert_eq!(d.sessions.anzahl_aktive().await, 1);

    let uri = format!("/api/v1/sessions/{token}");
    let (status, _) = senden(&d.router, admin("DELETE", &uri, Body::empty())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = senden(&d.router, admin("DELETE", &uri, Body::empty())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
