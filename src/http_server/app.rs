use std::sync::Arc;

use axum::{Json, Router, extract::DefaultBodyLimit, http::HeaderValue, routing::get};
use color_eyre::eyre::{Context, eyre};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http_server::{http_routes, state::AppState};
use crate::logging::http_request_span;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_router(app_state: Arc<AppState>) -> Router {
    let upload_limit =
        usize::try_from(app_state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES)
            .unwrap_or(usize::MAX);

    let api = Router::new()
        .nest("/auth", http_routes::auth::router())
        .nest("/users", http_routes::users::router())
        .nest("/artists", http_routes::artists::router())
        .nest("/albums", http_routes::albums::router())
        .nest("/musics", http_routes::musics::router())
        .nest("/playlists", http_routes::playlists::router())
        .nest("/reviews", http_routes::reviews::router())
        .nest("/atividade", http_routes::activities::router())
        .nest(
            "/upload",
            http_routes::uploads::router().layer(DefaultBodyLimit::max(upload_limit)),
        )
        .nest("/player", http_routes::player::router());

    Router::new()
        .route("/", get(health))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(http_request_span))
                .layer(cors_layer(&app_state.config.cors_origins)),
        )
        .with_state(app_state)
}

pub async fn start(port: u16, app_state: Arc<AppState>) -> color_eyre::Result<()> {
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .wrap_err_with(|| eyre!("Failed to bind to port {}", port))?;
    log::info!("Listening on http://0.0.0.0:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("Failed to start HTTP server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down HTTP server");
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::services::media_store::LocalMediaStore;
    use crate::test_utils::test_db;

    struct TestApp {
        router: Router,
        state: Arc<AppState>,
        _uploads: tempfile::TempDir,
    }

    impl TestApp {
        async fn new() -> Self {
            let uploads = tempfile::tempdir().unwrap();
            let db = test_db().await;
            let config = Config::with_paths(&uploads.path().join("db.sqlite"), uploads.path());
            let store = LocalMediaStore::new(uploads.path().to_path_buf()).unwrap();
            let state = Arc::new(AppState::new(db, config, Arc::new(store)));
            Self {
                router: build_router(state.clone()),
                state,
                _uploads: uploads,
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }

        async fn json(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Value,
        ) -> (StatusCode, Value) {
            let mut request = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json");
            if let Some(token) = token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            self.send(request.body(Body::from(body.to_string())).unwrap())
                .await
        }

        async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
            let mut request = Request::builder().uri(uri);
            if let Some(token) = token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            self.send(request.body(Body::empty()).unwrap()).await
        }

        async fn register(&self, username: &str) -> String {
            let (status, body) = self
                .json(
                    Method::POST,
                    "/api/auth/register",
                    None,
                    json!({
                        "username": username,
                        "email": format!("{username}@example.com"),
                        "password": "correct horse",
                    }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            body["token"].as_str().unwrap().to_string()
        }

        /// Create an artist with one music per title, returning the music ids.
        async fn catalogue(&self, token: &str, artist: &str, titles: &[&str]) -> Vec<i64> {
            let (status, artist) = self
                .json(Method::POST, "/api/artists", Some(token), json!({ "name": artist }))
                .await;
            assert_eq!(status, StatusCode::CREATED, "{artist}");

            let mut ids = Vec::new();
            for title in titles {
                let (status, music) = self
                    .json(
                        Method::POST,
                        "/api/musics",
                        Some(token),
                        json!({ "title": title, "artistId": artist["id"], "duration": 200 }),
                    )
                    .await;
                assert_eq!(status, StatusCode::CREATED, "{music}");
                ids.push(music["id"].as_i64().unwrap());
            }
            ids
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new().await;
        let (status, body) = app.get("/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_register_login_and_me() {
        let app = TestApp::new().await;
        let token = app.register("Ana").await;

        let (status, me) = app.get("/api/auth/me", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "ana");
        assert_eq!(me["role"], "admin");
        assert!(me.get("passwordHash").is_none());

        let (status, body) = app
            .json(
                Method::POST,
                "/api/auth/login",
                None,
                json!({ "identifier": "ana@example.com", "password": "wrong password" }),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");

        let (status, _) = app
            .json(Method::POST, "/api/auth/logout", Some(&token), json!({}))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.get("/api/auth/me", Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_token_and_bad_json() {
        let app = TestApp::new().await;
        let (status, body) = app.get("/api/auth/me", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = app.get("/api/artists/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_catalogue_flow() {
        let app = TestApp::new().await;
        let admin = app.register("admin").await;
        let listener = app.register("listener").await;

        let (status, _) = app
            .json(
                Method::POST,
                "/api/artists",
                Some(&listener),
                json!({ "name": "Milton Nascimento" }),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, artist) = app
            .json(
                Method::POST,
                "/api/artists",
                Some(&admin),
                json!({ "name": "Milton Nascimento", "genre": "MPB" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let artist_id = artist["id"].as_i64().unwrap();

        let (status, _) = app
            .json(
                Method::POST,
                "/api/artists",
                Some(&admin),
                json!({ "name": "  milton nascimento " }),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .json(
                Method::POST,
                "/api/albums",
                Some(&admin),
                json!({ "title": "Clube da Esquina", "artistId": 999 }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, album) = app
            .json(
                Method::POST,
                "/api/albums",
                Some(&admin),
                json!({ "title": "Clube da Esquina", "artistId": artist_id, "releaseYear": 1972 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let album_id = album["id"].as_i64().unwrap();

        let (status, _) = app
            .json(
                Method::POST,
                "/api/musics",
                Some(&admin),
                json!({
                    "title": "Cais",
                    "artistId": artist_id,
                    "albumId": album_id,
                    "duration": 205,
                    "trackNumber": 3,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, detail) = app.get(&format!("/api/albums/{album_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["album"]["trackCount"], 1);
        assert_eq!(detail["album"]["duration"], 205);
        assert_eq!(detail["musics"][0]["title"], "Cais");

        let request = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/artists/{artist_id}"))
            .header(header::AUTHORIZATION, format!("Bearer {admin}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_activity_log() {
        let app = TestApp::new().await;
        let token = app.register("listener").await;

        let (status, _) = app
            .json(
                Method::POST,
                "/api/atividade",
                Some(&token),
                json!({ "type": "dance" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, activity) = app
            .json(
                Method::POST,
                "/api/atividade",
                Some(&token),
                json!({ "type": "like", "details": "from the radio" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(activity["type"], "like");

        let (status, list) = app.get("/api/atividade?limit=10", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_and_ranged_download() {
        let app = TestApp::new().await;
        let token = app.register("uploader").await;

        let mut file = b"ID3\x03\x00\x00\x00\x00\x00\x21".to_vec();
        file.extend(std::iter::repeat_n(0u8, 100));

        let boundary = "ispmedia-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"song.mp3\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(&file);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body))
            .unwrap();
        let (status, upload) = app.send(request).await;
        assert_eq!(status, StatusCode::CREATED, "{upload}");
        assert_eq!(upload["kind"], "audio");
        assert_eq!(upload["originalName"], "song.mp3");
        assert_eq!(upload["size"], file.len());
        let upload_id = upload["id"].as_i64().unwrap();

        let request = Request::builder()
            .uri(format!("/api/upload/{upload_id}/file"))
            .header(header::RANGE, "bytes=0-2")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"ID3");
    }

    #[tokio::test]
    async fn test_player_routes() {
        let app = TestApp::new().await;
        let admin = app.register("admin").await;
        let listener = app.register("listener").await;
        let ids = app.catalogue(&admin, "Bonga", &["Mariquinha", "Muadiakime"]).await;

        let (status, snapshot) = app.get("/api/player", Some(&listener)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["state"], "stopped");

        let (status, _) = app
            .json(Method::POST, "/api/player/play", Some(&listener), json!({}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, snapshot) = app
            .json(
                Method::POST,
                "/api/player/queue",
                Some(&listener),
                json!({ "musicIds": ids }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{snapshot}");
        assert_eq!(snapshot["state"], "playing");
        assert_eq!(snapshot["currentMusicId"], ids[0]);

        let (status, snapshot) = app
            .json(
                Method::POST,
                "/api/player/repeat",
                Some(&listener),
                json!({ "mode": "one" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["repeat"], "one");

        let (status, _) = app
            .json(
                Method::POST,
                "/api/player/repeat",
                Some(&listener),
                json!({ "mode": "sometimes" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, snapshot) = app
            .json(
                Method::POST,
                "/api/player/seek",
                Some(&listener),
                json!({ "position": 30.5 }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["position"], 30.5);

        let (status, _) = app
            .json(
                Method::POST,
                "/api/player/seek",
                Some(&listener),
                json!({ "position": -1.0 }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // out of f64 range, never reaches the player as a finite number
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/player/seek")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {listener}"))
            .body(Body::from(r#"{"position": 1e999}"#))
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, snapshot) = app
            .json(Method::POST, "/api/player/ended", Some(&listener), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["currentMusicId"], ids[0]);
        assert_eq!(snapshot["position"], 0.0);

        let (status, _) = app
            .json(
                Method::POST,
                "/api/player/volume",
                Some(&listener),
                json!({ "volume": 1.5 }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, snapshot) = app
            .json(Method::POST, "/api/player/next", Some(&listener), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["currentMusicId"], ids[1]);

        let (status, music) = app.get(&format!("/api/musics/{}", ids[0]), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(music["playCount"], 1);
    }

    #[tokio::test]
    async fn test_playlist_music_routes() {
        let app = TestApp::new().await;
        let admin = app.register("admin").await;
        let owner = app.register("listener").await;
        let stranger = app.register("stranger").await;
        let ids = app
            .catalogue(&admin, "Cesária Évora", &["Sodade", "Angola", "Petit Pays"])
            .await;

        let (status, detail) = app
            .json(
                Method::POST,
                "/api/playlists",
                Some(&owner),
                json!({ "name": "Morna", "musicIds": [ids[0], ids[1]] }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{detail}");
        let playlist_id = detail["playlist"]["id"].as_i64().unwrap();
        let musics_uri = format!("/api/playlists/{playlist_id}/musics");

        let (status, detail) = app
            .json(Method::POST, &musics_uri, Some(&owner), json!({ "musicId": ids[2] }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(detail["musics"].as_array().unwrap().len(), 3);

        let (status, _) = app
            .json(Method::POST, &musics_uri, Some(&owner), json!({ "musicId": ids[2] }))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .json(Method::POST, &musics_uri, Some(&stranger), json!({ "musicId": ids[0] }))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, detail) = app
            .json(
                Method::PUT,
                &musics_uri,
                Some(&owner),
                json!({ "musicIds": [ids[2], ids[0], ids[1]] }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["musics"][0]["id"], ids[2]);

        let (status, _) = app
            .json(
                Method::PUT,
                &musics_uri,
                Some(&owner),
                json!({ "musicIds": [ids[0], ids[1]] }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let remove_uri = format!("{musics_uri}/{}", ids[0]);
        let (status, _) = app
            .json(Method::DELETE, &remove_uri, Some(&owner), json!({}))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app
            .json(Method::DELETE, &remove_uri, Some(&owner), json!({}))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, detail) = app
            .get(&format!("/api/playlists/{playlist_id}"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let remaining: Vec<i64> = detail["musics"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_i64().unwrap())
            .collect();
        assert_eq!(remaining, vec![ids[2], ids[1]]);
    }

    #[tokio::test]
    async fn test_review_summary_route() {
        let app = TestApp::new().await;
        let admin = app.register("admin").await;
        let first = app.register("critic1").await;
        let second = app.register("critic2").await;
        let ids = app.catalogue(&admin, "Paulo Flores", &["Poema do Semba"]).await;

        for (token, rating) in [(&first, 4), (&second, 5)] {
            let (status, review) = app
                .json(
                    Method::POST,
                    "/api/reviews",
                    Some(token),
                    json!({ "targetType": "music", "targetId": ids[0], "rating": rating }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{review}");
        }

        let (status, _) = app
            .json(
                Method::POST,
                "/api/reviews",
                Some(&first),
                json!({ "targetType": "music", "targetId": ids[0], "rating": 1 }),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, summary) = app
            .get(
                &format!("/api/reviews/summary?targetType=music&targetId={}", ids[0]),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["count"], 2);
        assert_eq!(summary["average"], 4.5);

        let (status, _) = app
            .get("/api/reviews/summary?targetType=album&targetId=999", None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.get("/api/reviews/summary?targetType=music", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_deleting_a_user_discards_their_player() {
        let app = TestApp::new().await;
        let admin = app.register("admin").await;
        let listener = app.register("listener").await;
        let ids = app.catalogue(&admin, "Bonga", &["Mariquinha"]).await;

        let (status, _) = app
            .json(
                Method::POST,
                "/api/player/queue",
                Some(&listener),
                json!({ "musicIds": ids }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, me) = app.get("/api/auth/me", Some(&listener)).await;
        let user_id = me["id"].as_i64().unwrap();
        assert!(app.state.players.lock().await.contains_key(&user_id));

        let (status, _) = app
            .json(
                Method::DELETE,
                &format!("/api/users/{user_id}"),
                Some(&listener),
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!app.state.players.lock().await.contains_key(&user_id));
    }
}
