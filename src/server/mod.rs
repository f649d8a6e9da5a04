//! Development server with live reload

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use notify_debouncer_mini::{
    new_debouncer, notify::RecommendedWatcher, notify::RecursiveMode, DebounceEventResult,
    Debouncer,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use crate::content::{self, html::html_escape, ContentLoader, HtmlWriter, PostSet, Resolution};
use crate::error::SelectError;
use crate::store::PostStore;
use crate::Folio;

/// Live reload script injected into HTML pages
const LIVE_RELOAD_SCRIPT: &str = r#"
<script>
(function() {
    var ws = new WebSocket('ws://' + location.host + '/__livereload');
    ws.onmessage = function(msg) {
        if (msg.data === 'reload') {
            location.reload();
        }
    };
})();
</script>
"#;

/// Characters escaped in a slug used as a path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Server state
struct ServerState {
    folio: Folio,
    loader: ContentLoader,
    store: PostStore,
    writer: HtmlWriter,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

/// Start the development server
pub async fn start(folio: &Folio, ip: &str, port: u16, watch: bool) -> Result<()> {
    let (reload_tx, _) = broadcast::channel::<()>(16);

    let state = Arc::new(ServerState {
        folio: folio.clone(),
        loader: folio.loader()?,
        store: PostStore::new(),
        writer: folio.html_writer(),
        reload_tx,
        live_reload: watch,
    });

    state.store.reload(&state.loader).await?;

    let app = router(Arc::clone(&state));

    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}/blog", ip, port);

    // The debouncer stops watching when dropped, keep it for the server's lifetime
    let _debouncer = if watch && folio.posts_dir.is_dir() {
        println!("Watching {} for changes...", folio.posts_dir.display());
        Some(watch_posts(Arc::clone(&state))?)
    } else {
        if watch {
            tracing::warn!("Cannot watch missing directory {:?}", folio.posts_dir);
        }
        None
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::temporary("/blog") }))
        .route("/blog", get(blog_index))
        .route("/blog/:slug", get(blog_post))
        .route("/api/posts", get(api_posts))
        .route("/api/posts/:slug", get(api_post))
        .route("/__livereload", get(livereload_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Navigating to the listing reloads the posts
async fn blog_index(State(state): State<Arc<ServerState>>) -> Response {
    if let Err(e) = state.store.reload(&state.loader).await {
        tracing::error!("Failed to reload posts: {}", e);
    }
    let posts = state.store.snapshot();
    render_page(&state, &posts, None)
}

async fn blog_post(State(state): State<Arc<ServerState>>, Path(slug): Path<String>) -> Response {
    let posts = state.store.snapshot();
    render_page(&state, &posts, Some(&slug))
}

async fn api_posts(State(state): State<Arc<ServerState>>) -> Response {
    let posts = state.store.snapshot();
    Json(posts.as_ref()).into_response()
}

async fn api_post(State(state): State<Arc<ServerState>>, Path(slug): Path<String>) -> Response {
    let posts = state.store.snapshot();
    match content::select(&posts, Some(&slug)) {
        Ok(selection) => {
            let document = content::render(&selection.post.content);
            Json(serde_json::json!({
                "post": selection.post,
                "resolution": selection.resolution,
                "document": document,
            }))
            .into_response()
        }
        Err(SelectError::NotReady) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "loading" })),
        )
            .into_response(),
    }
}

fn render_page(state: &ServerState, posts: &PostSet, requested: Option<&str>) -> Response {
    let title = html_escape(&state.folio.config.title);

    let selection = match content::select(posts, requested) {
        Ok(selection) => selection,
        Err(SelectError::NotReady) => {
            let body = format!(
                "<section id=\"blog\"><h2>{}</h2><div class=\"loading\">Loading...</div></section>",
                title
            );
            return Html(page(state, &title, &body)).into_response();
        }
    };

    if let Resolution::Fallback { requested } = &selection.resolution {
        tracing::info!(
            "Unknown post {:?} requested, showing {:?}",
            requested,
            selection.post.slug
        );
    }

    let selected = selection.post;
    let date_format = &state.folio.config.date_format;

    let mut list = String::from("<ul>\n");
    for post in posts.iter() {
        let class = if post.slug == selected.slug {
            r#" class="selected""#
        } else {
            ""
        };
        list.push_str(&format!(
            "<li><a href=\"{}\"{}>{}<div class=\"date\">{}</div></a></li>\n",
            post_href(&post.slug),
            class,
            html_escape(&post.title),
            html_escape(&post.display_date(date_format))
        ));
    }
    list.push_str("</ul>\n");

    let mut nav = String::new();
    if let Some(newer) = posts.newer(&selected.slug) {
        nav.push_str(&format!(
            "<a class=\"newer\" href=\"{}\">{}</a>",
            post_href(&newer.slug),
            html_escape(&newer.title)
        ));
    }
    if let Some(older) = posts.older(&selected.slug) {
        nav.push_str(&format!(
            "<a class=\"older\" href=\"{}\">{}</a>",
            post_href(&older.slug),
            html_escape(&older.title)
        ));
    }

    let article = state.writer.write(&content::render(&selected.content));
    let body = format!(
        "<section id=\"blog\"><h2>{}</h2>\n<aside>\n{}</aside>\n<article>\n{}</article>\n<nav>{}</nav>\n</section>",
        title, list, article, nav
    );

    Html(page(state, &html_escape(&selected.title), &body)).into_response()
}

fn page(state: &ServerState, title: &str, body: &str) -> String {
    let script = if state.live_reload {
        LIVE_RELOAD_SCRIPT
    } else {
        ""
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}\n{}</body>\n</html>\n",
        title, body, script
    )
}

fn post_href(slug: &str) -> String {
    format!("/blog/{}", utf8_percent_encode(slug, PATH_SEGMENT))
}

/// Watch the posts directory and reload on changes
fn watch_posts(state: Arc<ServerState>) -> Result<Debouncer<RecommendedWatcher>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();

    let handler = move |res: DebounceEventResult| {
        let _ = tx.send(res);
    };
    let mut debouncer = new_debouncer(Duration::from_millis(500), handler)?;
    debouncer
        .watcher()
        .watch(&state.folio.posts_dir, RecursiveMode::NonRecursive)?;
    tracing::debug!("Watching: {:?}", state.folio.posts_dir);

    tokio::spawn(async move {
        while let Some(res) = rx.recv().await {
            match res {
                Ok(events) => {
                    let relevant = events.iter().any(|e| {
                        let path = e.path.to_string_lossy();
                        !path.contains("/.") && !path.ends_with('~')
                    });
                    if !relevant {
                        continue;
                    }
                    for event in &events {
                        tracing::info!("File changed: {}", event.path.display());
                    }
                    match state.store.reload(&state.loader).await {
                        Ok(_) => {
                            let _ = state.reload_tx.send(());
                        }
                        Err(e) => tracing::error!("Reload failed: {}", e),
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }
    });

    Ok(debouncer)
}

/// WebSocket handler for live reload
async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_livereload_socket(socket, reload_rx))
}

/// Handle WebSocket connection for live reload
async fn handle_livereload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
            result = reload_rx.recv() => {
                match result {
                    Ok(_) => {
                        if socket.send(Message::Text("reload".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("Live reload client disconnected");
}
