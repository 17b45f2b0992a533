//! HTTP server wiring (§5, §6): builds the [`Service`], spawns its
//! background jobs, and binds the actix-web `App` exposing the core API
//! handlers plus the static `videos/`/`thumbnails/` file tree.
//!
//! Grounded in the teacher's `vod-meta-server::server::run`: construct the
//! long-lived state, spawn its periodic background jobs, then bind and run
//! an `HttpServer` closure that re-shares the same state into every worker.

use actix_web::{middleware, App, HttpServer};

use crate::{api, cli, service::Service};

/// Runs the kinescope server.
///
/// Startup sequence (§5): open the content store, warm the weekly/daily
/// plan caches, start the planner-regeneration loop and the VCR-position
/// ticker, then bind and serve HTTP.
///
/// # Errors
///
/// If the content root cannot be opened, warming either plan cache fails,
/// or the HTTP listener cannot be bound.
#[actix_web::main]
pub async fn run(opts: cli::Opts) -> Result<(), cli::Failure> {
    let content_root = opts.content_root.clone();
    let videos_dir = content_root.join("videos");
    let thumbnails_dir = content_root.join("thumbnails");

    let service = Service::try_new(&opts).await.map_err(|e| {
        kinescope_log::log::error!("Failed to initialize kinescope::Service: {}", e)
    })?;
    service.spawn_background_tasks();

    let bind = (opts.http_ip, opts.http_port);
    let _ = HttpServer::new(move || {
        App::new()
            .data(service.clone())
            .wrap(middleware::Logger::default())
            .service(api::next_video)
            .service(api::played)
            .service(api::should_reload)
            .service(api::canales)
            .service(api::set_canal_activo)
            .service(api::series)
            .service(api::set_series_time_of_day)
            .service(actix_files::Files::new("/videos", &videos_dir))
            .service(actix_files::Files::new("/thumbnails", &thumbnails_dir))
    })
    .bind(bind)
    .map_err(|e| kinescope_log::log::error!("Failed to bind web server: {}", e))?
    .run()
    .await
    .map_err(|e| kinescope_log::log::error!("Web server has failed: {}", e))?;

    Ok(())
}
