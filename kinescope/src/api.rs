//! HTTP handlers for the core-relevant endpoints of §6: the hot
//! `next_video`/`played` pair, the one-shot `should_reload` trigger edge,
//! and the channel/series admin surface the planner and switcher sit
//! behind. Each handler is a thin `web::Data<Service>` wrapper — all the
//! actual behavior lives in [`crate::service::Service`].

use actix_web::{get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    service::Service,
    store::{
        series_display_name, Channel, ChannelId, Series, SeriesId, TimeOfDay,
        VideoId,
    },
    switcher::Selection,
};

/// `GET /api/next_video`: resolves what the currently active channel
/// should be playing right now (§4.G). Falls back to the test-pattern
/// [`Selection`] rather than a 5xx when no channel is active yet, per the
/// §7 propagation policy for the hot path.
#[get("/api/next_video")]
pub async fn next_video(
    service: web::Data<Service>,
) -> Result<web::Json<Selection>, Error> {
    let active = service.active_channel().await;
    let channel_id = active.map_or_else(
        || Channel::AV_INPUT_ID.to_owned(),
        |a| a.canal_id,
    );
    Ok(web::Json(service.next_video(&channel_id).await?))
}

/// Request body of `POST /api/played`.
#[derive(Clone, Debug, Deserialize)]
pub struct PlayedRequest {
    /// Id of the video the player reports having completed.
    pub video_id: VideoId,
}

/// Response body of `POST /api/played`.
#[derive(Clone, Debug, Serialize)]
pub struct PlayedResponse {
    /// Always `true`; an unknown `video_id` is a no-op, not a failure
    /// (§4.H, §8).
    pub ok: bool,
    /// Total reported completions for this video so far.
    pub plays: u64,
    /// Timestamp of this completion.
    pub last_played: Option<DateTime<Utc>>,
}

/// `POST /api/played`: bumps play stats and clears the pending-pick window
/// for the reporting video (§4.H, §4.G).
#[post("/api/played")]
pub async fn played(
    service: web::Data<Service>,
    req: web::Json<PlayedRequest>,
) -> Result<web::Json<PlayedResponse>, Error> {
    let stats = service.confirm_play(&req.video_id).await?;
    Ok(web::Json(PlayedResponse {
        ok: true,
        plays: stats.plays,
        last_played: stats.last_played,
    }))
}

/// Response body of `GET /api/should_reload`.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ShouldReloadResponse {
    /// One-shot edge of the `should_reload` trigger file (§5, §6).
    pub should_reload: bool,
}

/// `GET /api/should_reload`: one-shot edge of the force/trigger file the
/// rotary-encoder bridge touches to ask the player to reload.
#[get("/api/should_reload")]
pub async fn should_reload(
    service: web::Data<Service>,
) -> web::Json<ShouldReloadResponse> {
    web::Json(ShouldReloadResponse {
        should_reload: service.should_reload(),
    })
}

/// One entry of the `GET /api/canales` response: a [`Channel`] together
/// with the id it's keyed by in `canales.json`.
#[derive(Clone, Debug, Serialize)]
pub struct CanalView {
    /// Id of this channel.
    pub canal_id: ChannelId,
    /// The channel's configuration.
    #[serde(flatten)]
    pub channel: Channel,
}

/// `GET /api/canales`: the configured channel listing, sorted by display
/// number.
#[get("/api/canales")]
pub async fn canales(service: web::Data<Service>) -> web::Json<Vec<CanalView>> {
    let mut list: Vec<_> = service
        .channels()
        .await
        .into_iter()
        .map(|(canal_id, channel)| CanalView { canal_id, channel })
        .collect();
    list.sort_by(|a, b| a.channel.numero.cmp(&b.channel.numero));
    web::Json(list)
}

/// Request body of `POST /api/set_canal_activo`.
#[derive(Clone, Debug, Deserialize)]
pub struct SetCanalActivoRequest {
    /// Id of the channel to make active, or [`Channel::AV_INPUT_ID`].
    pub canal_id: ChannelId,
}

/// `POST /api/set_canal_activo`: switches the currently active channel.
#[post("/api/set_canal_activo")]
pub async fn set_canal_activo(
    service: web::Data<Service>,
    req: web::Json<SetCanalActivoRequest>,
) -> Result<&'static str, Error> {
    service
        .set_active_channel(req.into_inner().canal_id)
        .await?;
    Ok("Ok")
}

/// One entry of the `GET /api/series` response.
#[derive(Clone, Debug, Serialize)]
pub struct SeriesView {
    /// Folder name this series is keyed by.
    pub series_id: SeriesId,
    /// Folder name rendered as a display title (underscores → spaces).
    pub display_name: String,
    /// The series' configuration.
    #[serde(flatten)]
    pub series: Series,
}

/// `GET /api/series`: the configured series catalog, sorted by folder
/// name.
#[get("/api/series")]
pub async fn series(service: web::Data<Service>) -> web::Json<Vec<SeriesView>> {
    let mut list: Vec<_> = service
        .series()
        .await
        .into_iter()
        .map(|(series_id, series)| {
            let display_name = series_display_name(&series_id);
            SeriesView { series_id, display_name, series }
        })
        .collect();
    list.sort_by(|a, b| a.series_id.cmp(&b.series_id));
    web::Json(list)
}

/// Request body of `POST /api/series/time_of_day`.
#[derive(Clone, Debug, Deserialize)]
pub struct SetTimeOfDayRequest {
    /// Folder name of the series to mutate.
    pub series_id: SeriesId,
    /// New time-of-day bucket to assign it.
    pub time_of_day: TimeOfDay,
}

/// `POST /api/series/time_of_day`: reassigns a series' `time_of_day`
/// bucket, consulted by the next weekly-plan regeneration.
#[post("/api/series/time_of_day")]
pub async fn set_series_time_of_day(
    service: web::Data<Service>,
    req: web::Json<SetTimeOfDayRequest>,
) -> Result<web::Json<Series>, Error> {
    let req = req.into_inner();
    let updated =
        service.set_series_time_of_day(&req.series_id, req.time_of_day).await?;
    Ok(web::Json(updated))
}

#[cfg(test)]
mod spec {
    use actix_web::{test, App};

    use super::*;
    use crate::{cli::Opts, store::ContentRoot};

    fn opts(dir: &std::path::Path) -> Opts {
        Opts {
            http_ip: "127.0.0.1".parse().unwrap(),
            http_port: 0,
            content_root: dir.to_owned(),
            verbose: None,
            local_tz: chrono::FixedOffset::east(0),
        }
    }

    async fn service() -> (tempfile::TempDir, Service) {
        let dir = tempfile::tempdir().unwrap();
        let service = Service::try_new(&opts(dir.path())).await.unwrap();
        (dir, service)
    }

    #[actix_rt::test]
    async fn next_video_defaults_to_av_input_with_no_active_channel() {
        let (_dir, service) = service().await;
        let mut app = test::init_service(
            App::new().data(service).service(next_video),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/next_video").to_request();
        let resp: Selection = test::read_response_json(&mut app, req).await;

        assert_eq!(resp.canal_numero, "03");
    }

    #[actix_rt::test]
    async fn played_bumps_stats_for_an_unknown_video() {
        let (_dir, service) = service().await;
        let mut app =
            test::init_service(App::new().data(service).service(played)).await;

        let req = test::TestRequest::post()
            .uri("/api/played")
            .set_json(&serde_json::json!({ "video_id": "ghost" }))
            .to_request();
        let resp: PlayedResponse = test::read_response_json(&mut app, req).await;

        assert!(resp.ok);
        assert_eq!(resp.plays, 1);
    }

    #[actix_rt::test]
    async fn canales_lists_configured_channels_sorted_by_numero() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            crate::store::Store::try_new(ContentRoot::new(dir.path().to_owned()))
                .unwrap();

        let mut channels = crate::store::Channels::new();
        for (id, numero) in [("b_chan", "09"), ("a_chan", "01")] {
            let _ = channels.insert(
                id.to_owned(),
                Channel {
                    nombre: id.to_owned(),
                    numero: numero.to_owned(),
                    series_filter: None,
                    tags_prioridad: vec![],
                    tags_incluidos: std::collections::HashSet::new(),
                    min_gap: std::time::Duration::from_secs(3600),
                    icono: None,
                },
            );
        }
        store.save_channels(&channels).await.unwrap();

        let service = Service::try_new(&opts(dir.path())).await.unwrap();
        let mut app =
            test::init_service(App::new().data(service).service(canales)).await;
        let req = test::TestRequest::get().uri("/api/canales").to_request();
        let resp: Vec<CanalView> = test::read_response_json(&mut app, req).await;

        assert_eq!(resp.len(), 2);
        assert_eq!(resp[0].canal_id, "a_chan");
        assert_eq!(resp[1].canal_id, "b_chan");
    }
}
