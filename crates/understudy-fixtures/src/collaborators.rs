// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Process-wide collaborator surfaces with their real behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Timelike, Utc};
use serde_json::{json, Value};
use tracing::info;
use understudy::{Fault, Surface};

/// Origin of the video hosting service the workflow uploads to.
pub const YOUTUBE_ORIGIN: &str = "http://like-youtube.com";

/// Hour (UTC) after which same-day forecasts are refused.
const SAME_DAY_CUTOFF_HOUR: u32 = 3;

static REAL_MAILS: AtomicUsize = AtomicUsize::new(0);
static NEXT_VIDEO: AtomicUsize = AtomicUsize::new(1);

/// How many times the real mailer has run in this process.
pub fn real_mails_sent() -> usize {
    REAL_MAILS.load(Ordering::SeqCst)
}

fn arg<'a>(args: &'a [Value], i: usize) -> &'a Value {
    args.get(i).unwrap_or(&Value::Null)
}

/// `send(email, body)`.
pub fn mail_sender() -> &'static Arc<Surface> {
    static S: OnceLock<Arc<Surface>> = OnceLock::new();
    S.get_or_init(|| {
        Surface::builder("mail-sender")
            .member("send", |args| {
                let to = arg(args, 0)
                    .as_str()
                    .ok_or_else(|| Fault::new("invalid-recipient", "recipient must be a string"))?;
                REAL_MAILS.fetch_add(1, Ordering::SeqCst);
                info!(%to, "real mailer sending email");
                Ok(json!(true))
            })
            .build()
    })
}

/// `get_weather(location, date)`; refuses same-day forecasts after 03:00.
pub fn weather_provider() -> &'static Arc<Surface> {
    static S: OnceLock<Arc<Surface>> = OnceLock::new();
    S.get_or_init(|| {
        Surface::builder("weather-provider")
            .member("get_weather", |args| {
                let location = arg(args, 0).as_str().unwrap_or("unknown");
                let date = arg(args, 1)
                    .as_str()
                    .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                    .map(|d| d.with_timezone(&Utc))
                    .ok_or_else(|| Fault::new("invalid-date", "trip date must be RFC 3339"))?;
                let now = understudy::clock::now();
                if too_late_for(date, now) {
                    return Err(Fault::new(
                        "too-late",
                        format!("no same-day forecast after {SAME_DAY_CUTOFF_HOUR:02}:00"),
                    ));
                }
                Ok(json!({"location": location, "forecast": "sunny", "celsius": 24}))
            })
            .build()
    })
}

/// True when `trip` is today and the cutoff hour has passed.
pub fn too_late_for(trip: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    trip.date_naive() == now.date_naive() && now.hour() >= SAME_DAY_CUTOFF_HOUR
}

/// `produce(instructions, weather, subtitles)`.
pub fn video_producer() -> &'static Arc<Surface> {
    static S: OnceLock<Arc<Surface>> = OnceLock::new();
    S.get_or_init(|| {
        Surface::builder("video-producer")
            .member("produce", |args| {
                let photos = arg(args, 0)["photos"].as_array().map_or(0, Vec::len);
                let id = NEXT_VIDEO.fetch_add(1, Ordering::Relaxed);
                Ok(json!({
                    "video_id": format!("clip-{id}"),
                    "duration_seconds": photos * 3,
                    "has_subtitles": !arg(args, 2).is_null(),
                }))
            })
            .build()
    })
}

/// `save(record, published, upload_token)`.
pub fn data_access() -> &'static Arc<Surface> {
    static S: OnceLock<Arc<Surface>> = OnceLock::new();
    S.get_or_init(|| {
        Surface::builder("data-access")
            .member("save", |_| Ok(json!(true)))
            .build()
    })
}

/// `get_subtitles(instructions)`.
pub fn subtitles_provider() -> &'static Arc<Surface> {
    static S: OnceLock<Arc<Surface>> = OnceLock::new();
    S.get_or_init(|| {
        Surface::builder("subtitles-provider")
            .member("get_subtitles", |args| {
                let slogan = arg(args, 0)["slogan"].as_str().unwrap_or_default();
                Ok(json!({"language": "en", "lines": [slogan]}))
            })
            .build()
    })
}

/// `validate(instructions) -> {succeeded, failures}`.
pub fn instructions_validator() -> &'static Arc<Surface> {
    static S: OnceLock<Arc<Surface>> = OnceLock::new();
    S.get_or_init(|| {
        Surface::builder("instructions-validator")
            .member("validate", |args| {
                let ins = arg(args, 0);
                let mut failures = Vec::new();
                if !ins["slogan"].is_string() {
                    failures.push("no-slogan");
                }
                if !ins["creator"]["email"].is_string() {
                    failures.push("no-creator-email");
                }
                if ins["photos"].as_array().map_or(true, Vec::is_empty) {
                    failures.push("no-photos");
                }
                Ok(json!({"succeeded": failures.is_empty(), "failures": failures}))
            })
            .build()
    })
}
