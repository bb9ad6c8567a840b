// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The trip-clip service: validate, forecast, produce, upload, persist, notify.

use std::sync::Arc;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use understudy::net::{self, Request};
use understudy::{Fault, Surface};

use crate::collaborators::{
    data_access, instructions_validator, mail_sender, subtitles_provider, video_producer,
    weather_provider, YOUTUBE_ORIGIN,
};

/// Name of the fault raised when a clip cannot be produced.
pub const VIDEO_PRODUCTION_FAILED: &str = "video-production-failed";

/// Validator verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    /// True when the instructions are usable.
    pub succeeded: bool,
    /// Reasons, an open set of kebab-case tags such as `"no-photos"`.
    #[serde(default)]
    pub failures: Vec<String>,
}

/// Outcome of [`TripClipService::generate_clip`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipResult {
    /// True when the clip was produced, uploaded and announced.
    pub succeed: bool,
    /// What the validator said.
    pub instructions_validation: Validation,
    /// Why the run stopped early, if it did.
    pub reason: Option<String>,
    /// Where the uploaded clip lives.
    pub video_url: Option<String>,
}

impl ClipResult {
    fn stopped(validation: Validation, reason: impl Into<String>) -> Self {
        Self {
            succeed: false,
            instructions_validation: validation,
            reason: Some(reason.into()),
            video_url: None,
        }
    }
}

/// Name of the [`Fault`] behind `err`, if there is one.
pub fn failure_name(err: &anyhow::Error) -> Option<&str> {
    err.downcast_ref::<Fault>().map(Fault::name)
}

/// Generates a trip clip by orchestrating the collaborator surfaces.
#[derive(Debug, Clone)]
pub struct TripClipService {
    mail: Arc<Surface>,
    weather: Arc<Surface>,
    video: Arc<Surface>,
    data: Arc<Surface>,
    subtitles: Arc<Surface>,
    validator: Arc<Surface>,
    mandatory_subtitles: bool,
}

impl Default for TripClipService {
    fn default() -> Self {
        Self::new()
    }
}

impl TripClipService {
    /// Service wired to the process-wide collaborators.
    pub fn new() -> Self {
        Self {
            mail: Arc::clone(mail_sender()),
            weather: Arc::clone(weather_provider()),
            video: Arc::clone(video_producer()),
            data: Arc::clone(data_access()),
            subtitles: Arc::clone(subtitles_provider()),
            validator: Arc::clone(instructions_validator()),
            mandatory_subtitles: false,
        }
    }

    /// Use a custom mail sender exposing `send(email, body)`.
    #[must_use]
    pub fn with_mail_sender(mut self, mail: Arc<Surface>) -> Self {
        self.mail = mail;
        self
    }

    /// Fail production when no subtitles are available.
    #[must_use]
    pub fn with_mandatory_subtitles(mut self, mandatory: bool) -> Self {
        self.mandatory_subtitles = mandatory;
        self
    }

    /// Run the workflow for `instructions`.
    ///
    /// # Errors
    /// A [`Fault`] named [`VIDEO_PRODUCTION_FAILED`] when the clip cannot be
    /// produced; malformed validator output.
    pub async fn generate_clip(&self, instructions: &Value) -> anyhow::Result<ClipResult> {
        let verdict = self
            .validator
            .call("validate", std::slice::from_ref(instructions))
            .map_err(anyhow::Error::new)?;
        let validation: Validation =
            serde_json::from_value(verdict).context("validator returned an unexpected shape")?;
        if !validation.succeeded {
            debug!(failures = ?validation.failures, "instructions rejected");
            return Ok(ClipResult::stopped(validation, "invalid-instructions"));
        }

        let weather = match self.weather.call(
            "get_weather",
            &[instructions["destination"].clone(), instructions["startDate"].clone()],
        ) {
            Ok(Value::Null) => return Ok(ClipResult::stopped(validation, "no-weather")),
            Ok(w) => w,
            Err(fault) => return Ok(ClipResult::stopped(validation, fault.name)),
        };

        let subtitles = self
            .subtitles
            .call("get_subtitles", std::slice::from_ref(instructions))
            .unwrap_or_else(|fault| {
                warn!(%fault, "subtitles unavailable");
                Value::Null
            });
        if subtitles.is_null() && self.mandatory_subtitles {
            return Err(Fault::new(VIDEO_PRODUCTION_FAILED, "subtitles are mandatory").into());
        }

        let video = self
            .video
            .call_async("produce", vec![instructions.clone(), weather, subtitles])
            .await
            .map_err(|fault| Fault::new(VIDEO_PRODUCTION_FAILED, fault.message))?;
        let video_id = video["video_id"].as_str().unwrap_or("clip").to_string();

        let upload = Request::post(&format!("{YOUTUBE_ORIGIN}/upload/{video_id}"))?
            .json(json!({"video": video, "title": instructions["slogan"]}));
        match net::send(upload).await {
            Ok(resp) if resp.is_success() => {}
            Ok(resp) => {
                warn!(status = resp.status, "upload rejected");
                return Ok(ClipResult::stopped(validation, "upload-rejected"));
            }
            Err(err) => {
                warn!(%err, "upload failed");
                return Ok(ClipResult::stopped(validation, "upload-failed"));
            }
        }

        let token = format!("upload-{video_id}");
        if let Err(fault) = self
            .data
            .call_async("save", vec![instructions.clone(), json!(true), json!(token)])
            .await
        {
            warn!(%fault, "clip record not saved");
        }

        let email = instructions["creator"]["email"].clone();
        let body = format!(
            "Your clip for {} is ready: {YOUTUBE_ORIGIN}/watch/{video_id}",
            instructions["destination"].as_str().unwrap_or("your trip")
        );
        if let Err(fault) = self.mail.call_async("send", vec![email, json!(body)]).await {
            warn!(%fault, "creator not notified");
        }

        Ok(ClipResult {
            succeed: true,
            instructions_validation: validation,
            reason: None,
            video_url: Some(format!("{YOUTUBE_ORIGIN}/watch/{video_id}")),
        })
    }
}
